use std::path::PathBuf;
use std::sync::Arc;

use tokio::task;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{AudioInfo, AudioLoader, AudioMixer},
    blueprint::{AssetMap, Blueprint},
    composition::overlay::{BrandingRequest, OverlayCompositor},
    composition::report::{AssemblyFailure, AssemblyReport, Degradation, StageTracker},
    composition::timeline::{DurationAllocator, MasterClock, Timeline},
    config::Config,
    error::{CompositorError, MediaError, RenderError, Result},
    render::{unique_output_path, EncodeProfile, FfmpegBackend, RenderBackend, RenderJob},
    video::{FfprobeProbe, MediaProbe, ResolvedClip, ResolvedScene, SceneResolver},
};

/// Inputs for one assembly
#[derive(Debug, Clone)]
pub struct AssemblyRequest {
    pub blueprint: Blueprint,
    pub assets: AssetMap,
    /// Synthesized narration; its length is the master clock
    pub voice_path: PathBuf,
    /// Overrides the blueprint's music mood
    pub music_mood: Option<String>,
    pub watermark_text: Option<String>,
    pub logo_path: Option<PathBuf>,
}

impl AssemblyRequest {
    pub fn new(blueprint: Blueprint, assets: AssetMap, voice_path: impl Into<PathBuf>) -> Self {
        Self {
            blueprint,
            assets,
            voice_path: voice_path.into(),
            music_mood: None,
            watermark_text: None,
            logo_path: None,
        }
    }

    pub fn with_mood(mut self, mood: impl Into<String>) -> Self {
        self.music_mood = Some(mood.into());
        self
    }

    pub fn with_watermark(mut self, text: impl Into<String>) -> Self {
        self.watermark_text = Some(text.into());
        self
    }

    pub fn with_logo(mut self, path: impl Into<PathBuf>) -> Self {
        self.logo_path = Some(path.into());
        self
    }
}

/// Timeline orchestrator, the public entry point of the pipeline
///
/// Each call to [`assemble`](Self::assemble) walks the stages in order:
/// 1. Loading audio - measure the voice track, fixing the master clock
/// 2. Resolving scenes - probe scene media in parallel, placeholders for the rest
/// 3. Allocating durations - split the clock across scenes, lock clips to slots
/// 4. Mixing audio - pick and duck the music bed
/// 5. Compositing - caption and branding layers
/// 6. Rendering - a single encode of the finished job
///
/// The assembler holds only configuration and collaborators; nothing carries
/// over from one call to the next.
pub struct Assembler {
    config: Config,
    probe: Arc<dyn MediaProbe>,
    backend: Arc<dyn RenderBackend>,
}

impl Assembler {
    /// Create an assembler using ffprobe/ffmpeg
    pub fn new(config: Config) -> Self {
        let probe = FfprobeProbe::new(config.composition.min_clip_duration);
        Self {
            config,
            probe: Arc::new(probe),
            backend: Arc::new(FfmpegBackend::new()),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn MediaProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn RenderBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Assemble and render one video
    ///
    /// Degraded inputs still produce a report; the error side names the stage
    /// that could not complete.
    pub async fn assemble(&self, request: AssemblyRequest) -> std::result::Result<AssemblyReport, AssemblyFailure> {
        let mut tracker = StageTracker::new();

        info!("🎬 Starting assembly");
        info!("   Scenes: {}", request.blueprint.scene_count());
        info!("   Voice: {:?}", request.voice_path);
        info!("   Backend: {}", self.backend.name());

        let outcome = self.run(request, &mut tracker).await;
        match outcome {
            Ok(report) => {
                info!("🎉 Assembly complete! Output saved to: {:?}", report.output_path);
                report.log_summary();
                Ok(report)
            }
            Err(cause) => {
                error!("Assembly failed while {}: {}", tracker.current(), cause);
                Err(tracker.fail(cause))
            }
        }
    }

    async fn run(&self, request: AssemblyRequest, tracker: &mut StageTracker) -> Result<AssemblyReport> {
        request.blueprint.validate()?;
        let mut degradations = Vec::new();

        tracker.advance();
        let voice = self.load_voice(&request.voice_path).await?;
        let clock = MasterClock::new(voice.duration, self.config.audio.buffer_secs);
        info!(
            "   Master clock: {:.3}s (voice {:.3}s + {:.2}s buffer)",
            clock.duration(),
            clock.voice_duration,
            clock.buffer
        );

        tracker.advance();
        let workspace = self.create_workspace()?;
        let resolved = self
            .resolve_scenes(&request.blueprint, &request.assets, workspace.path().to_path_buf())
            .await?;
        degradations.extend(resolved.iter().filter_map(|scene| match &scene.clip {
            ResolvedClip::Placeholder { reason } => Some(Degradation::PlaceholderScene {
                scene_id: scene.scene_id,
                reason: reason.to_string(),
            }),
            _ => None,
        }));

        tracker.advance();
        let timeline = self.allocate(clock, &request.blueprint, &resolved);

        tracker.advance();
        let mood = request
            .music_mood
            .as_deref()
            .or_else(|| request.blueprint.mood_hint());
        let volume_hint = request.blueprint.music.as_ref().and_then(|m| m.volume);
        let (audio, audio_degradations) = AudioMixer::from_config(&self.config).mix(&voice, clock, mood, volume_hint);
        degradations.extend(audio_degradations);

        tracker.advance();
        info!("🎨 Compositing overlays...");
        let (overlays, overlay_degradations) = OverlayCompositor::new(&self.config, workspace.path()).compose(
            &request.blueprint,
            &timeline,
            BrandingRequest {
                watermark_text: request.watermark_text.as_deref(),
                logo_path: request.logo_path.as_deref(),
            },
        );
        degradations.extend(overlay_degradations);

        tracker.advance();
        let output_path = unique_output_path(&self.config.paths.output_dir, &self.config.paths.output_prefix)?;
        let job = RenderJob {
            timeline: timeline.clone(),
            audio,
            overlays,
            output_path,
            profile: EncodeProfile::from_config(&self.config),
        };
        let output_path = self.render(job).await?;

        // Stills and caption files are only needed by the encoder
        if let Err(e) = workspace.close() {
            warn!("Failed to remove working directory: {}", e);
        }

        tracker.advance();
        Ok(AssemblyReport::new(
            output_path,
            clock,
            &timeline,
            degradations,
            tracker.visited().to_vec(),
        ))
    }

    // ==========================================
    // STAGE: LOADING AUDIO
    // ==========================================

    async fn load_voice(&self, path: &std::path::Path) -> Result<AudioInfo> {
        info!("🎵 Loading voice track...");
        let path = path.to_path_buf();
        let voice = task::spawn_blocking(move || AudioLoader::probe(&path))
            .await
            .map_err(|e| CompositorError::generic(format!("voice probe task failed: {}", e)))??;

        info!(
            "   Loaded: {:.2}s, {} Hz, {} channels",
            voice.duration, voice.sample_rate, voice.channels
        );
        Ok(voice)
    }

    // ==========================================
    // STAGE: RESOLVING SCENES
    // ==========================================

    fn create_workspace(&self) -> Result<tempfile::TempDir> {
        let parent = &self.config.paths.temp_dir;
        std::fs::create_dir_all(parent).map_err(|e| MediaError::Workspace { reason: e.to_string() })?;

        let workspace = tempfile::Builder::new()
            .prefix("assembly-")
            .tempdir_in(parent)
            .map_err(|e| MediaError::Workspace { reason: e.to_string() })?;
        debug!("Working directory: {:?}", workspace.path());
        Ok(workspace)
    }

    async fn resolve_scenes(
        &self,
        blueprint: &Blueprint,
        assets: &AssetMap,
        workdir: PathBuf,
    ) -> Result<Vec<ResolvedScene>> {
        info!("📹 Resolving {} scenes...", blueprint.scene_count());

        let resolver = SceneResolver::new(
            Arc::clone(&self.probe),
            self.config.video.params.frame_size(),
            self.config.composition.probe_workers,
            workdir,
        );
        let scenes = blueprint.scenes.clone();
        let assets = assets.clone();

        task::spawn_blocking(move || resolver.resolve(&scenes, &assets))
            .await
            .map_err(|e| MediaError::WorkerPool { reason: e.to_string() })?
    }

    // ==========================================
    // STAGE: ALLOCATING DURATIONS
    // ==========================================

    fn allocate(&self, clock: MasterClock, blueprint: &Blueprint, resolved: &[ResolvedScene]) -> Timeline {
        info!("⏱️  Allocating {:.3}s across {} scenes...", clock.duration(), resolved.len());

        let estimates = blueprint.duration_estimates();
        if estimates.is_some() {
            debug!("Using per-scene duration estimates");
        }

        let timeline = DurationAllocator::from_config(&self.config).allocate(clock, resolved, estimates.as_deref());

        let drift = (timeline.total_duration() - clock.duration()).abs();
        if drift >= self.config.frame_duration() {
            warn!("Timeline drifts {:.4}s from the master clock", drift);
        }

        for slot in &timeline.slots {
            debug!(
                "   Scene {}: {:.3}s - {:.3}s",
                slot.scene_id,
                slot.start,
                slot.end()
            );
        }
        timeline
    }

    // ==========================================
    // STAGE: RENDERING
    // ==========================================

    async fn render(&self, job: RenderJob) -> Result<PathBuf> {
        info!("🎬 Rendering {:?}...", job.output_path);
        let backend = Arc::clone(&self.backend);

        let path = task::spawn_blocking(move || backend.render(&job))
            .await
            .map_err(|e| RenderError::Aborted { reason: e.to_string() })??;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::loader::write_silent_wav;
    use crate::composition::report::PipelineStage;
    use crate::composition::timeline::{LockAction, SlotSource};
    use crate::error::AudioError;
    use crate::video::resolver::tests::TableProbe;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    /// Backend that records jobs instead of encoding
    #[derive(Default)]
    struct RecordingBackend {
        calls: AtomicUsize,
        last_job: Mutex<Option<RenderJob>>,
        fail_with: Option<String>,
    }

    impl RenderBackend for RecordingBackend {
        fn name(&self) -> &str {
            "recording"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn render(&self, job: &RenderJob) -> std::result::Result<PathBuf, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_job.lock().unwrap() = Some(job.clone());
            match &self.fail_with {
                Some(reason) => Err(RenderError::EncodingFailed { reason: reason.clone() }),
                None => Ok(job.output_path.clone()),
            }
        }
    }

    fn config(root: &Path) -> Config {
        let mut config = Config::default();
        config.audio.buffer_secs = 0.0;
        config.video.params.resolution = (108, 192);
        config.composition.probe_workers = 2;
        config.paths.output_dir = root.join("output");
        config.paths.temp_dir = root.join("temp");
        config.paths.music_dir = root.join("music");
        config
    }

    fn blueprint(ids: &[u32]) -> Blueprint {
        let scenes: Vec<serde_json::Value> = ids
            .iter()
            .map(|id| {
                serde_json::json!({
                    "id": id,
                    "narration": format!("scene {} narration", id),
                    "overlay_text": format!("caption {}", id),
                    "visual": {"query": format!("query {}", id)}
                })
            })
            .collect();
        Blueprint::from_json(&serde_json::json!({ "scenes": scenes }).to_string()).unwrap()
    }

    fn setup(voice_secs: Option<f64>, probe: TableProbe) -> (TempDir, Assembler, Arc<RecordingBackend>, PathBuf) {
        let dir = tempdir().unwrap();
        let voice = dir.path().join("voice.wav");
        if let Some(seconds) = voice_secs {
            write_silent_wav(&voice, seconds);
        }

        let backend = Arc::new(RecordingBackend::default());
        let assembler = Assembler::new(config(dir.path()))
            .with_probe(Arc::new(probe))
            .with_backend(backend.clone());
        (dir, assembler, backend, voice)
    }

    #[tokio::test]
    async fn test_three_clips_over_eighteen_second_voice() {
        let probe = TableProbe::new()
            .video("a.mp4", 10.0)
            .video("b.mp4", 10.0)
            .video("c.mp4", 10.0);
        let (_dir, assembler, backend, voice) = setup(Some(18.0), probe);

        let assets: AssetMap = [(1, "a.mp4"), (2, "b.mp4"), (3, "c.mp4")].into_iter().collect();
        let report = assembler
            .assemble(AssemblyRequest::new(blueprint(&[1, 2, 3]), assets, &voice))
            .await
            .unwrap();

        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert!((report.duration - 18.0).abs() < 1e-6);
        assert_eq!(report.stages.last(), Some(&PipelineStage::Done));
        assert_eq!(report.placeholder_count(), 0);

        let job = backend.last_job.lock().unwrap().clone().unwrap();
        assert_eq!(job.timeline.slots.len(), 3);
        for slot in &job.timeline.slots {
            assert!((slot.allotted_duration - 6.0).abs() < 1e-6);
            match &slot.source {
                SlotSource::Video { lock, .. } => {
                    assert_eq!(lock.action, LockAction::Trim);
                    assert!((lock.locked_duration() - 6.0).abs() < 1e-6);
                }
                other => panic!("expected video slot, got {:?}", other),
            }
        }
        assert!((job.timeline.total_duration() - 18.0).abs() < 1.0 / 30.0);
        assert_eq!(job.audio.duration, job.timeline.duration());
        assert_eq!(job.overlays.len(), 3);
        assert!(job.output_path.starts_with(assembler.config().paths.output_dir.as_path()));
    }

    #[tokio::test]
    async fn test_missing_scene_asset_degrades_to_placeholder() {
        let probe = TableProbe::new().video("b.mp4", 5.0);
        let (_dir, assembler, backend, voice) = setup(Some(10.0), probe);

        let assets: AssetMap = [(2, "b.mp4")].into_iter().collect();
        let report = assembler
            .assemble(AssemblyRequest::new(blueprint(&[1, 2]), assets, &voice))
            .await
            .unwrap();

        assert_eq!(report.stages.last(), Some(&PipelineStage::Done));
        assert_eq!(report.placeholder_count(), 1);
        assert!(report
            .degradations
            .iter()
            .any(|d| matches!(d, Degradation::PlaceholderScene { scene_id: 1, .. })));

        let job = backend.last_job.lock().unwrap().clone().unwrap();
        assert!(job.timeline.slots[0].is_placeholder());
        assert!((job.timeline.slots[0].allotted_duration - 5.0).abs() < 1e-6);
        assert!((job.timeline.slots[1].delivered_duration() - 5.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_missing_voice_fails_without_rendering() {
        let (_dir, assembler, backend, voice) = setup(None, TableProbe::new());

        let failure = assembler
            .assemble(AssemblyRequest::new(blueprint(&[1]), AssetMap::new(), &voice))
            .await
            .unwrap_err();

        assert_eq!(failure.stage, PipelineStage::LoadingAudio);
        assert_eq!(failure.final_stage(), PipelineStage::Failed);
        assert!(matches!(failure.cause, CompositorError::Audio(AudioError::NotFound { .. })));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_encoder_failure_is_reported_as_render_stage() {
        let dir = tempdir().unwrap();
        let voice = dir.path().join("voice.wav");
        write_silent_wav(&voice, 2.0);
        let backend = Arc::new(RecordingBackend {
            fail_with: Some("codec exploded".into()),
            ..Default::default()
        });
        let assembler = Assembler::new(config(dir.path()))
            .with_probe(Arc::new(TableProbe::new()))
            .with_backend(backend.clone());

        let failure = assembler
            .assemble(AssemblyRequest::new(blueprint(&[1, 2]), AssetMap::new(), &voice))
            .await
            .unwrap_err();

        assert_eq!(failure.stage, PipelineStage::Rendering);
        assert!(matches!(failure.cause, CompositorError::Render(RenderError::EncodingFailed { .. })));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_workspace_removed_and_logo_beats_watermark() {
        let probe = TableProbe::new().video("a.mp4", 3.0);
        let (dir, assembler, backend, voice) = setup(Some(4.0), probe);
        let logo = dir.path().join("logo.png");
        crate::video::Frame::new_filled(30, 30, [255, 0, 0]).save_png(&logo).unwrap();

        let assets: AssetMap = [(1, "a.mp4")].into_iter().collect();
        let request = AssemblyRequest::new(blueprint(&[1]), assets, &voice)
            .with_watermark("@channel")
            .with_logo(&logo)
            .with_mood("upbeat");
        let report = assembler.assemble(request).await.unwrap();

        let job = backend.last_job.lock().unwrap().clone().unwrap();
        let branding: Vec<_> = job.overlays.iter().filter(|l| l.is_branding()).collect();
        assert_eq!(branding.len(), 1);
        assert!(matches!(branding[0].content, crate::composition::LayerContent::Logo { .. }));
        assert!(matches!(
            job.timeline.slots[0].source,
            SlotSource::Video { lock, .. } if lock.action == LockAction::Loop { repeats: 2 }
        ));
        assert!(report
            .degradations
            .iter()
            .any(|d| matches!(d, Degradation::MusicUnavailable { .. })));

        let leftover = std::fs::read_dir(dir.path().join("temp")).unwrap().count();
        assert_eq!(leftover, 0);
    }
}
