use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::blueprint::{AssetMap, Scene, SceneId};
use crate::error::{MediaError, Result};
use crate::video::normalizer::{normalize, FrameSize};
use crate::video::probe::{MediaProbe, ProbeOutcome, ValidMedia};
use crate::video::types::{Frame, MediaKind, PlaceholderReason, ResolvedClip, ResolvedScene};

/// Picks a source for every scene, substituting placeholders for anything unusable
///
/// Probing runs on a fixed-size worker pool; results are keyed by scene id and
/// the output always follows blueprint order, whatever order the workers finish in.
#[derive(Clone)]
pub struct SceneResolver {
    probe: Arc<dyn MediaProbe>,
    target: FrameSize,
    workers: usize,
    workdir: PathBuf,
}

impl SceneResolver {
    /// `workdir` receives normalized copies of still images
    pub fn new(probe: Arc<dyn MediaProbe>, target: FrameSize, workers: usize, workdir: impl Into<PathBuf>) -> Self {
        Self {
            probe,
            target,
            workers: workers.max(1),
            workdir: workdir.into(),
        }
    }

    /// Resolve every scene; only a broken worker pool is an error
    pub fn resolve(&self, scenes: &[Scene], assets: &AssetMap) -> Result<Vec<ResolvedScene>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("scene-probe-{}", i))
            .build()
            .map_err(|e| MediaError::WorkerPool { reason: e.to_string() })?;

        let candidates: Vec<(SceneId, &Path)> = scenes
            .iter()
            .filter_map(|scene| assets.get(scene.id).map(|path| (scene.id, path)))
            .collect();

        debug!(
            "Probing {} of {} scenes on {} workers",
            candidates.len(),
            scenes.len(),
            self.workers
        );

        let by_id: HashMap<SceneId, ResolvedClip> = pool.install(|| {
            candidates
                .par_iter()
                .map(|&(id, path)| (id, self.resolve_one(id, path)))
                .collect()
        });

        let resolved: Vec<ResolvedScene> = scenes
            .iter()
            .map(|scene| {
                let clip = by_id.get(&scene.id).cloned().unwrap_or(ResolvedClip::Placeholder {
                    reason: PlaceholderReason::MissingAsset,
                });

                if let ResolvedClip::Placeholder { reason } = &clip {
                    warn!(
                        "Scene {} ('{}') uses placeholder: {}",
                        scene.id,
                        scene.visual_query(),
                        reason
                    );
                }

                ResolvedScene { scene_id: scene.id, clip }
            })
            .collect();

        let placeholders = resolved.iter().filter(|s| s.clip.is_placeholder()).count();
        info!(
            "   Resolved {} scenes ({} placeholders, {} stills)",
            resolved.len(),
            placeholders,
            resolved.iter().filter(|s| s.clip.is_static_image()).count()
        );

        Ok(resolved)
    }

    fn resolve_one(&self, scene_id: SceneId, path: &Path) -> ResolvedClip {
        match self.probe.probe(path) {
            ProbeOutcome::Invalid(reason) => ResolvedClip::Placeholder {
                reason: PlaceholderReason::InvalidMedia(reason),
            },
            ProbeOutcome::Valid(media) => match media.kind {
                MediaKind::Video => ResolvedClip::Video {
                    transform: normalize(FrameSize::new(media.width, media.height), self.target),
                    native_duration: media.duration.unwrap_or_default(),
                    path: media.path,
                },
                MediaKind::Still => match self.prepare_still(scene_id, &media) {
                    Ok(normalized) => ResolvedClip::Still {
                        path: normalized,
                        source: media.path,
                    },
                    Err(e) => ResolvedClip::Placeholder {
                        reason: PlaceholderReason::StillPreparation(e.to_string()),
                    },
                },
            },
        }
    }

    /// Crop and scale a still to the output frame and write it into the working directory
    fn prepare_still(&self, scene_id: SceneId, media: &ValidMedia) -> Result<PathBuf> {
        let frame = Frame::open(&media.path).map_err(|e| MediaError::ImageDecode {
            path: media.path.display().to_string(),
            reason: e.to_string(),
        })?;

        let normalized = normalize(frame.size(), self.target).apply(&frame);
        let out_path = self.workdir.join(format!("scene_{:03}.png", scene_id));

        normalized.save_png(&out_path).map_err(|e| MediaError::ImageWrite {
            path: out_path.display().to_string(),
            reason: e.to_string(),
        })?;

        debug!("Normalized still for scene {} -> {:?}", scene_id, out_path);
        Ok(out_path)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::video::probe::InvalidReason;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::tempdir;

    /// Probe answering from a table, optionally slower for some paths
    pub(crate) struct TableProbe {
        pub entries: HashMap<PathBuf, ProbeOutcome>,
        pub delays: HashMap<PathBuf, Duration>,
        pub calls: Mutex<Vec<PathBuf>>,
    }

    impl TableProbe {
        pub(crate) fn new() -> Self {
            Self {
                entries: HashMap::new(),
                delays: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn video(mut self, path: &str, seconds: f64) -> Self {
            self.entries.insert(
                PathBuf::from(path),
                ProbeOutcome::Valid(ValidMedia {
                    path: PathBuf::from(path),
                    kind: MediaKind::Video,
                    width: 1920,
                    height: 1080,
                    duration: Some(seconds),
                }),
            );
            self
        }

        pub(crate) fn still(mut self, path: &Path, width: u32, height: u32) -> Self {
            self.entries.insert(
                path.to_path_buf(),
                ProbeOutcome::Valid(ValidMedia {
                    path: path.to_path_buf(),
                    kind: MediaKind::Still,
                    width,
                    height,
                    duration: None,
                }),
            );
            self
        }

        pub(crate) fn invalid(mut self, path: &str, reason: InvalidReason) -> Self {
            self.entries.insert(PathBuf::from(path), ProbeOutcome::Invalid(reason));
            self
        }
    }

    impl MediaProbe for TableProbe {
        fn probe(&self, path: &Path) -> ProbeOutcome {
            if let Some(delay) = self.delays.get(path) {
                std::thread::sleep(*delay);
            }
            self.calls.lock().unwrap().push(path.to_path_buf());
            self.entries
                .get(path)
                .cloned()
                .unwrap_or(ProbeOutcome::Invalid(InvalidReason::Missing))
        }
    }

    fn scene(id: SceneId) -> Scene {
        serde_json::from_value(serde_json::json!({"id": id, "visual": {"query": format!("query {}", id)}}))
            .unwrap()
    }

    #[test]
    fn test_missing_and_invalid_become_placeholders() {
        let dir = tempdir().unwrap();
        let probe = TableProbe::new()
            .video("ok.mp4", 5.0)
            .invalid("bad.mp4", InvalidReason::TooShort { duration: 0.0 });
        let resolver = SceneResolver::new(Arc::new(probe), FrameSize::new(1080, 1920), 2, dir.path());

        let scenes = vec![scene(1), scene(2), scene(3)];
        let assets: AssetMap = [(2, "ok.mp4"), (3, "bad.mp4")].into_iter().collect();

        let resolved = resolver.resolve(&scenes, &assets).unwrap();
        assert_eq!(resolved.len(), 3);
        assert!(matches!(
            resolved[0].clip,
            ResolvedClip::Placeholder { reason: PlaceholderReason::MissingAsset }
        ));
        assert!(matches!(resolved[1].clip, ResolvedClip::Video { native_duration, .. } if native_duration == 5.0));
        assert!(matches!(
            resolved[2].clip,
            ResolvedClip::Placeholder { reason: PlaceholderReason::InvalidMedia(InvalidReason::TooShort { .. }) }
        ));
    }

    #[test]
    fn test_order_follows_blueprint_not_completion() {
        let dir = tempdir().unwrap();
        let mut probe = TableProbe::new()
            .video("slow.mp4", 3.0)
            .video("fast_a.mp4", 4.0)
            .video("fast_b.mp4", 6.0);
        probe.delays.insert(PathBuf::from("slow.mp4"), Duration::from_millis(80));
        let resolver = SceneResolver::new(Arc::new(probe), FrameSize::new(1080, 1920), 3, dir.path());

        let scenes = vec![scene(7), scene(3), scene(9)];
        let assets: AssetMap = [(7, "slow.mp4"), (3, "fast_a.mp4"), (9, "fast_b.mp4")].into_iter().collect();

        let resolved = resolver.resolve(&scenes, &assets).unwrap();
        let ids: Vec<SceneId> = resolved.iter().map(|s| s.scene_id).collect();
        assert_eq!(ids, vec![7, 3, 9]);
        let durations: Vec<f64> = resolved
            .iter()
            .map(|s| match s.clip {
                ResolvedClip::Video { native_duration, .. } => native_duration,
                _ => panic!("expected video"),
            })
            .collect();
        assert_eq!(durations, vec![3.0, 4.0, 6.0]);
    }

    #[test]
    fn test_still_is_normalized_into_workdir() {
        let dir = tempdir().unwrap();
        let still = dir.path().join("landscape.png");
        Frame::new_filled(160, 90, [5, 6, 7]).save_png(&still).unwrap();

        let probe = crate::video::probe::FfprobeProbe::default();
        let target = FrameSize::new(54, 96);
        let resolver = SceneResolver::new(Arc::new(probe), target, 1, dir.path());

        let mut assets = AssetMap::new();
        assets.insert(4, &still);
        let resolved = resolver.resolve(&[scene(4)], &assets).unwrap();

        match &resolved[0].clip {
            ResolvedClip::Still { path, source } => {
                assert_eq!(source, &still);
                assert_eq!(path, &dir.path().join("scene_004.png"));
                assert_eq!(Frame::open(path).unwrap().size(), target);
            }
            other => panic!("expected still, got {:?}", other),
        }
    }

    #[test]
    fn test_extensionless_still_is_decoded_by_content() {
        let dir = tempdir().unwrap();
        let download = dir.path().join("download");
        Frame::new_filled(160, 90, [9, 9, 9]).save_png(&download).unwrap();

        let probe = TableProbe::new().still(&download, 160, 90);
        let target = FrameSize::new(54, 96);
        let resolver = SceneResolver::new(Arc::new(probe), target, 1, dir.path());

        let mut assets = AssetMap::new();
        assets.insert(2, &download);
        let resolved = resolver.resolve(&[scene(2)], &assets).unwrap();

        match &resolved[0].clip {
            ResolvedClip::Still { path, .. } => {
                assert_eq!(Frame::open(path).unwrap().size(), target);
            }
            other => panic!("expected still, got {:?}", other),
        }
    }
}
