//! Pipeline stages, degradation records and the assembly outcome.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::blueprint::SceneId;
use crate::composition::timeline::{MasterClock, SlotSource, Timeline};
use crate::error::CompositorError;

/// Orchestrator states, in the only order they can be visited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    LoadingAudio,
    ResolvingScenes,
    AllocatingDurations,
    MixingAudio,
    Compositing,
    Rendering,
    Done,
    Failed,
}

impl PipelineStage {
    /// Successor on the happy path; terminal states have none
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::LoadingAudio),
            Self::LoadingAudio => Some(Self::ResolvingScenes),
            Self::ResolvingScenes => Some(Self::AllocatingDurations),
            Self::AllocatingDurations => Some(Self::MixingAudio),
            Self::MixingAudio => Some(Self::Compositing),
            Self::Compositing => Some(Self::Rendering),
            Self::Rendering => Some(Self::Done),
            Self::Done | Self::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::LoadingAudio => "loading audio",
            Self::ResolvingScenes => "resolving scenes",
            Self::AllocatingDurations => "allocating durations",
            Self::MixingAudio => "mixing audio",
            Self::Compositing => "compositing",
            Self::Rendering => "rendering",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Records stage transitions for one assembly call
#[derive(Debug, Clone)]
pub struct StageTracker {
    current: PipelineStage,
    visited: Vec<PipelineStage>,
}

impl StageTracker {
    pub fn new() -> Self {
        Self {
            current: PipelineStage::Idle,
            visited: vec![PipelineStage::Idle],
        }
    }

    pub fn current(&self) -> PipelineStage {
        self.current
    }

    pub fn visited(&self) -> &[PipelineStage] {
        &self.visited
    }

    /// Step to the next stage; a terminal tracker stays put
    pub fn advance(&mut self) -> PipelineStage {
        if let Some(next) = self.current.next() {
            info!("Pipeline: {} -> {}", self.current, next);
            self.current = next;
            self.visited.push(next);
        }
        self.current
    }

    /// Turn an error raised in the current stage into a failure
    pub fn fail(mut self, cause: CompositorError) -> AssemblyFailure {
        let stage = self.current;
        self.visited.push(PipelineStage::Failed);
        AssemblyFailure {
            stage,
            cause,
            visited: self.visited,
        }
    }
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// A recoverable problem absorbed during assembly
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// Scene rendered as a solid-color placeholder
    PlaceholderScene { scene_id: SceneId, reason: String },
    /// Requested music mood had no file; another mood was used
    MusicFallback { requested: String, used: String },
    /// No music file at all; the audio track is voice only
    MusicUnavailable { requested: String },
    CaptionSkipped { scene_id: SceneId, reason: String },
    /// Neither logo nor watermark could be drawn
    BrandingSkipped { reason: String },
    /// Logo was unusable and the watermark text was drawn instead
    LogoFallback { reason: String },
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlaceholderScene { scene_id, reason } => {
                write!(f, "scene {} uses placeholder ({})", scene_id, reason)
            }
            Self::MusicFallback { requested, used } => {
                write!(f, "music mood '{}' unavailable, used '{}'", requested, used)
            }
            Self::MusicUnavailable { requested } => {
                write!(f, "no music for mood '{}', voice only", requested)
            }
            Self::CaptionSkipped { scene_id, reason } => {
                write!(f, "caption for scene {} skipped ({})", scene_id, reason)
            }
            Self::BrandingSkipped { reason } => write!(f, "branding skipped ({})", reason),
            Self::LogoFallback { reason } => write!(f, "logo unusable, watermark drawn ({})", reason),
        }
    }
}

/// Source kind of a rendered slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Video,
    Still,
    Placeholder,
}

/// Per-scene timing as rendered
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotSummary {
    pub scene_id: SceneId,
    pub start: f64,
    pub duration: f64,
    pub kind: SlotKind,
    pub looped: bool,
}

impl SlotSummary {
    pub fn from_timeline(timeline: &Timeline) -> Vec<Self> {
        timeline
            .slots
            .iter()
            .map(|slot| {
                let (kind, looped) = match &slot.source {
                    SlotSource::Video { lock, .. } => (SlotKind::Video, lock.is_looped()),
                    SlotSource::Still { .. } => (SlotKind::Still, false),
                    SlotSource::Placeholder { .. } => (SlotKind::Placeholder, false),
                };
                Self {
                    scene_id: slot.scene_id,
                    start: slot.start,
                    duration: slot.allotted_duration,
                    kind,
                    looped,
                }
            })
            .collect()
    }
}

/// Successful assembly, possibly degraded
#[derive(Debug, Clone, Serialize)]
pub struct AssemblyReport {
    pub output_path: PathBuf,
    /// Master clock duration in seconds
    pub duration: f64,
    pub voice_duration: f64,
    pub slots: Vec<SlotSummary>,
    /// Empty for a clean run
    pub degradations: Vec<Degradation>,
    pub stages: Vec<PipelineStage>,
}

impl AssemblyReport {
    pub fn new(
        output_path: PathBuf,
        clock: MasterClock,
        timeline: &Timeline,
        degradations: Vec<Degradation>,
        stages: Vec<PipelineStage>,
    ) -> Self {
        Self {
            output_path,
            duration: clock.duration(),
            voice_duration: clock.voice_duration,
            slots: SlotSummary::from_timeline(timeline),
            degradations,
            stages,
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }

    pub fn placeholder_count(&self) -> usize {
        self.slots.iter().filter(|s| s.kind == SlotKind::Placeholder).count()
    }

    pub fn log_summary(&self) {
        info!("   Output: {:?}", self.output_path);
        info!("   Duration: {:.2}s across {} scenes", self.duration, self.slots.len());
        if self.is_degraded() {
            info!("   Degradations: {}", self.degradations.len());
            for degradation in &self.degradations {
                info!("      - {}", degradation);
            }
        }
    }
}

/// Fatal assembly outcome, naming the stage that failed
#[derive(Debug, Error)]
#[error("assembly failed while {stage}: {cause}")]
pub struct AssemblyFailure {
    pub stage: PipelineStage,
    #[source]
    pub cause: CompositorError,
    pub visited: Vec<PipelineStage>,
}

impl AssemblyFailure {
    pub fn final_stage(&self) -> PipelineStage {
        PipelineStage::Failed
    }

    pub fn user_message(&self) -> String {
        self.cause.user_message()
    }
}
