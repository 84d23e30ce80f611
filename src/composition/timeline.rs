//! Master clock, per-scene duration allocation and clip duration locking.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::blueprint::SceneId;
use crate::config::Config;
use crate::video::{FrameTransform, PlaceholderReason, ResolvedClip, ResolvedScene, ZoomCurve};

/// Tolerance below which a clip is considered to already match its slot
const EXACT_EPSILON: f64 = 1e-6;

/// The single duration every other timing derives from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasterClock {
    /// Measured voice track length in seconds
    pub voice_duration: f64,
    /// Trailing silence appended after the voice
    pub buffer: f64,
}

impl MasterClock {
    pub fn new(voice_duration: f64, buffer: f64) -> Self {
        Self { voice_duration, buffer }
    }

    pub fn duration(&self) -> f64 {
        self.voice_duration + self.buffer
    }
}

/// What has to happen to a clip so it fills its slot exactly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAction {
    Exact,
    /// Keep the first `target` seconds
    Trim,
    /// Play the clip `repeats` times back to back, then cut at `target`
    Loop { repeats: u32 },
}

/// Duration lock of one clip against its allotted slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationLock {
    pub native: f64,
    pub target: f64,
    pub action: LockAction,
}

impl DurationLock {
    /// Decide between trimming and looping `native` seconds of media to `target`
    pub fn lock(native: f64, target: f64) -> Self {
        let action = if (native - target).abs() <= EXACT_EPSILON {
            LockAction::Exact
        } else if native > target {
            LockAction::Trim
        } else if native > 0.0 {
            LockAction::Loop {
                repeats: (target / native).ceil().max(1.0) as u32,
            }
        } else {
            // No measurable native length; an endless loop cut at the target is the only option
            LockAction::Loop { repeats: u32::MAX }
        };

        Self { native, target, action }
    }

    /// Duration the locked clip reports
    pub fn locked_duration(&self) -> f64 {
        match self.action {
            LockAction::Exact => self.target,
            LockAction::Trim => self.native.min(self.target),
            LockAction::Loop { repeats } => (self.native * repeats as f64).min(self.target),
        }
    }

    /// Extra passes over the input beyond the first, as the encoder's `-stream_loop` expects
    pub fn extra_loops(&self) -> u32 {
        match self.action {
            LockAction::Loop { repeats: u32::MAX } => u32::MAX,
            LockAction::Loop { repeats } => repeats.saturating_sub(1),
            _ => 0,
        }
    }

    pub fn is_looped(&self) -> bool {
        matches!(self.action, LockAction::Loop { .. })
    }
}

/// Visual content of a slot
#[derive(Debug, Clone)]
pub enum SlotSource {
    Video {
        path: PathBuf,
        transform: FrameTransform,
        lock: DurationLock,
    },
    /// Normalized still; `zoom` is `None` when still motion is disabled
    Still {
        path: PathBuf,
        zoom: Option<ZoomCurve>,
    },
    Placeholder {
        color: [u8; 3],
        reason: PlaceholderReason,
    },
}

/// One scene's segment of the timeline
#[derive(Debug, Clone)]
pub struct TimelineSlot {
    pub scene_id: SceneId,
    /// Offset from the start of the video in seconds
    pub start: f64,
    pub allotted_duration: f64,
    pub source: SlotSource,
}

impl TimelineSlot {
    pub fn end(&self) -> f64 {
        self.start + self.allotted_duration
    }

    pub fn is_static_image(&self) -> bool {
        matches!(self.source, SlotSource::Still { .. })
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.source, SlotSource::Placeholder { .. })
    }

    /// Duration the slot's source delivers after locking
    pub fn delivered_duration(&self) -> f64 {
        match &self.source {
            SlotSource::Video { lock, .. } => lock.locked_duration(),
            _ => self.allotted_duration,
        }
    }
}

/// Ordered, gapless sequence of slots covering the master clock
#[derive(Debug, Clone)]
pub struct Timeline {
    pub clock: MasterClock,
    pub slots: Vec<TimelineSlot>,
}

impl Timeline {
    pub fn duration(&self) -> f64 {
        self.clock.duration()
    }

    /// Sum of the slot durations; equals the clock duration up to float error
    pub fn total_duration(&self) -> f64 {
        self.slots.iter().map(|s| s.allotted_duration).sum()
    }
}

/// Splits the master clock across scenes and locks each source to its slot
#[derive(Debug, Clone)]
pub struct DurationAllocator {
    fps: f64,
    quantize: bool,
    zoom_rate: f64,
    placeholder_color: [u8; 3],
}

impl DurationAllocator {
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            quantize: true,
            zoom_rate: 0.04,
            placeholder_color: [28, 28, 28],
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            fps: config.video.params.fps,
            quantize: config.composition.quantize_to_frames,
            zoom_rate: config.composition.zoom_rate,
            placeholder_color: config.composition.placeholder_color,
        }
    }

    pub fn with_quantization(mut self, quantize: bool) -> Self {
        self.quantize = quantize;
        self
    }

    /// Per-scene durations summing to `total`
    ///
    /// Equal shares unless `estimates` is given, in which case the estimates are
    /// scaled to the clock. With quantization on, interior cut points snap to
    /// the nearest frame and the final cut is pinned to `total`; if snapping
    /// would empty a slot the unsnapped durations are kept.
    pub fn partition(&self, total: f64, scene_count: usize, estimates: Option<&[f64]>) -> Vec<f64> {
        if scene_count == 0 {
            return Vec::new();
        }

        let weights: Vec<f64> = match estimates {
            Some(estimates) if estimates.len() == scene_count && estimates.iter().all(|e| *e > 0.0) => {
                estimates.to_vec()
            }
            Some(_) => {
                warn!("Duration estimates do not cover every scene; using equal partition");
                vec![1.0; scene_count]
            }
            None => vec![1.0; scene_count],
        };
        let weight_sum: f64 = weights.iter().sum();

        let mut boundaries = Vec::with_capacity(scene_count + 1);
        boundaries.push(0.0);
        let mut acc = 0.0;
        for weight in &weights[..scene_count - 1] {
            acc += weight;
            boundaries.push(total * acc / weight_sum);
        }
        boundaries.push(total);

        let raw = Self::spans(&boundaries);

        if !self.quantize || !(self.fps > 0.0) {
            return raw;
        }

        let mut snapped = boundaries.clone();
        let last = snapped.len() - 1;
        for b in &mut snapped[1..last] {
            *b = (*b * self.fps).round() / self.fps;
        }
        let quantized = Self::spans(&snapped);

        if quantized.iter().all(|d| *d > 0.0) {
            quantized
        } else {
            debug!("Frame quantization would empty a slot; keeping exact partition");
            raw
        }
    }

    fn spans(boundaries: &[f64]) -> Vec<f64> {
        boundaries.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Build the timeline from resolved scenes in blueprint order
    pub fn allocate(&self, clock: MasterClock, scenes: &[ResolvedScene], estimates: Option<&[f64]>) -> Timeline {
        let durations = self.partition(clock.duration(), scenes.len(), estimates);

        let mut start = 0.0;
        let slots = scenes
            .iter()
            .zip(durations)
            .map(|(scene, allotted)| {
                let source = match &scene.clip {
                    ResolvedClip::Video { path, native_duration, transform } => {
                        let lock = DurationLock::lock(*native_duration, allotted);
                        debug!(
                            "Scene {}: {:.3}s clip -> {:.3}s slot ({:?})",
                            scene.scene_id, native_duration, allotted, lock.action
                        );
                        SlotSource::Video {
                            path: path.clone(),
                            transform: *transform,
                            lock,
                        }
                    }
                    ResolvedClip::Still { path, .. } => SlotSource::Still {
                        path: path.clone(),
                        zoom: ZoomCurve::for_still(self.zoom_rate),
                    },
                    ResolvedClip::Placeholder { reason } => SlotSource::Placeholder {
                        color: self.placeholder_color,
                        reason: reason.clone(),
                    },
                };

                let slot = TimelineSlot {
                    scene_id: scene.scene_id,
                    start,
                    allotted_duration: allotted,
                    source,
                };
                start += allotted;
                slot
            })
            .collect();

        Timeline { clock, slots }
    }
}
