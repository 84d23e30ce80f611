//! # Scene Media Module
//!
//! Validates scene sources, normalizes them to the vertical output frame and
//! picks a placeholder for anything that cannot be used.

pub mod normalizer;
pub mod probe;
pub mod resolver;
pub mod types;

pub use normalizer::{normalize, CropRect, FrameSize, FrameTransform, ZoomCurve};
pub use probe::{FfprobeProbe, InvalidReason, MediaProbe, ProbeOutcome, ValidMedia};
pub use resolver::SceneResolver;
pub use types::{Frame, MediaKind, PlaceholderReason, ResolvedClip, ResolvedScene, VideoParams};
