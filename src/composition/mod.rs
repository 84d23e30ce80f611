//! # Timeline Assembly
//!
//! The orchestrator and the stages it owns: duration allocation, overlay
//! layers and the assembly report.

pub mod engine;
pub mod overlay;
pub mod report;
pub mod timeline;

pub use engine::{Assembler, AssemblyRequest};
pub use overlay::{BrandingRequest, FontSource, LayerAnchor, LayerContent, OverlayCompositor, OverlayLayer, TextStyle};
pub use report::{AssemblyFailure, AssemblyReport, Degradation, PipelineStage, SlotKind, SlotSummary};
pub use timeline::{DurationAllocator, DurationLock, LockAction, MasterClock, SlotSource, Timeline, TimelineSlot};
