//! # Shorts-Compositor
//!
//! Assemble vertical short videos from a scene blueprint, per-scene media,
//! a synthesized voice track, mood music and branded captions.
//!
//! The voice track fixes the master clock. Every scene gets a slot of that
//! clock, scene media is cropped to the portrait frame and looped or trimmed
//! to fill its slot exactly, and missing or broken media degrades to a
//! placeholder instead of failing the render.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shorts_compositor::{
//!     blueprint::{AssetMap, Blueprint},
//!     composition::{Assembler, AssemblyRequest},
//!     config::Config,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let blueprint = Blueprint::from_file("blueprint.json")?;
//! let assets = AssetMap::from_file("assets.json")?;
//!
//! let assembler = Assembler::new(Config::default());
//! let report = assembler
//!     .assemble(AssemblyRequest::new(blueprint, assets, "voice_main.mp3").with_watermark("@channel"))
//!     .await?;
//!
//! println!("Rendered {:?}", report.output_path);
//! for degradation in &report.degradations {
//!     println!("  degraded: {}", degradation);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`blueprint`] - Scene plan and asset map ingestion
//! - [`audio`] - Voice measurement and music mixing
//! - [`video`] - Media probing, frame normalization and scene resolution
//! - [`composition`] - Duration allocation, overlays and the orchestrator
//! - [`render`] - Encode job and the ffmpeg backend
//! - [`config`] - Configuration management
//!
//! ## Custom Backends
//!
//! Probing and rendering sit behind the [`MediaProbe`](video::MediaProbe) and
//! [`RenderBackend`](render::RenderBackend) traits:
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use shorts_compositor::error::RenderError;
//! use shorts_compositor::render::{RenderBackend, RenderJob};
//!
//! struct DryRun;
//!
//! impl RenderBackend for DryRun {
//!     fn name(&self) -> &str {
//!         "dry-run"
//!     }
//!
//!     fn is_available(&self) -> bool {
//!         true
//!     }
//!
//!     fn render(&self, job: &RenderJob) -> Result<PathBuf, RenderError> {
//!         println!("{:?}", shorts_compositor::render::build_args(job));
//!         Ok(job.output_path.clone())
//!     }
//! }
//! ```

pub mod audio;
pub mod blueprint;
pub mod composition;
pub mod config;
pub mod error;
pub mod render;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    composition::{Assembler, AssemblyFailure, AssemblyReport, AssemblyRequest, Degradation},
    config::Config,
    error::{CompositorError, Result},
};
