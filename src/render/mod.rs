//! # Render Module
//!
//! Turns a finished timeline, audio plan and overlay set into one encoded file.

pub mod ffmpeg;
pub mod job;

pub use ffmpeg::{build_args, FfmpegBackend, RenderBackend};
pub use job::{unique_output_path, EncodeProfile, RenderJob};
