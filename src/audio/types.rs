use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Decoded audio file metadata
#[derive(Debug, Clone)]
pub struct AudioInfo {
    /// Duration in seconds
    pub duration: f64,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Original file path
    pub file_path: PathBuf,

    /// Audio format information
    pub format: AudioFormat,
}

impl AudioInfo {
    /// Number of sample frames covered by the duration
    pub fn frame_count(&self) -> u64 {
        (self.duration * self.sample_rate as f64).round() as u64
    }
}

/// Audio file format information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFormat {
    /// File extension (wav, mp3, flac, etc.)
    pub extension: String,

    /// Bit depth (16, 24, 32, etc.)
    pub bit_depth: Option<u16>,

    /// Codec description for compressed formats
    pub compression: Option<String>,
}
