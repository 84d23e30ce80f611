use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, Result},
    video::VideoParams,
};

/// Main configuration for the Shorts-Compositor
///
/// Built once at startup and handed to the [`Assembler`](crate::Assembler); nothing in
/// the pipeline mutates it afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output encode profile
    pub video: VideoConfig,

    /// Voice and music settings
    pub audio: AudioConfig,

    /// Timeline assembly settings
    pub composition: CompositionConfig,

    /// Caption and branding styling
    pub overlay: OverlayConfig,

    /// File-system locations
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| {
            ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string(),
            }
            .into()
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.video.validate()?;
        self.audio.validate()?;
        self.composition.validate()?;
        self.overlay.validate()?;
        Ok(())
    }

    /// Duration of one output frame in seconds
    pub fn frame_duration(&self) -> f64 {
        1.0 / self.video.params.fps
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue { key: key.to_string(), value: value.to_string() }
}

/// Fixed encode profile settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Frame size, frame rate, codec and quality
    pub params: VideoParams,

    /// Encoder preset (speed over compression)
    pub preset: String,

    /// Audio codec for the mixed track
    pub audio_codec: String,

    /// Audio bitrate passed to the encoder
    pub audio_bitrate: String,

    /// Output pixel format
    pub pixel_format: String,

    /// Encoder thread count
    pub threads: usize,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            params: VideoParams::default(),
            preset: "ultrafast".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            pixel_format: "yuv420p".to_string(),
            threads: 4,
        }
    }
}

impl VideoConfig {
    fn validate(&self) -> Result<()> {
        let (width, height) = self.params.resolution;
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(invalid("video.params.resolution", format!("{}x{}", width, height)).into());
        }

        if !(self.params.fps.is_finite() && self.params.fps > 0.0) {
            return Err(invalid("video.params.fps", self.params.fps).into());
        }

        if self.params.quality > 100 {
            return Err(invalid("video.params.quality", self.params.quality).into());
        }

        if self.threads == 0 {
            return Err(invalid("video.threads", self.threads).into());
        }

        Ok(())
    }
}

/// Voice and music settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Silence appended to the voice duration to form the master clock (seconds)
    pub buffer_secs: f64,

    /// Music amplitude relative to the voice (0.0-1.0)
    pub duck_level: f32,

    /// Mood used when the requested mood has no file
    pub default_mood: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            buffer_secs: 0.5,
            duck_level: 0.12,
            default_mood: "chill".to_string(),
        }
    }
}

impl AudioConfig {
    fn validate(&self) -> Result<()> {
        if !(self.buffer_secs.is_finite() && self.buffer_secs >= 0.0) {
            return Err(invalid("audio.buffer_secs", self.buffer_secs).into());
        }

        if !(0.0..=1.0).contains(&self.duck_level) {
            return Err(invalid("audio.duck_level", self.duck_level).into());
        }

        if self.default_mood.trim().is_empty() {
            return Err(invalid("audio.default_mood", "<empty>").into());
        }

        Ok(())
    }
}

/// Timeline assembly settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionConfig {
    /// Slow-zoom growth per second for still images
    pub zoom_rate: f64,

    /// Placeholder color for scenes without usable media
    pub placeholder_color: [u8; 3],

    /// Worker threads used to probe scene media
    pub probe_workers: usize,

    /// Shortest clip accepted by the probe (seconds)
    pub min_clip_duration: f64,

    /// Snap scene boundaries to output frame boundaries
    pub quantize_to_frames: bool,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            zoom_rate: 0.04,
            placeholder_color: [28, 28, 28],
            probe_workers: num_cpus::get().clamp(1, 4),
            min_clip_duration: 0.1,
            quantize_to_frames: true,
        }
    }
}

impl CompositionConfig {
    fn validate(&self) -> Result<()> {
        if !(self.zoom_rate.is_finite() && self.zoom_rate >= 0.0) {
            return Err(invalid("composition.zoom_rate", self.zoom_rate).into());
        }

        if self.probe_workers == 0 {
            return Err(invalid("composition.probe_workers", self.probe_workers).into());
        }

        if !(self.min_clip_duration > 0.0) {
            return Err(invalid("composition.min_clip_duration", self.min_clip_duration).into());
        }

        Ok(())
    }
}

/// Where caption text comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptionSource {
    /// One caption per scene from `overlay_text`
    OverlayText,
    /// Short word chunks of each scene's narration
    Narration,
}

/// Caption and branding styling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub caption_source: CaptionSource,

    /// Font file for captions and watermark; falls back to `font_family` when unset
    pub font_file: Option<PathBuf>,

    pub font_family: String,

    pub caption_font_size: u32,

    pub caption_color: String,

    pub stroke_color: String,

    pub stroke_width: u32,

    /// Fraction of the frame width captions may occupy
    pub caption_wrap_ratio: f32,

    /// Words per caption when captioning narration
    pub narration_chunk_words: usize,

    pub watermark_font_size: u32,

    pub watermark_color: String,

    pub watermark_opacity: f32,

    /// Distance of the watermark from the bottom edge (pixels)
    pub watermark_bottom_offset: u32,

    /// Logo opacity when the blueprint gives none
    pub logo_opacity: f32,

    pub logo_height: u32,

    pub logo_margin: u32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            caption_source: CaptionSource::OverlayText,
            font_file: None,
            font_family: "DejaVu Sans".to_string(),
            caption_font_size: 70,
            caption_color: "yellow".to_string(),
            stroke_color: "black".to_string(),
            stroke_width: 3,
            caption_wrap_ratio: 0.8,
            narration_chunk_words: 5,
            watermark_font_size: 30,
            watermark_color: "white".to_string(),
            watermark_opacity: 0.6,
            watermark_bottom_offset: 170,
            logo_opacity: 0.8,
            logo_height: 150,
            logo_margin: 50,
        }
    }
}

impl OverlayConfig {
    fn validate(&self) -> Result<()> {
        if self.caption_font_size == 0 || self.watermark_font_size == 0 {
            return Err(invalid(
                "overlay.font_size",
                format!("{}/{}", self.caption_font_size, self.watermark_font_size),
            )
            .into());
        }

        if !(self.caption_wrap_ratio > 0.0 && self.caption_wrap_ratio <= 1.0) {
            return Err(invalid("overlay.caption_wrap_ratio", self.caption_wrap_ratio).into());
        }

        if self.narration_chunk_words == 0 {
            return Err(invalid("overlay.narration_chunk_words", 0).into());
        }

        for (key, value) in [
            ("overlay.watermark_opacity", self.watermark_opacity),
            ("overlay.logo_opacity", self.logo_opacity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(key, value).into());
            }
        }

        if self.logo_height == 0 {
            return Err(invalid("overlay.logo_height", 0).into());
        }

        Ok(())
    }
}

/// File-system locations shared by every invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub output_dir: PathBuf,

    /// Parent of the per-invocation working directories
    pub temp_dir: PathBuf,

    /// Holds one music file per mood (`chill.mp3`, `upbeat.mp3`, ...)
    pub music_dir: PathBuf,

    pub output_prefix: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data/output"),
            temp_dir: PathBuf::from("assets/temp"),
            music_dir: PathBuf::from("assets/music"),
            output_prefix: "short".to_string(),
        }
    }
}
