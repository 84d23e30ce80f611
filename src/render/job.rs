use std::path::{Path, PathBuf};

use chrono::Local;
use rand::Rng;
use tracing::debug;

use crate::audio::AudioPlan;
use crate::composition::overlay::OverlayLayer;
use crate::composition::timeline::Timeline;
use crate::config::Config;
use crate::error::RenderError;
use crate::video::FrameSize;

/// The one fixed output profile
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeProfile {
    pub frame: FrameSize,
    pub fps: f64,
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub pixel_format: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub threads: usize,
}

impl EncodeProfile {
    pub fn from_config(config: &Config) -> Self {
        let video = &config.video;
        Self {
            frame: video.params.frame_size(),
            fps: video.params.fps,
            video_codec: video.params.codec.clone(),
            preset: video.preset.clone(),
            crf: video.params.crf(),
            pixel_format: video.pixel_format.clone(),
            audio_codec: video.audio_codec.clone(),
            audio_bitrate: video.audio_bitrate.clone(),
            threads: video.threads,
        }
    }
}

impl Default for EncodeProfile {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Everything the renderer needs for one output file
///
/// Built once per assembly and handed to the backend by reference; nothing
/// modifies it after submission.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub timeline: Timeline,
    pub audio: AudioPlan,
    /// Stacking order, bottom to top
    pub overlays: Vec<OverlayLayer>,
    pub output_path: PathBuf,
    pub profile: EncodeProfile,
}

impl RenderJob {
    pub fn duration(&self) -> f64 {
        self.timeline.duration()
    }
}

/// Pick an unused `<prefix>_<timestamp>_<hex>.mp4` in `dir`, creating `dir` if needed
pub fn unique_output_path(dir: &Path, prefix: &str) -> Result<PathBuf, RenderError> {
    std::fs::create_dir_all(dir).map_err(|e| RenderError::OutputUnwritable {
        path: dir.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut rng = rand::thread_rng();
    loop {
        let name = format!(
            "{}_{}_{:08x}.mp4",
            prefix,
            Local::now().format("%Y%m%d_%H%M%S"),
            rng.gen::<u32>()
        );
        let candidate = dir.join(name);
        if !candidate.exists() {
            debug!("Output path: {:?}", candidate);
            return Ok(candidate);
        }
    }
}
