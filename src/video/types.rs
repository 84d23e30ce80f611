use image::{ImageBuffer, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::blueprint::SceneId;
use crate::video::normalizer::{FrameSize, FrameTransform};
use crate::video::probe::InvalidReason;

/// Represents a single still frame
///
/// Thin wrapper around an RGB image buffer; used to normalize still images
/// before they enter the timeline.
#[derive(Clone, Debug)]
pub struct Frame {
    buffer: RgbImage,
}

impl Frame {
    /// Create a new frame from an RGB image buffer
    pub fn new(buffer: RgbImage) -> Self {
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        let buffer = ImageBuffer::from_fn(width, height, |_, _| Rgb(color));
        Self { buffer }
    }

    /// Decode an image file into a frame
    ///
    /// The format is sniffed from the content, so extension-less downloads decode too.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self, image::ImageError> {
        let image = image::io::Reader::open(path)?.with_guessed_format()?.decode()?;
        let rgb_image = match image {
            image::DynamicImage::ImageRgb8(img) => img,
            _ => image.to_rgb8(),
        };
        Ok(Self::new(rgb_image))
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width(), self.height())
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.buffer.get_pixel(x, y).0
    }

    /// Get the underlying image buffer
    pub fn as_image(&self) -> &RgbImage {
        &self.buffer
    }

    /// Save the frame as a PNG file
    pub fn save_png<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), image::ImageError> {
        self.buffer.save_with_format(path, image::ImageFormat::Png)
    }
}

/// Fixed output profile parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoParams {
    /// Target frame rate for output
    pub fps: f64,

    /// Target resolution (width, height)
    pub resolution: (u32, u32),

    /// Video codec to use for output
    pub codec: String,

    /// Quality setting (0-100, higher is better)
    pub quality: u8,
}

impl Default for VideoParams {
    fn default() -> Self {
        Self {
            fps: 30.0,
            resolution: (1080, 1920),
            codec: "libx264".to_string(),
            quality: 55,
        }
    }
}

impl VideoParams {
    pub fn frame_size(&self) -> FrameSize {
        FrameSize::new(self.resolution.0, self.resolution.1)
    }

    /// Map the 0-100 quality scale onto x264's CRF range
    pub fn crf(&self) -> u8 {
        (51 - ((self.quality.min(100) as f32 / 100.0) * 51.0) as u8).clamp(0, 51)
    }
}

/// Whether a source is a moving clip or a still image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Still,
}

impl MediaKind {
    const STILL_EXTENSIONS: [&'static str; 7] = ["jpg", "jpeg", "png", "bmp", "gif", "tiff", "webp"];
    const VIDEO_EXTENSIONS: [&'static str; 6] = ["mp4", "mov", "mkv", "webm", "avi", "m4v"];

    /// Classify by extension; `None` means the content has to decide
    pub fn from_extension<P: AsRef<std::path::Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
        if Self::STILL_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Still)
        } else if Self::VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Video)
        } else {
            None
        }
    }
}

/// Why a scene fell back to the placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum PlaceholderReason {
    /// The asset map had no entry for the scene
    MissingAsset,
    /// The entry failed probing
    InvalidMedia(InvalidReason),
    /// A valid still could not be normalized to disk
    StillPreparation(String),
}

impl fmt::Display for PlaceholderReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAsset => write!(f, "no asset acquired"),
            Self::InvalidMedia(reason) => write!(f, "invalid media: {}", reason),
            Self::StillPreparation(reason) => write!(f, "still image preparation failed: {}", reason),
        }
    }
}

/// Source chosen for a scene, before durations are known
#[derive(Debug, Clone)]
pub enum ResolvedClip {
    /// Moving clip; `transform` crops and scales it to the output frame
    Video {
        path: PathBuf,
        native_duration: f64,
        transform: FrameTransform,
    },
    /// Still image already normalized to the output frame size
    Still { path: PathBuf, source: PathBuf },
    /// Solid-color stand-in
    Placeholder { reason: PlaceholderReason },
}

impl ResolvedClip {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder { .. })
    }

    pub fn is_static_image(&self) -> bool {
        matches!(self, Self::Still { .. })
    }
}

/// One scene paired with its resolved source, in blueprint order
#[derive(Debug, Clone)]
pub struct ResolvedScene {
    pub scene_id: SceneId,
    pub clip: ResolvedClip,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_classification() {
        assert_eq!(MediaKind::from_extension("a/b/shot.MP4"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_extension("still.jpeg"), Some(MediaKind::Still));
        assert_eq!(MediaKind::from_extension("download.bin"), None);
        assert_eq!(MediaKind::from_extension("noext"), None);
    }

    #[test]
    fn test_quality_maps_to_crf() {
        let mut params = VideoParams::default();
        assert_eq!(params.crf(), 23);
        params.quality = 100;
        assert_eq!(params.crf(), 0);
        params.quality = 0;
        assert_eq!(params.crf(), 51);
    }

    #[test]
    fn test_filled_frame() {
        let frame = Frame::new_filled(4, 3, [10, 20, 30]);
        assert_eq!(frame.size(), FrameSize::new(4, 3));
        assert_eq!(frame.get_pixel(3, 2), [10, 20, 30]);
    }
}
