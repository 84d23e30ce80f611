//! Aspect-ratio normalization and slow zoom for still images.

use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};

use crate::video::types::Frame;

/// Pixel dimensions of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// Region of the source frame kept by the crop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Centered crop followed by a scale to the target frame size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTransform {
    pub source: FrameSize,
    pub crop: CropRect,
    pub output: FrameSize,
}

/// Compute the centered crop-and-scale that fills `target` without distortion
///
/// Sources wider than the target lose columns on both sides; taller ones lose
/// rows top and bottom. Applying the result to a frame that already has the
/// target size is the identity.
pub fn normalize(source: FrameSize, target: FrameSize) -> FrameTransform {
    let target_ratio = target.aspect_ratio();
    let source_ratio = source.aspect_ratio();

    let crop = if source_ratio > target_ratio {
        let width = ((source.height as f64 * target_ratio).round() as u32).clamp(1, source.width);
        CropRect {
            x: (source.width - width) / 2,
            y: 0,
            width,
            height: source.height,
        }
    } else {
        let height = ((source.width as f64 / target_ratio).round() as u32).clamp(1, source.height);
        CropRect {
            x: 0,
            y: (source.height - height) / 2,
            width: source.width,
            height,
        }
    };

    FrameTransform { source, crop, output: target }
}

impl FrameTransform {
    pub fn output_size(&self) -> FrameSize {
        self.output
    }

    /// True when neither the crop nor the scale changes anything
    pub fn is_identity(&self) -> bool {
        self.source == self.output
            && self.crop.x == 0
            && self.crop.y == 0
            && self.crop.width == self.source.width
            && self.crop.height == self.source.height
    }

    /// FFmpeg filter chain performing this transform
    pub fn filter_chain(&self) -> String {
        format!(
            "crop={}:{}:{}:{},scale={}:{},setsar=1",
            self.crop.width, self.crop.height, self.crop.x, self.crop.y,
            self.output.width, self.output.height
        )
    }

    /// Apply the transform to pixels
    pub fn apply(&self, frame: &Frame) -> Frame {
        if frame.size() == self.output && self.is_identity() {
            return frame.clone();
        }

        let cropped = imageops::crop_imm(
            frame.as_image(),
            self.crop.x,
            self.crop.y,
            self.crop.width,
            self.crop.height,
        )
        .to_image();

        Frame::new(imageops::resize(
            &cropped,
            self.output.width,
            self.output.height,
            FilterType::Lanczos3,
        ))
    }
}

/// Monotonic zoom `scale(t) = 1 + rate * t` used to animate still images
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomCurve {
    pub rate: f64,
}

impl ZoomCurve {
    /// Zoom for a still scene; a zero rate disables motion entirely
    pub fn for_still(rate: f64) -> Option<Self> {
        (rate > 0.0).then_some(Self { rate })
    }

    pub fn scale_at(&self, seconds: f64) -> f64 {
        1.0 + self.rate * seconds.max(0.0)
    }

    /// FFmpeg `zoompan` filter keeping the zoom centered on the frame
    ///
    /// The input is a looped image at the output frame rate, so `in / fps`
    /// is the slot-relative time.
    pub fn zoompan_filter(&self, output: FrameSize, fps: f64) -> String {
        format!(
            "zoompan=z='1+{rate}*in/{fps}':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d=1:s={w}x{h}:fps={fps}",
            rate = self.rate,
            fps = fps,
            w = output.width,
            h = output.height,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PORTRAIT: FrameSize = FrameSize { width: 1080, height: 1920 };

    #[test]
    fn test_landscape_source_crops_width() {
        let transform = normalize(FrameSize::new(1920, 1080), PORTRAIT);
        assert_eq!(transform.crop.height, 1080);
        assert_eq!(transform.crop.width, 608);
        assert_eq!(transform.crop.x, (1920 - 608) / 2);
        assert_eq!(transform.crop.y, 0);
        assert_eq!(transform.output_size(), PORTRAIT);
    }

    #[test]
    fn test_tall_source_crops_height() {
        let transform = normalize(FrameSize::new(1000, 3000), PORTRAIT);
        assert_eq!(transform.crop.width, 1000);
        assert_eq!(transform.crop.height, 1778);
        assert_eq!(transform.crop.y, (3000 - 1778) / 2);
    }

    #[test]
    fn test_matching_source_is_identity() {
        let transform = normalize(PORTRAIT, PORTRAIT);
        assert!(transform.is_identity());
        assert_eq!(transform.filter_chain(), "crop=1080:1920:0:0,scale=1080:1920,setsar=1");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for source in [
            FrameSize::new(1920, 1080),
            FrameSize::new(640, 480),
            FrameSize::new(333, 1000),
            FrameSize::new(1, 1),
        ] {
            let once = normalize(source, PORTRAIT).output_size();
            let twice = normalize(once, PORTRAIT).output_size();
            assert_eq!(once, twice);
            assert!(normalize(once, PORTRAIT).is_identity());
        }
    }

    #[test]
    fn test_apply_to_pixels_twice_keeps_dimensions() {
        let target = FrameSize::new(54, 96);
        let frame = Frame::new_filled(160, 90, [200, 10, 10]);

        let once = normalize(frame.size(), target).apply(&frame);
        let twice = normalize(once.size(), target).apply(&once);

        assert_eq!(once.size(), target);
        assert_eq!(twice.size(), target);
        let [r, g, b] = twice.get_pixel(27, 48);
        assert!(r.abs_diff(200) <= 1 && g.abs_diff(10) <= 1 && b.abs_diff(10) <= 1);
    }

    #[test]
    fn test_zoom_is_monotonic() {
        let zoom = ZoomCurve::for_still(0.04).unwrap();
        assert_eq!(zoom.scale_at(0.0), 1.0);
        assert!((zoom.scale_at(5.0) - 1.2).abs() < 1e-9);
        assert!(zoom.scale_at(2.0) < zoom.scale_at(3.0));
        assert!(ZoomCurve::for_still(0.0).is_none());
    }

    #[test]
    fn test_zoompan_filter_targets_output() {
        let zoom = ZoomCurve { rate: 0.04 };
        let filter = zoom.zoompan_filter(PORTRAIT, 30.0);
        assert!(filter.starts_with("zoompan=z='1+0.04*in/30'"));
        assert!(filter.contains("s=1080x1920"));
    }
}
