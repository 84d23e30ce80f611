//! Media validation for scene sources.
//!
//! A probe never fails for an expected defect (missing file, corrupt
//! download, zero-length clip); it reports [`ProbeOutcome::Invalid`] and the
//! resolver substitutes a placeholder.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::video::types::MediaKind;

/// A source that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidMedia {
    pub path: PathBuf,
    pub kind: MediaKind,
    pub width: u32,
    pub height: u32,
    /// Native duration in seconds; `None` for stills
    pub duration: Option<f64>,
}

/// Why a source was rejected
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidReason {
    Missing,
    Undecodable(String),
    NoVideoStream,
    TooShort { duration: f64 },
    ZeroDimensions,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "file does not exist"),
            Self::Undecodable(reason) => write!(f, "not decodable ({})", reason),
            Self::NoVideoStream => write!(f, "no video stream"),
            Self::TooShort { duration } => write!(f, "duration {:.3}s is too short", duration),
            Self::ZeroDimensions => write!(f, "zero frame size"),
        }
    }
}

/// Result of probing one file
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Valid(ValidMedia),
    Invalid(InvalidReason),
}

impl ProbeOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

/// Validates candidate scene media
///
/// Implementations must be callable from several worker threads at once.
pub trait MediaProbe: Send + Sync {
    fn probe(&self, path: &Path) -> ProbeOutcome;
}

/// Probe backed by the `image` crate for stills and `ffprobe` for everything else
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    binary: String,
    min_duration: f64,
}

impl FfprobeProbe {
    pub fn new(min_duration: f64) -> Self {
        Self {
            binary: "ffprobe".to_string(),
            min_duration,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    fn probe_image(&self, path: &Path) -> ProbeOutcome {
        // Full decode, not just the header: truncated downloads must be rejected here
        match image::open(path) {
            Ok(image) => still_outcome(path, image.width(), image.height()),
            Err(e) => ProbeOutcome::Invalid(InvalidReason::Undecodable(e.to_string())),
        }
    }

    fn probe_container(&self, path: &Path) -> ProbeOutcome {
        let output = Command::new(&self.binary)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                warn!("Could not run {}: {}", self.binary, e);
                return ProbeOutcome::Invalid(InvalidReason::Undecodable(format!(
                    "{} unavailable: {}",
                    self.binary, e
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return ProbeOutcome::Invalid(InvalidReason::Undecodable(format!(
                "ffprobe exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        match serde_json::from_slice::<FfprobeOutput>(&output.stdout) {
            Ok(report) => classify_report(path, &report, self.min_duration),
            Err(e) => ProbeOutcome::Invalid(InvalidReason::Undecodable(e.to_string())),
        }
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl MediaProbe for FfprobeProbe {
    fn probe(&self, path: &Path) -> ProbeOutcome {
        if !path.is_file() {
            return ProbeOutcome::Invalid(InvalidReason::Missing);
        }

        let outcome = match MediaKind::from_extension(path) {
            Some(MediaKind::Still) => self.probe_image(path),
            _ => self.probe_container(path),
        };

        debug!("Probed {:?}: {:?}", path, outcome);
        outcome
    }
}

fn still_outcome(path: &Path, width: u32, height: u32) -> ProbeOutcome {
    if width == 0 || height == 0 {
        return ProbeOutcome::Invalid(InvalidReason::ZeroDimensions);
    }
    ProbeOutcome::Valid(ValidMedia {
        path: path.to_path_buf(),
        kind: MediaKind::Still,
        width,
        height,
        duration: None,
    })
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    #[serde(default)]
    format_name: String,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

const IMAGE_CODECS: [&str; 6] = ["png", "mjpeg", "bmp", "webp", "tiff", "gif"];

/// Decide validity from an ffprobe report
fn classify_report(path: &Path, report: &FfprobeOutput, min_duration: f64) -> ProbeOutcome {
    let Some(stream) = report.streams.iter().find(|s| s.codec_type == "video") else {
        return ProbeOutcome::Invalid(InvalidReason::NoVideoStream);
    };

    let width = stream.width.unwrap_or(0);
    let height = stream.height.unwrap_or(0);

    // Extension-less downloads of stills show up as image demuxers
    let codec = stream.codec_name.as_deref().unwrap_or_default();
    let image_demuxer =
        report.format.format_name.contains("image2") || report.format.format_name.ends_with("_pipe");
    if image_demuxer && IMAGE_CODECS.contains(&codec) {
        return still_outcome(path, width, height);
    }

    // The container may run longer than the picture (trailing audio)
    let duration = parse_secs(stream.duration.as_deref())
        .or_else(|| parse_secs(report.format.duration.as_deref()))
        .unwrap_or(0.0);

    if width == 0 || height == 0 {
        return ProbeOutcome::Invalid(InvalidReason::ZeroDimensions);
    }

    if !(duration >= min_duration) {
        return ProbeOutcome::Invalid(InvalidReason::TooShort { duration });
    }

    ProbeOutcome::Valid(ValidMedia {
        path: path.to_path_buf(),
        kind: MediaKind::Video,
        width,
        height,
        duration: Some(duration),
    })
}

fn parse_secs(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::types::Frame;
    use std::io::Write;
    use tempfile::tempdir;

    fn report(json: &str) -> FfprobeOutput {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_valid_video_report() {
        let outcome = classify_report(
            Path::new("clip.mp4"),
            &report(r#"{"format": {"format_name": "mov,mp4,m4a", "duration": "10.0"},
                        "streams": [{"codec_type": "audio"},
                                    {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080}]}"#),
            0.1,
        );
        match outcome {
            ProbeOutcome::Valid(media) => {
                assert_eq!(media.kind, MediaKind::Video);
                assert_eq!(media.duration, Some(10.0));
                assert_eq!((media.width, media.height), (1920, 1080));
            }
            other => panic!("expected valid media, got {:?}", other),
        }
    }

    #[test]
    fn test_video_stream_duration_wins_over_container() {
        let outcome = classify_report(
            Path::new("clip.mp4"),
            &report(r#"{"format": {"format_name": "mov,mp4,m4a", "duration": "6.000000"},
                        "streams": [{"codec_type": "video", "codec_name": "h264", "width": 1280, "height": 720,
                                     "duration": "4.000000"},
                                    {"codec_type": "audio", "duration": "6.000000"}]}"#),
            0.1,
        );
        match outcome {
            ProbeOutcome::Valid(media) => assert_eq!(media.duration, Some(4.0)),
            other => panic!("expected valid media, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_stream_duration_uses_container() {
        let outcome = classify_report(
            Path::new("clip.webm"),
            &report(r#"{"format": {"format_name": "matroska,webm", "duration": "7.5"},
                        "streams": [{"codec_type": "video", "codec_name": "vp9", "width": 640, "height": 360,
                                     "duration": "N/A"}]}"#),
            0.1,
        );
        assert!(matches!(outcome, ProbeOutcome::Valid(ValidMedia { duration: Some(d), .. }) if d == 7.5));
    }

    #[test]
    fn test_short_clip_rejected() {
        let outcome = classify_report(
            Path::new("clip.mp4"),
            &report(r#"{"format": {"format_name": "mov", "duration": "0.04"},
                        "streams": [{"codec_type": "video", "codec_name": "h264", "width": 10, "height": 10}]}"#),
            0.1,
        );
        assert_eq!(outcome, ProbeOutcome::Invalid(InvalidReason::TooShort { duration: 0.04 }));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let outcome = classify_report(
            Path::new("clip.mp4"),
            &report(r#"{"format": {"format_name": "mov", "duration": "4"},
                        "streams": [{"codec_type": "video", "codec_name": "h264", "width": 0, "height": 720}]}"#),
            0.1,
        );
        assert_eq!(outcome, ProbeOutcome::Invalid(InvalidReason::ZeroDimensions));
    }

    #[test]
    fn test_audio_only_rejected() {
        let outcome = classify_report(
            Path::new("song.mp4"),
            &report(r#"{"format": {"format_name": "mp3", "duration": "4"}, "streams": [{"codec_type": "audio"}]}"#),
            0.1,
        );
        assert_eq!(outcome, ProbeOutcome::Invalid(InvalidReason::NoVideoStream));
    }

    #[test]
    fn test_image_demuxer_classified_as_still() {
        let outcome = classify_report(
            Path::new("download"),
            &report(r#"{"format": {"format_name": "png_pipe"},
                        "streams": [{"codec_type": "video", "codec_name": "png", "width": 800, "height": 600}]}"#),
            0.1,
        );
        assert!(matches!(outcome, ProbeOutcome::Valid(ValidMedia { kind: MediaKind::Still, .. })));
    }

    #[test]
    fn test_missing_file() {
        let probe = FfprobeProbe::default();
        assert_eq!(
            probe.probe(Path::new("/no/such/clip.mp4")),
            ProbeOutcome::Invalid(InvalidReason::Missing)
        );
    }

    #[test]
    fn test_still_image_probe() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("still.png");
        Frame::new_filled(40, 30, [1, 2, 3]).save_png(&path).unwrap();

        match FfprobeProbe::default().probe(&path) {
            ProbeOutcome::Valid(media) => {
                assert_eq!(media.kind, MediaKind::Still);
                assert_eq!((media.width, media.height), (40, 30));
                assert_eq!(media.duration, None);
            }
            other => panic!("expected valid still, got {:?}", other),
        }
    }

    #[test]
    fn test_corrupt_image_is_invalid_not_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::File::create(&path).unwrap().write_all(b"\xff\xd8 truncated").unwrap();

        let outcome = FfprobeProbe::default().probe(&path);
        assert!(matches!(outcome, ProbeOutcome::Invalid(InvalidReason::Undecodable(_))));
    }
}
