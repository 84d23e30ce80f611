use std::fs::File;
use std::path::Path;

use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::audio::types::{AudioFormat, AudioInfo};
use crate::error::{AudioError, Result};

/// Audio file prober supporting multiple formats
///
/// Only the duration and stream layout are needed downstream, so samples are
/// never materialized.
pub struct AudioLoader;

impl AudioLoader {
    /// Measure an audio file
    pub fn probe<P: AsRef<Path>>(path: P) -> Result<AudioInfo> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(AudioError::NotFound { path: path.display().to_string() }.into());
        }

        let extension = Self::detect_format(path).unwrap_or_default();

        let info = match extension.as_str() {
            "wav" => Self::probe_wav(path)?,
            "mp3" | "flac" | "ogg" | "m4a" | "aac" => Self::probe_with_symphonia(path, &extension)?,
            _ => {
                return Err(AudioError::UnsupportedFormat { format: extension }.into());
            }
        };

        if !(info.duration.is_finite() && info.duration > 0.0) {
            return Err(AudioError::EmptyDuration { path: path.display().to_string() }.into());
        }

        debug!(
            "Probed {:?}: {:.3}s, {} Hz, {} channels",
            path, info.duration, info.sample_rate, info.channels
        );
        Ok(info)
    }

    /// Read WAV headers using the hound crate (most reliable for WAV)
    fn probe_wav(path: &Path) -> Result<AudioInfo> {
        let reader = hound::WavReader::open(path).map_err(|e| AudioError::Undecodable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let spec = reader.spec();
        let duration = reader.duration() as f64 / spec.sample_rate.max(1) as f64;

        Ok(AudioInfo {
            duration,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            file_path: path.to_path_buf(),
            format: AudioFormat {
                extension: "wav".to_string(),
                bit_depth: Some(spec.bits_per_sample),
                compression: None,
            },
        })
    }

    /// Probe compressed formats using Symphonia
    fn probe_with_symphonia(path: &Path, extension: &str) -> Result<AudioInfo> {
        let undecodable = |reason: String| AudioError::Undecodable {
            path: path.display().to_string(),
            reason,
        };

        let file = File::open(path).map_err(|e| undecodable(e.to_string()))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        hint.with_extension(extension);

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| undecodable(e.to_string()))?;

        let mut format = probed.format;

        // Find the first audio track with a known (decodable) codec
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| undecodable("no decodable audio track".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| undecodable("no sample rate found".to_string()))?;
        let channels = codec_params.channels.map(|c| c.count() as u16).unwrap_or(1);

        // Containers that know their length report it up front; otherwise walk the packets
        let duration = match (codec_params.n_frames, codec_params.time_base) {
            (Some(frames), Some(time_base)) => {
                let time = time_base.calc_time(frames);
                time.seconds as f64 + time.frac
            }
            (Some(frames), None) => frames as f64 / sample_rate as f64,
            (None, _) => {
                let mut total: u64 = 0;
                loop {
                    match format.next_packet() {
                        Ok(packet) if packet.track_id() == track_id => total += packet.dur,
                        Ok(_) => continue,
                        Err(SymphoniaError::ResetRequired) => continue,
                        Err(SymphoniaError::IoError(_)) => break,
                        Err(e) => return Err(undecodable(e.to_string()).into()),
                    }
                }
                match codec_params.time_base {
                    Some(time_base) => {
                        let time = time_base.calc_time(total);
                        time.seconds as f64 + time.frac
                    }
                    None => total as f64 / sample_rate as f64,
                }
            }
        };

        Ok(AudioInfo {
            duration,
            sample_rate,
            channels,
            file_path: path.to_path_buf(),
            format: AudioFormat {
                extension: extension.to_string(),
                bit_depth: codec_params.bits_per_sample.map(|b| b as u16),
                compression: Some(format!("{:?}", codec_params.codec)),
            },
        })
    }

    /// Detect audio format from file extension
    pub fn detect_format<P: AsRef<Path>>(path: P) -> Option<String> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }

    /// Check if a file format is supported
    pub fn is_format_supported(extension: &str) -> bool {
        matches!(
            extension.to_lowercase().as_str(),
            "wav" | "mp3" | "flac" | "ogg" | "m4a" | "aac"
        )
    }
}

/// Write a silent 16-bit mono WAV of the given length (test fixture)
#[cfg(test)]
pub(crate) fn write_silent_wav(path: &Path, seconds: f64) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for _ in 0..(seconds * 8000.0).round() as usize {
        writer.write_sample(0i16).unwrap();
    }
    writer.finalize().unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompositorError;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_format_detection() {
        assert_eq!(AudioLoader::detect_format("voice.wav"), Some("wav".to_string()));
        assert_eq!(AudioLoader::detect_format("voice.MP3"), Some("mp3".to_string()));
        assert_eq!(AudioLoader::detect_format("voice"), None);
    }

    #[test]
    fn test_format_support() {
        assert!(AudioLoader::is_format_supported("wav"));
        assert!(AudioLoader::is_format_supported("FLAC"));
        assert!(!AudioLoader::is_format_supported("xyz"));
    }

    #[test]
    fn test_wav_duration() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("voice.wav");
        write_silent_wav(&path, 2.5);

        let info = AudioLoader::probe(&path).unwrap();
        assert!((info.duration - 2.5).abs() < 1e-6);
        assert_eq!(info.sample_rate, 8000);
        assert_eq!(info.frame_count(), 20_000);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let result = AudioLoader::probe("/no/such/voice.mp3");
        assert!(matches!(result, Err(CompositorError::Audio(AudioError::NotFound { .. }))));
    }

    #[test]
    fn test_garbage_wav_is_undecodable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        File::create(&path).unwrap().write_all(b"not a riff file").unwrap();

        let result = AudioLoader::probe(&path);
        assert!(matches!(result, Err(CompositorError::Audio(AudioError::Undecodable { .. }))));
    }

    #[test]
    fn test_empty_wav_has_no_duration() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        write_silent_wav(&path, 0.0);

        let result = AudioLoader::probe(&path);
        assert!(matches!(result, Err(CompositorError::Audio(AudioError::EmptyDuration { .. }))));
    }

    #[test]
    fn test_unsupported_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("voice.xyz");
        File::create(&path).unwrap().write_all(b"dummy content").unwrap();

        match AudioLoader::probe(&path) {
            Err(CompositorError::Audio(AudioError::UnsupportedFormat { format })) => {
                assert_eq!(format, "xyz")
            }
            other => panic!("Expected UnsupportedFormat error, got {:?}", other),
        }
    }
}
