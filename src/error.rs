use thiserror::Error;

/// Main error type for the Shorts-Compositor library
#[derive(Error, Debug)]
pub enum CompositorError {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Blueprint error: {0}")]
    Blueprint(#[from] BlueprintError),

    #[error("Render failure: {0}")]
    Render(#[from] RenderError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Voice and music decoding errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Audio file not found: {path}")]
    NotFound { path: String },

    #[error("Failed to decode audio file: {path} ({reason})")]
    Undecodable { path: String, reason: String },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Audio file has no usable duration: {path}")]
    EmptyDuration { path: String },
}

/// Errors raised while preparing scene media
///
/// Probe failures are not errors (see [`crate::video::ProbeOutcome`]); these cover
/// the work around a valid probe, such as normalizing a still image to disk.
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Failed to decode image {path}: {reason}")]
    ImageDecode { path: String, reason: String },

    #[error("Failed to write normalized frame {path}: {reason}")]
    ImageWrite { path: String, reason: String },

    #[error("Failed to create working directory: {reason}")]
    Workspace { reason: String },

    #[error("Probe worker pool failed: {reason}")]
    WorkerPool { reason: String },
}

/// Blueprint ingestion errors
#[derive(Error, Debug)]
pub enum BlueprintError {
    #[error("Failed to parse blueprint: {reason}")]
    Parse { reason: String },

    #[error("Blueprint has no scenes")]
    NoScenes,

    #[error("Duplicate scene id: {id}")]
    DuplicateSceneId { id: u32 },

    #[error("Invalid blueprint field {field}: {details}")]
    InvalidField { field: String, details: String },

    #[error("Failed to parse asset map: {reason}")]
    AssetMapParse { reason: String },
}

/// Render-stage errors
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("FFmpeg not found. Please install FFmpeg.")]
    FfmpegMissing,

    #[error("Output path is not writable: {path} ({reason})")]
    OutputUnwritable { path: String, reason: String },

    #[error("Encoder failed: {reason}")]
    EncodingFailed { reason: String },

    #[error("Render task aborted: {reason}")]
    Aborted { reason: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path} ({reason})")]
    ParseFailed { path: String, reason: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using CompositorError
pub type Result<T> = std::result::Result<T, CompositorError>;

impl CompositorError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// True when the error comes from caller-supplied input rather than the encoder
    pub fn is_fatal_input(&self) -> bool {
        matches!(self, Self::Audio(_) | Self::Blueprint(_) | Self::Config(_))
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Audio(AudioError::NotFound { path }) => {
                format!("Voice track '{}' is missing; nothing can be synchronized without it.", path)
            }
            Self::Audio(AudioError::Undecodable { path, .. }) => {
                format!("Voice track '{}' could not be decoded. Please check the file is a supported format.", path)
            }
            Self::Blueprint(BlueprintError::NoScenes) => {
                "The blueprint does not contain any scenes.".to_string()
            }
            Self::Render(RenderError::FfmpegMissing) => {
                "FFmpeg was not found on PATH. Install FFmpeg to render videos.".to_string()
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_voice_message_names_the_file() {
        let err: CompositorError = AudioError::NotFound { path: "voice.mp3".into() }.into();
        assert!(err.user_message().contains("voice.mp3"));
        assert!(err.is_fatal_input());
    }

    #[test]
    fn test_render_errors_are_not_input_errors() {
        let err: CompositorError = RenderError::EncodingFailed { reason: "boom".into() }.into();
        assert!(!err.is_fatal_input());
        assert_eq!(err.to_string(), "Render failure: Encoder failed: boom");
    }
}
