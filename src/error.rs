use thiserror::Error;

/// Main error type for the dream-reel library
#[derive(Error, Debug)]
pub enum ReelError {
    #[error("Frame generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Video assembly error: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Errors raised while rendering the frame sequence
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Inference failed on frame {frame}: {reason}")]
    InferenceFailed { frame: usize, reason: String },

    #[error("Inference service not found: {name}")]
    ServiceNotFound { name: String },

    #[error("Inference service returned an unusable response: {reason}")]
    InvalidResponse { reason: String },
}

/// Errors raised while turning frames into a video or image files
#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("Frame sequence is empty")]
    EmptySequence,

    #[error("Unsupported method: {method}")]
    UnsupportedMethod { method: String },

    #[error("Frame {index} is {actual_width}x{actual_height}, expected {width}x{height}")]
    FrameSizeMismatch {
        index: usize,
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("Failed to start encoder '{program}': {reason}")]
    EncoderSpawn { program: String, reason: String },

    #[error("Encoder exited with {status}: {stderr}")]
    EncoderFailed { status: String, stderr: String },

    #[error("Encoder did not finish within {seconds}s")]
    EncoderTimeout { seconds: u64 },

    #[error("Failed to write {path}: {reason}")]
    WriteFailed { path: String, reason: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}: {reason}")]
    ParseFailed { path: String, reason: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Unknown preset '{name}', available: {available}")]
    UnknownPreset { name: String, available: String },
}

/// Convenience type alias for Results using ReelError
pub type Result<T> = std::result::Result<T, ReelError>;

impl ReelError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Whether a failure left the scratch directory in place for inspection
    pub fn preserves_scratch(&self) -> bool {
        matches!(
            self,
            Self::Assembly(AssemblyError::EncoderSpawn { .. })
                | Self::Assembly(AssemblyError::EncoderFailed { .. })
                | Self::Assembly(AssemblyError::EncoderTimeout { .. })
        )
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Assembly(AssemblyError::EmptySequence) => {
                "No frames were generated, so there is nothing to encode.".to_string()
            }
            Self::Assembly(AssemblyError::UnsupportedMethod { method }) => {
                format!(
                    "Video method '{}' is not supported. Use one of: stream, container, ffmpeg.",
                    method
                )
            }
            Self::Assembly(AssemblyError::EncoderSpawn { program, .. }) => {
                format!(
                    "Could not run '{}'. Please check that FFmpeg is installed and on PATH.",
                    program
                )
            }
            Self::Generation(GenerationError::ServiceNotFound { name }) => {
                format!(
                    "Inference service '{}' not found. Available services: placeholder, http",
                    name
                )
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
    fn test_encoder_failures_preserve_scratch() {
        let failed: ReelError = AssemblyError::EncoderFailed {
            status: "exit status: 1".to_string(),
            stderr: "boom".to_string(),
        }
        .into();
        assert!(failed.preserves_scratch());

        let empty: ReelError = AssemblyError::EmptySequence.into();
        assert!(!empty.preserves_scratch());
    }

    #[test]
    fn test_user_message_names_method() {
        let err: ReelError = AssemblyError::UnsupportedMethod {
            method: "bogus".to_string(),
        }
        .into();
        assert!(err.user_message().contains("bogus"));
        assert!(err.to_string().contains("Unsupported method"));
    }
}
