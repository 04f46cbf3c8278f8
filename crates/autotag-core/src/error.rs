//! Error types for the autotag classification engine.
//!
//! Errors split along the fatal/recoverable line: `ConfigError` and
//! `PipelineError` may abort a run, while `SkipReason` is the per-image
//! outcome the batch driver turns into an empty tag list.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for autotag operations.
#[derive(Error, Debug)]
pub enum AutotagError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Model, encoding, or pipeline errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// The requested tag pool is neither a preset nor a readable file
    #[error("Unknown tag pool '{0}' (expected a preset name or a path to a TOML pool file)")]
    UnknownPool(String),

    /// Query embeddings and pool embeddings come from incompatible models
    #[error("Embedding dimension mismatch: pool has {pool} dims, query has {query} dims")]
    DimensionMismatch { pool: usize, query: usize },
}

/// Pipeline errors: model loading, encoding, image loading, captioning.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Model loading or inference failed
    #[error("Model error: {message}")]
    Model { message: String },

    /// The text encoder could not embed a prompt
    #[error("Encoding failed for prompt {prompt:?}: {message}")]
    Encoding { prompt: String, message: String },

    /// Image decoding failed
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Image embedding failed
    #[error("Embedding failed for {path}: {message}")]
    Embedding { path: PathBuf, message: String },

    /// Caption generation failed
    #[error("Caption error: {message}")]
    Caption {
        message: String,
        status_code: Option<u16>,
    },

    /// Operation timed out
    #[error("Timeout in {stage} stage for {path} after {timeout_ms}ms")]
    Timeout {
        path: PathBuf,
        stage: String,
        timeout_ms: u64,
    },

    /// File exceeds size limit
    #[error("File too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// Image dimensions exceed limit
    #[error("Image too large: {path} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Unsupported image format
    #[error("Unsupported format for {path}: {format}")]
    UnsupportedFormat { path: PathBuf, format: String },

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

/// Why a single image produced no tags.
///
/// Every variant is recoverable: the batch driver records an empty tag list
/// for the image and moves on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Extension is on the unsupported (raw sensor) list
    UnsupportedFormat(String),
    /// File missing, unreadable, or too large
    Unreadable(String),
    /// The container could not be decoded
    Decode(String),
    /// The image encoder failed on this image
    Embedding(String),
    /// The caption provider failed on this image
    Caption(String),
    /// The per-item or per-stage deadline expired
    Timeout(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnsupportedFormat(ext) => write!(f, "unsupported format: {ext}"),
            SkipReason::Unreadable(msg) => write!(f, "unreadable: {msg}"),
            SkipReason::Decode(msg) => write!(f, "decode failed: {msg}"),
            SkipReason::Embedding(msg) => write!(f, "embedding failed: {msg}"),
            SkipReason::Caption(msg) => write!(f, "caption failed: {msg}"),
            SkipReason::Timeout(msg) => write!(f, "timed out: {msg}"),
        }
    }
}

impl PipelineError {
    /// Classify this error as a per-item skip.
    ///
    /// Model and prompt-encoding failures are never per-item: they mean the
    /// encoder itself is unusable, and come back as `Err(self)`.
    pub fn into_skip(self) -> std::result::Result<SkipReason, PipelineError> {
        let message = self.to_string();
        match self {
            PipelineError::Decode { .. } => Ok(SkipReason::Decode(message)),
            PipelineError::UnsupportedFormat { format, .. } => {
                Ok(SkipReason::UnsupportedFormat(format))
            }
            PipelineError::FileNotFound(_)
            | PipelineError::FileTooLarge { .. }
            | PipelineError::ImageTooLarge { .. } => Ok(SkipReason::Unreadable(message)),
            PipelineError::Embedding { .. } => Ok(SkipReason::Embedding(message)),
            PipelineError::Caption { .. } => Ok(SkipReason::Caption(message)),
            PipelineError::Timeout { .. } => Ok(SkipReason::Timeout(message)),
            fatal @ (PipelineError::Model { .. } | PipelineError::Encoding { .. }) => Err(fatal),
        }
    }
}

/// Convenience type alias for autotag results.
pub type Result<T> = std::result::Result<T, AutotagError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_is_skip() {
        let err = PipelineError::Decode {
            path: PathBuf::from("broken.jpg"),
            message: "bad header".to_string(),
        };
        assert!(matches!(err.into_skip(), Ok(SkipReason::Decode(_))));
    }

    #[test]
    fn test_caption_error_is_skip() {
        let err = PipelineError::Caption {
            message: "HTTP 500".to_string(),
            status_code: Some(500),
        };
        assert!(matches!(err.into_skip(), Ok(SkipReason::Caption(_))));
    }

    #[test]
    fn test_model_error_is_fatal() {
        let err = PipelineError::Model {
            message: "session lock poisoned".to_string(),
        };
        assert!(matches!(err.into_skip(), Err(PipelineError::Model { .. })));
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = ConfigError::DimensionMismatch {
            pool: 512,
            query: 384,
        };
        let text = err.to_string();
        assert!(text.contains("512"));
        assert!(text.contains("384"));
    }
}
