//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    ///
    /// Any finite threshold is accepted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.parallel_workers == 0 {
            return Err(ConfigError::ValidationError(
                "processing.parallel_workers must be > 0".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.caption_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.caption_timeout_ms must be > 0".into(),
            ));
        }
        if self.embedding.image_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.image_size must be > 0".into(),
            ));
        }
        if self.embedding.max_length == 0 || self.caption.max_length == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.max_length and caption.max_length must be > 0".into(),
            ));
        }
        if self.tagging.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "tagging.top_k must be > 0".into(),
            ));
        }
        if !self.tagging.threshold.is_finite() {
            return Err(ConfigError::ValidationError(
                "tagging.threshold must be a finite number".into(),
            ));
        }
        if self.tagging.encode_batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "tagging.encode_batch_size must be > 0".into(),
            ));
        }
        if !self.tagging.prompt_template.contains("{label}") {
            return Err(ConfigError::ValidationError(
                "tagging.prompt_template must contain {label}".into(),
            ));
        }
        if self.tagging.pool.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "tagging.pool must not be empty".into(),
            ));
        }
        Ok(())
    }
}
