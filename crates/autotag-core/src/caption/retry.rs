//! Retry utilities for transient caption failures.
//!
//! Provides classification of retryable errors and exponential backoff.

use std::time::Duration;

use crate::error::PipelineError;

/// Upper bound on a single backoff delay.
const MAX_BACKOFF_MS: u64 = 30_000;

/// Determine whether a caption error is worth retrying.
///
/// Retryable errors: timeouts, rate limits (429), server errors (5xx).
/// Non-retryable: bad requests, missing models, empty captions.
pub fn is_retryable(error: &PipelineError) -> bool {
    match error {
        PipelineError::Timeout { .. } => true,
        PipelineError::Caption {
            status_code,
            message,
        } => {
            if let Some(code) = status_code {
                return *code == 429 || (500..=599).contains(code);
            }
            // Connection refused, DNS failure and similar transport errors
            message.contains("timed out") || message.contains("connect")
        }
        _ => false,
    }
}

/// Exponential backoff: `base_delay * 2^attempt`, capped at 30 seconds.
pub fn backoff_duration(attempt: u32, base_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay.min(MAX_BACKOFF_MS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn caption_err(message: &str, status_code: Option<u16>) -> PipelineError {
        PipelineError::Caption {
            message: message.to_string(),
            status_code,
        }
    }

    #[test]
    fn test_timeout_is_retryable() {
        let err = PipelineError::Timeout {
            path: PathBuf::from("test.jpg"),
            stage: "caption".to_string(),
            timeout_ms: 60000,
        };
        assert!(is_retryable(&err));
    }

    #[test]
    fn test_status_classification() {
        assert!(is_retryable(&caption_err("rate limited", Some(429))));
        assert!(is_retryable(&caption_err("unavailable", Some(503))));
        assert!(!is_retryable(&caption_err("model not found", Some(404))));
        assert!(!is_retryable(&caption_err("bad request", Some(400))));
    }

    #[test]
    fn test_status_number_in_message_is_not_enough() {
        assert!(!is_retryable(&caption_err("generated 500 tokens", None)));
    }

    #[test]
    fn test_connection_error_retryable_without_status() {
        assert!(is_retryable(&caption_err("error trying to connect", None)));
    }

    #[test]
    fn test_decode_error_not_retryable() {
        let err = PipelineError::Decode {
            path: PathBuf::from("test.jpg"),
            message: "invalid header".to_string(),
        };
        assert!(!is_retryable(&err));
    }

    #[test]
    fn test_backoff_exponential_and_capped() {
        assert_eq!(backoff_duration(0, 1000), Duration::from_millis(1000));
        assert_eq!(backoff_duration(1, 1000), Duration::from_millis(2000));
        assert_eq!(backoff_duration(3, 1000), Duration::from_millis(8000));
        assert_eq!(backoff_duration(10, 1000), Duration::from_millis(30_000));
        assert_eq!(backoff_duration(u32::MAX, u64::MAX), Duration::from_millis(30_000));
    }
}
