//! Ollama caption provider for local vision-language models.
//!
//! Talks to a local Ollama instance via `/api/generate`. No authentication.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::CaptionConfig;
use crate::error::PipelineError;

use super::retry::{backoff_duration, is_retryable};
use super::{CaptionGenerator, CaptionRequest};

/// Ollama-backed caption generator with retry on transient failures.
pub struct OllamaCaptioner {
    endpoint: String,
    model: String,
    client: reqwest::Client,
    request_timeout: Duration,
    retry_attempts: u32,
    retry_delay_ms: u64,
}

impl OllamaCaptioner {
    pub fn new(endpoint: &str, model: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
            request_timeout: Duration::from_secs(120),
            retry_attempts: 0,
            retry_delay_ms: 1000,
        }
    }

    pub fn from_config(config: &CaptionConfig, request_timeout_ms: u64) -> Self {
        Self {
            request_timeout: Duration::from_millis(request_timeout_ms),
            retry_attempts: config.retry_attempts,
            retry_delay_ms: config.retry_delay_ms,
            ..Self::new(&config.endpoint, &config.model)
        }
    }

    async fn generate_once(&self, request: &CaptionRequest) -> Result<String, PipelineError> {
        let url = format!("{}/api/generate", self.endpoint);

        let body = OllamaRequest {
            model: &self.model,
            prompt: &request.prompt,
            images: vec![&request.image_data],
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| PipelineError::Caption {
                message: format!("Ollama request failed: {e}"),
                status_code: None,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Caption {
                message: format!("Ollama HTTP {status}: {text}"),
                status_code: Some(status.as_u16()),
            });
        }

        let parsed: OllamaResponse = resp.json().await.map_err(|e| PipelineError::Caption {
            message: format!("Failed to parse Ollama response: {e}"),
            status_code: None,
        })?;

        let text = parsed.response.trim().to_string();
        if text.is_empty() {
            return Err(PipelineError::Caption {
                message: "Ollama returned an empty caption".to_string(),
                status_code: None,
            });
        }
        Ok(text)
    }
}

/// Ollama /api/generate request body.
#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: Vec<&'a str>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama /api/generate response.
#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl CaptionGenerator for OllamaCaptioner {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn caption(&self, request: &CaptionRequest) -> Result<String, PipelineError> {
        let mut attempt = 0;
        loop {
            match self.generate_once(request).await {
                Ok(text) => return Ok(text),
                Err(e) if attempt < self.retry_attempts && is_retryable(&e) => {
                    let delay = backoff_duration(attempt, self.retry_delay_ms);
                    tracing::warn!(
                        "Caption attempt {} failed ({e}), retrying in {}ms",
                        attempt + 1,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let captioner = OllamaCaptioner::new("http://localhost:11434/", "llava");
        assert_eq!(captioner.endpoint, "http://localhost:11434");
    }

    #[test]
    fn test_from_config_carries_retry_settings() {
        let config = CaptionConfig {
            retry_attempts: 4,
            retry_delay_ms: 250,
            ..CaptionConfig::default()
        };
        let captioner = OllamaCaptioner::from_config(&config, 5000);
        assert_eq!(captioner.retry_attempts, 4);
        assert_eq!(captioner.retry_delay_ms, 250);
        assert_eq!(captioner.request_timeout, Duration::from_millis(5000));
        assert_eq!(captioner.model, "llava");
    }

    #[test]
    fn test_request_body_shape() {
        let body = OllamaRequest {
            model: "llava",
            prompt: "describe",
            images: vec!["AAAA"],
            stream: false,
            options: OllamaOptions {
                temperature: 0.5,
                num_predict: 64,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["images"][0], "AAAA");
        assert_eq!(json["options"]["num_predict"], 64);
    }

    /// Answer one connection per canned `(status, body)` pair, in order.
    async fn canned_server(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                read_request(&mut stream).await;
                counter.fetch_add(1, Ordering::SeqCst);
                let response = format!(
                    "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.ok();
            }
        });
        (format!("http://{addr}"), hits)
    }

    /// Consume headers and body so the client sees a clean response.
    async fn read_request(stream: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        line.to_ascii_lowercase()
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    fn request() -> CaptionRequest {
        CaptionRequest {
            image_data: "AAAA".to_string(),
            media_type: "image/png".to_string(),
            prompt: "describe".to_string(),
            max_tokens: 10,
            temperature: 0.0,
        }
    }

    fn captioner(endpoint: &str, retry_attempts: u32) -> OllamaCaptioner {
        OllamaCaptioner {
            request_timeout: Duration::from_secs(5),
            retry_attempts,
            retry_delay_ms: 1,
            ..OllamaCaptioner::new(endpoint, "llava")
        }
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let (endpoint, hits) = canned_server(vec![
            (500, r#"{"error":"model crashed"}"#),
            (200, r#"{"response":"  a cat asleep on a sofa \n"}"#),
        ])
        .await;

        let caption = captioner(&endpoint, 2).caption(&request()).await.unwrap();
        assert_eq!(caption, "a cat asleep on a sofa");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_server_error_without_retries_fails() {
        let (endpoint, hits) = canned_server(vec![(503, "busy")]).await;

        let err = captioner(&endpoint, 0).caption(&request()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Caption { status_code: Some(503), .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let (endpoint, hits) = canned_server(vec![(404, r#"{"error":"model not found"}"#)]).await;

        let err = captioner(&endpoint, 3).caption(&request()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Caption { status_code: Some(404), .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_blank_caption_is_error() {
        let (endpoint, _) = canned_server(vec![(200, r#"{"response":"   "}"#)]).await;

        let err = captioner(&endpoint, 0).caption(&request()).await.unwrap_err();
        assert!(err.to_string().contains("empty caption"));
    }
}
