//! Caption generation for caption-mediated matching.
//!
//! A vision-language model writes one sentence about the image; that sentence
//! is then embedded with the sentence encoder and scored against the pool.

pub mod ollama;
pub mod retry;

use async_trait::async_trait;
use base64::Engine;

use crate::error::PipelineError;
use crate::pipeline::LoadedImage;

pub use ollama::OllamaCaptioner;

/// Base64-encoded image ready to send to a caption provider.
#[derive(Debug, Clone)]
pub struct CaptionRequest {
    /// Base64-encoded file bytes
    pub image_data: String,
    /// MIME type (e.g., "image/jpeg", "image/png")
    pub media_type: String,
    /// Instruction sent alongside the image
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CaptionRequest {
    /// Build a request from a loaded image.
    ///
    /// The original file bytes are sent, not the decoded pixels.
    pub fn from_image(image: &LoadedImage, prompt: &str, max_tokens: u32, temperature: f32) -> Self {
        Self {
            image_data: base64::engine::general_purpose::STANDARD.encode(&image.bytes),
            media_type: media_type(&image.format).to_string(),
            prompt: prompt.to_string(),
            max_tokens,
            temperature,
        }
    }
}

fn media_type(format: &str) -> &'static str {
    match format {
        "jpeg" | "jpg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        other => {
            tracing::warn!("Unknown image format '{other}', defaulting to image/jpeg");
            "image/jpeg"
        }
    }
}

/// Writes a natural-language caption for an image.
#[async_trait]
pub trait CaptionGenerator: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Generate a caption. The returned text is trimmed and non-empty.
    async fn caption(&self, request: &CaptionRequest) -> Result<String, PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_known_formats() {
        assert_eq!(media_type("jpeg"), "image/jpeg");
        assert_eq!(media_type("png"), "image/png");
        assert_eq!(media_type("webp"), "image/webp");
    }

    #[test]
    fn test_media_type_unknown_defaults_to_jpeg() {
        assert_eq!(media_type("unknown"), "image/jpeg");
    }

    #[test]
    fn test_request_encodes_file_bytes() {
        let image = LoadedImage {
            image: image::DynamicImage::new_rgb8(1, 1),
            bytes: vec![0xde, 0xad, 0xbe, 0xef],
            format: "png".to_string(),
        };
        let request = CaptionRequest::from_image(&image, "describe", 50, 0.1);
        assert_eq!(request.image_data, "3q2+7w==");
        assert_eq!(request.media_type, "image/png");
        assert_eq!(request.max_tokens, 50);
    }
}
