//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::tagging::policy::{RankingPolicy, DEFAULT_THRESHOLD, DEFAULT_TOP_K};

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory where ONNX models and tokenizers are stored
    pub model_dir: PathBuf,

    /// Directory for cached tag pool embeddings
    pub cache_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("~/.autotag/models"),
            cache_dir: PathBuf::from("~/.autotag/cache"),
        }
    }
}

/// Batch processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Images classified concurrently. 1 processes strictly in sequence.
    pub parallel_workers: usize,

    /// Extensions rejected before any decode is attempted (raw sensor formats)
    pub unsupported_extensions: Vec<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel_workers: 1,
            unsupported_extensions: [
                "raf", "cr2", "cr3", "nef", "arw", "dng", "orf", "rw2", "pef", "srw",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum file size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,

    /// Decode timeout in milliseconds
    pub decode_timeout_ms: u64,

    /// Whole-item deadline in milliseconds (0 disables it)
    pub item_timeout_ms: u64,

    /// Caption request timeout in milliseconds
    pub caption_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 200,
            max_image_dimension: 20000,
            decode_timeout_ms: 10000,
            item_timeout_ms: 0,
            caption_timeout_ms: 120000,
        }
    }
}

/// Image/text encoder settings for direct (image-to-tag) matching.
///
/// Defaults describe a CLIP ViT-B/32 export with projection heads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model subdirectory under `general.model_dir`
    pub model: String,

    /// Vision model filename
    pub vision_model: String,

    /// Text model filename
    pub text_model: String,

    /// Tokenizer filename
    pub tokenizer: String,

    /// Square input size of the vision model
    pub image_size: u32,

    /// Token sequence length for the text model
    pub max_length: usize,

    /// Output tensor holding the projected image embedding
    pub vision_output: String,

    /// Output tensor holding the projected text embedding
    pub text_output: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "clip-vit-base-patch32".to_string(),
            vision_model: "vision_model.onnx".to_string(),
            text_model: "text_model.onnx".to_string(),
            tokenizer: "tokenizer.json".to_string(),
            image_size: 224,
            max_length: 77,
            vision_output: "image_embeds".to_string(),
            text_output: "text_embeds".to_string(),
        }
    }
}

/// Settings for caption-mediated matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    /// Sentence encoder subdirectory under `general.model_dir`
    pub sentence_model: String,

    /// Sentence encoder filename
    pub text_model: String,

    /// Tokenizer filename
    pub tokenizer: String,

    /// Token sequence length for the sentence encoder
    pub max_length: usize,

    /// Output tensor to mean-pool (sentence encoders expose token states)
    pub text_output: String,

    /// Ollama endpoint serving the vision-language model
    pub endpoint: String,

    /// Vision-language model used to write captions
    pub model: String,

    /// Instruction sent along with the image
    pub prompt: String,

    /// Maximum tokens generated per caption
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Retry attempts for transient caption failures
    pub retry_attempts: u32,

    /// Base delay between retries in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            sentence_model: "all-MiniLM-L6-v2".to_string(),
            text_model: "model.onnx".to_string(),
            tokenizer: "tokenizer.json".to_string(),
            max_length: 128,
            text_output: "last_hidden_state".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            model: "llava".to_string(),
            prompt: "Describe this photograph in one detailed sentence. \
                     Mention the subject, the setting, and the lighting."
                .to_string(),
            max_tokens: 100,
            temperature: 0.2,
            retry_attempts: 2,
            retry_delay_ms: 1000,
        }
    }
}

/// How tags are rendered in the output document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TagFormat {
    /// Labels for arg-max, scored pairs for everything else
    #[default]
    Auto,
    /// `[label, score]` pairs
    Scored,
    /// Bare label strings
    Labels,
}

/// Tagging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggingConfig {
    /// Ranking policy: "top-k", "arg-max" or "caption"
    pub policy: RankingPolicy,

    /// Candidates kept before threshold filtering (top-k policy)
    pub top_k: usize,

    /// Scores must be strictly above this to be kept (top-k policy)
    pub threshold: f32,

    /// Pool preset name ("photography", "scenes", "styles") or a TOML pool file
    pub pool: String,

    /// Prompt template applied to labels without an explicit prompt
    pub prompt_template: String,

    /// Output presentation of tags
    pub tag_format: TagFormat,

    /// Prompts per text encoder call when building the pool
    pub encode_batch_size: usize,

    /// Persist built pools under `general.cache_dir`
    pub cache_pool: bool,
}

impl Default for TaggingConfig {
    fn default() -> Self {
        Self {
            policy: RankingPolicy::default(),
            top_k: DEFAULT_TOP_K,
            threshold: DEFAULT_THRESHOLD,
            pool: "scenes".to_string(),
            prompt_template: "{label}".to_string(),
            tag_format: TagFormat::Auto,
            encode_batch_size: 64,
            cache_pool: true,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
