//! Image and text encoders.
//!
//! The classifier only depends on the [`ImageEncoder`] and [`TextEncoder`]
//! traits; the ONNX Runtime implementations here are the production backends.
//! Every encoder returns L2-normalized vectors of a fixed dimension.
//!
//! # Usage
//!
//! ```rust,ignore
//! use autotag_core::encoder::{OnnxImageEncoder, OnnxTextEncoder, TextModelSpec};
//!
//! let config = Config::load()?;
//! let vision = OnnxImageEncoder::load(&config.embedding, &config.embedding_model_dir())?;
//! let text = OnnxTextEncoder::load(TextModelSpec::clip(&config), &config.embedding_model_dir())?;
//! assert_eq!(vision.dim(), text.dim());
//! ```

pub(crate) mod preprocess;
pub mod text;
pub mod vision;

use std::path::Path;

use image::DynamicImage;

use crate::error::{PipelineError, PipelineResult};

pub use text::{OnnxTextEncoder, Pooling, TextModelSpec};
pub use vision::OnnxImageEncoder;

/// Produces unit-length embeddings for decoded images.
pub trait ImageEncoder: Send + Sync {
    /// Identifier of the underlying model, used in logs and cache keys.
    fn model_id(&self) -> &str;

    /// Length of every embedding this encoder returns.
    fn dim(&self) -> usize;

    /// Embed one image. `path` is only used for error context.
    fn encode(&self, image: &DynamicImage, path: &Path) -> PipelineResult<Vec<f32>>;
}

/// Produces unit-length embeddings for text.
pub trait TextEncoder: Send + Sync {
    /// Identifier of the underlying model, used in logs and cache keys.
    fn model_id(&self) -> &str;

    /// Length of every embedding this encoder returns.
    fn dim(&self) -> usize;

    /// Embed a batch of texts, one vector per input in input order.
    fn encode_batch(&self, texts: &[String]) -> PipelineResult<Vec<Vec<f32>>>;

    /// Embed a single text.
    fn encode(&self, text: &str) -> PipelineResult<Vec<f32>> {
        self.encode_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::Encoding {
                prompt: text.to_string(),
                message: "text encoder returned no embedding".to_string(),
            })
    }
}
