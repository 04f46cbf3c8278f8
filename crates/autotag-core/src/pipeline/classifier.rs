//! The classification service: encoders plus a shared tag pool.
//!
//! A `Classifier` is built once per run, after every model is loaded and the
//! pool is encoded, and is then shared by reference across all items.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::caption::{CaptionGenerator, CaptionRequest, OllamaCaptioner};
use crate::config::Config;
use crate::encoder::{ImageEncoder, OnnxImageEncoder, OnnxTextEncoder, TextEncoder, TextModelSpec};
use crate::error::{ConfigError, PipelineError, PipelineResult, Result};
use crate::math::l2_norm;
use crate::tagging::{presets, score, PolicyConfig, TagEntry, TagPool};
use crate::types::{ClassificationResult, ImageQuery, ItemOutcome, TagMatch};

use super::guard::FormatGuard;
use super::loader::{ImageLoader, LoadedImage};

/// Caption generator plus the sentence encoder that embeds its output.
pub struct CaptionBackend {
    pub generator: Arc<dyn CaptionGenerator>,
    pub encoder: Arc<dyn TextEncoder>,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_ms: u64,
}

/// Where the query embedding for an image comes from.
pub enum QueryBackend {
    /// Embed the decoded image directly
    Image(Arc<dyn ImageEncoder>),
    /// Caption the image, then embed the caption
    Caption(CaptionBackend),
}

impl QueryBackend {
    /// Dimension of the query embeddings this backend produces.
    pub fn dim(&self) -> usize {
        match self {
            QueryBackend::Image(encoder) => encoder.dim(),
            QueryBackend::Caption(backend) => backend.encoder.dim(),
        }
    }

    fn uses_caption(&self) -> bool {
        matches!(self, QueryBackend::Caption(_))
    }
}

pub struct Classifier {
    pool: Arc<TagPool>,
    policy: PolicyConfig,
    backend: QueryBackend,
    guard: FormatGuard,
    loader: ImageLoader,
}

impl Classifier {
    /// Assemble a classifier from an encoded pool and a query backend.
    ///
    /// Fails if the backend's embeddings cannot be compared with the pool's,
    /// or if the policy and backend disagree about captioning.
    pub fn new(
        pool: impl Into<Arc<TagPool>>,
        policy: PolicyConfig,
        backend: QueryBackend,
    ) -> std::result::Result<Self, ConfigError> {
        let pool = pool.into();
        if pool.embedding_dim() != backend.dim() {
            return Err(ConfigError::DimensionMismatch {
                pool: pool.embedding_dim(),
                query: backend.dim(),
            });
        }
        if policy.policy.uses_caption() != backend.uses_caption() {
            return Err(ConfigError::ValidationError(format!(
                "policy '{}' cannot run on this encoder backend",
                policy.policy
            )));
        }

        let defaults = Config::default();
        Ok(Self {
            pool,
            policy,
            backend,
            guard: FormatGuard::new(&defaults.processing),
            loader: ImageLoader::new(defaults.limits),
        })
    }

    pub fn with_guard(mut self, guard: FormatGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn with_loader(mut self, loader: ImageLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Load every model named in `config`, encode the pool and assemble.
    ///
    /// Blocks while ONNX sessions load; call before processing any image.
    pub fn from_config(config: &Config) -> Result<Self> {
        let policy = PolicyConfig::from_config(&config.tagging);
        let entries = presets::resolve_entries(&config.tagging.pool, &config.tagging.prompt_template)?;
        let text_encoder: Arc<dyn TextEncoder> = Arc::new(load_pool_encoder(config)?);
        let pool = build_pool(config, entries, text_encoder.as_ref())?;

        let backend = if policy.policy.uses_caption() {
            let generator =
                OllamaCaptioner::from_config(&config.caption, config.limits.caption_timeout_ms);
            tracing::info!(
                "Captioning with {} model {} at {}",
                generator.name(),
                config.caption.model,
                config.caption.endpoint
            );
            QueryBackend::Caption(CaptionBackend {
                generator: Arc::new(generator),
                encoder: text_encoder,
                prompt: config.caption.prompt.clone(),
                max_tokens: config.caption.max_tokens,
                temperature: config.caption.temperature,
                timeout_ms: config.limits.caption_timeout_ms,
            })
        } else {
            let vision = OnnxImageEncoder::load(&config.embedding, &config.embedding_model_dir())?;
            QueryBackend::Image(Arc::new(vision))
        };

        let classifier = Self::new(pool, policy, backend)?
            .with_guard(FormatGuard::new(&config.processing))
            .with_loader(ImageLoader::new(config.limits.clone()));
        Ok(classifier)
    }

    pub fn pool(&self) -> &TagPool {
        &self.pool
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// Classify one image.
    ///
    /// The outer `Result` carries fatal errors that must abort the batch; a
    /// recoverable failure is an `Ok(Err(SkipReason))`.
    pub async fn classify_item(&self, path: &str) -> Result<ItemOutcome> {
        let file = Path::new(path);
        if let Err(reason) = self.guard.check(file) {
            return Ok(Err(reason));
        }

        let query = match self.embed(file).await {
            Ok(embedding) => ImageQuery {
                path: path.to_string(),
                embedding: Some(embedding),
            },
            Err(e) => return e.into_skip().map(Err).map_err(Into::into),
        };

        let tags = self.rank(&query)?;
        if self.backend.uses_caption() {
            if let Some(best) = tags.first() {
                tracing::debug!("Caption match for {}: {} ({:.3})", path, best.label, best.score);
            }
        }
        tracing::debug!("{}: {} tags", path, tags.len());

        Ok(Ok(ClassificationResult {
            image_path: query.path,
            tags,
        }))
    }

    /// Score a query against the pool and apply the policy.
    ///
    /// A query without an embedding selects nothing and never reaches the scorer.
    pub fn rank(&self, query: &ImageQuery) -> std::result::Result<Vec<TagMatch>, ConfigError> {
        let Some(embedding) = &query.embedding else {
            return Ok(Vec::new());
        };
        let scores = score(embedding, &self.pool)?;
        Ok(self.policy.select(&scores, &self.pool))
    }

    async fn embed(&self, file: &Path) -> PipelineResult<Vec<f32>> {
        let loaded = self.loader.load(file).await?;
        match &self.backend {
            QueryBackend::Image(encoder) => {
                let encoder = Arc::clone(encoder);
                let path = file.to_path_buf();
                tokio::task::spawn_blocking(move || encoder.encode(&loaded.image, &path))
                    .await
                    .map_err(|e| PipelineError::Embedding {
                        path: file.to_path_buf(),
                        message: format!("Task join error: {e}"),
                    })?
            }
            QueryBackend::Caption(backend) => caption_embedding(backend, file, &loaded).await,
        }
    }
}

async fn caption_embedding(
    backend: &CaptionBackend,
    file: &Path,
    loaded: &LoadedImage,
) -> PipelineResult<Vec<f32>> {
    let request = CaptionRequest::from_image(
        loaded,
        &backend.prompt,
        backend.max_tokens,
        backend.temperature,
    );

    let caption = timeout(
        Duration::from_millis(backend.timeout_ms),
        backend.generator.caption(&request),
    )
    .await
    .map_err(|_| PipelineError::Timeout {
        path: file.to_path_buf(),
        stage: "caption".to_string(),
        timeout_ms: backend.timeout_ms,
    })??;
    tracing::debug!("Caption for {:?}: {}", file, caption);

    let encoder = Arc::clone(&backend.encoder);
    let embedding = tokio::task::spawn_blocking(move || encoder.encode(&caption))
        .await
        .map_err(|e| PipelineError::Caption {
            message: format!("Task join error: {e}"),
            status_code: None,
        })?
        .map_err(|e| match e {
            PipelineError::Encoding { message, .. } => PipelineError::Caption {
                message: format!("Cannot embed caption: {message}"),
                status_code: None,
            },
            other => other,
        })?;

    // A zero or non-finite vector has no direction to rank by.
    if !embedding.iter().all(|v| v.is_finite()) || l2_norm(&embedding) <= f32::EPSILON {
        return Err(PipelineError::Caption {
            message: "Caption embedding is degenerate".to_string(),
            status_code: None,
        });
    }
    Ok(embedding)
}

/// Load the text encoder whose embedding space the pool must live in.
///
/// Direct matching uses the CLIP text tower; caption matching uses the
/// sentence encoder that also embeds the captions.
pub fn load_pool_encoder(config: &Config) -> PipelineResult<OnnxTextEncoder> {
    if config.tagging.policy.uses_caption() {
        OnnxTextEncoder::load(TextModelSpec::sentence(config), &config.sentence_model_dir())
    } else {
        OnnxTextEncoder::load(TextModelSpec::clip(config), &config.embedding_model_dir())
    }
}

/// Encode a pool, going through the on-disk cache when enabled.
pub fn build_pool(
    config: &Config,
    entries: Vec<TagEntry>,
    encoder: &dyn TextEncoder,
) -> PipelineResult<TagPool> {
    let batch_size = config.tagging.encode_batch_size;
    if config.tagging.cache_pool {
        TagPool::load_or_build(entries, encoder, batch_size, &config.cache_dir())
    } else {
        TagPool::build(entries, encoder, batch_size)
    }
}
