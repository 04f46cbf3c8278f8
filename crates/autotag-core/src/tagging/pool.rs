//! The tag pool: ordered tags with their pre-computed prompt embeddings.
//!
//! Embeddings are stored as one flat N×D row-major matrix so scoring is a
//! single pass over contiguous memory. Row `i` belongs to entry `i`; that index
//! is the join key between a score vector and the tag labels.

use std::path::{Path, PathBuf};

use crate::encoder::TextEncoder;
use crate::error::PipelineError;

/// A tag declaration before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEntry {
    /// Label written to the output
    pub label: String,
    /// Text handed to the text encoder
    pub prompt: String,
}

impl TagEntry {
    pub fn new(label: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            prompt: prompt.into(),
        }
    }
}

/// Encoded, immutable tag pool.
#[derive(Debug, Clone)]
pub struct TagPool {
    entries: Vec<TagEntry>,
    /// Flat matrix: N × dim stored row-major.
    matrix: Vec<f32>,
    embedding_dim: usize,
}

impl TagPool {
    /// Encode every prompt and build the pool.
    ///
    /// Prompts are sent to the encoder in chunks of `batch_size`. Any prompt the
    /// encoder cannot embed fails the whole build.
    pub fn build(
        entries: Vec<TagEntry>,
        encoder: &dyn TextEncoder,
        batch_size: usize,
    ) -> Result<Self, PipelineError> {
        if entries.is_empty() {
            return Err(PipelineError::Encoding {
                prompt: String::new(),
                message: "cannot build an empty tag pool".to_string(),
            });
        }

        tracing::info!(
            "Encoding {} tag prompts with {}...",
            entries.len(),
            encoder.model_id()
        );

        let batch_size = batch_size.max(1);
        let mut rows: Vec<Vec<f32>> = Vec::with_capacity(entries.len());
        for chunk in entries.chunks(batch_size) {
            let prompts: Vec<String> = chunk.iter().map(|e| e.prompt.clone()).collect();
            let embeddings = encoder.encode_batch(&prompts)?;

            if embeddings.len() != prompts.len() {
                return Err(PipelineError::Encoding {
                    prompt: prompts[embeddings.len().min(prompts.len() - 1)].clone(),
                    message: format!(
                        "encoder returned {} embeddings for {} prompts",
                        embeddings.len(),
                        prompts.len()
                    ),
                });
            }
            rows.extend(embeddings);
        }

        let pool = Self::from_embeddings(entries, rows)?;
        tracing::info!(
            "Tag pool ready: {} tags x {} dims",
            pool.len(),
            pool.embedding_dim()
        );
        Ok(pool)
    }

    /// Assemble a pool from entries and their raw embeddings.
    ///
    /// Each embedding is L2-normalized; all must share one non-zero dimension.
    pub fn from_embeddings(
        entries: Vec<TagEntry>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self, PipelineError> {
        if entries.len() != embeddings.len() {
            return Err(PipelineError::Encoding {
                prompt: String::new(),
                message: format!(
                    "{} tags but {} embeddings",
                    entries.len(),
                    embeddings.len()
                ),
            });
        }

        let embedding_dim = embeddings.first().map(Vec::len).unwrap_or(0);
        let mut matrix = Vec::with_capacity(entries.len() * embedding_dim);

        for (entry, embedding) in entries.iter().zip(&embeddings) {
            if embedding.is_empty() || embedding.len() != embedding_dim {
                return Err(PipelineError::Encoding {
                    prompt: entry.prompt.clone(),
                    message: format!(
                        "expected a {}-dim embedding, got {} values",
                        embedding_dim,
                        embedding.len()
                    ),
                });
            }
            if crate::math::l2_norm(embedding) <= f32::EPSILON {
                return Err(PipelineError::Encoding {
                    prompt: entry.prompt.clone(),
                    message: "encoder produced a zero vector".to_string(),
                });
            }
            matrix.extend(crate::math::l2_normalize(embedding));
        }

        Ok(Self {
            entries,
            matrix,
            embedding_dim,
        })
    }

    /// Number of tags in the pool.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool holds no tags (never true for a built pool).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dimension shared by every embedding.
    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    /// Label of the tag at `index`.
    pub fn label(&self, index: usize) -> &str {
        &self.entries[index].label
    }

    /// Iterate over rows of the embedding matrix in pool order.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.matrix.chunks_exact(self.embedding_dim.max(1))
    }

    /// Cache key covering the encoder identity and every label/prompt.
    pub fn cache_key(entries: &[TagEntry], encoder_id: &str) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(encoder_id.as_bytes());
        hasher.update(&[0]);
        for entry in entries {
            hasher.update(entry.label.as_bytes());
            hasher.update(&[0x1f]);
            hasher.update(entry.prompt.as_bytes());
            hasher.update(&[0x1e]);
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Load a cached pool if one exists for these entries, otherwise build and save it.
    ///
    /// Cache problems are logged and fall back to a fresh build; only encoding
    /// failures are returned.
    pub fn load_or_build(
        entries: Vec<TagEntry>,
        encoder: &dyn TextEncoder,
        batch_size: usize,
        cache_dir: &Path,
    ) -> Result<Self, PipelineError> {
        let key = Self::cache_key(&entries, encoder.model_id());
        let path = cache_path(cache_dir, &key);

        if Self::cache_valid(&path, &key) {
            match Self::load(&path, entries.clone()) {
                Ok(pool) => return Ok(pool),
                Err(e) => tracing::warn!("Ignoring unreadable pool cache: {e}"),
            }
        }

        let pool = Self::build(entries, encoder, batch_size)?;
        if let Err(e) = std::fs::create_dir_all(cache_dir) {
            tracing::warn!("Cannot create pool cache dir {:?}: {e}", cache_dir);
        } else if let Err(e) = pool.save(&path, &key) {
            tracing::warn!("Failed to cache tag pool: {e}");
        }
        Ok(pool)
    }

    /// Save embeddings as raw little-endian f32, with a `.meta` sidecar.
    pub fn save(&self, path: &Path, key: &str) -> Result<(), PipelineError> {
        let bytes: Vec<u8> = self.matrix.iter().flat_map(|f| f.to_le_bytes()).collect();
        std::fs::write(path, &bytes).map_err(|e| PipelineError::Model {
            message: format!("Failed to save tag pool to {:?}: {}", path, e),
        })?;

        let meta_path = path.with_extension("meta");
        let meta = format!(
            "pool_key={}\ntag_count={}\nembedding_dim={}\n",
            key,
            self.len(),
            self.embedding_dim
        );
        std::fs::write(&meta_path, meta).map_err(|e| PipelineError::Model {
            message: format!("Failed to save tag pool metadata to {:?}: {}", meta_path, e),
        })?;

        tracing::debug!("Saved tag pool to {:?}", path);
        Ok(())
    }

    /// Load embeddings saved by [`TagPool::save`] for the given entries.
    pub fn load(path: &Path, entries: Vec<TagEntry>) -> Result<Self, PipelineError> {
        let meta_path = path.with_extension("meta");
        let meta = std::fs::read_to_string(&meta_path).map_err(|e| PipelineError::Model {
            message: format!("Failed to read {:?}: {}", meta_path, e),
        })?;
        let embedding_dim = meta
            .lines()
            .find_map(|line| line.strip_prefix("embedding_dim="))
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&d| d > 0)
            .ok_or_else(|| PipelineError::Model {
                message: format!("Missing embedding_dim in {:?}", meta_path),
            })?;

        let bytes = std::fs::read(path).map_err(|e| PipelineError::Model {
            message: format!("Failed to read tag pool from {:?}: {}", path, e),
        })?;

        let expected_len = entries.len() * embedding_dim * 4;
        if bytes.len() != expected_len {
            return Err(PipelineError::Model {
                message: format!(
                    "Tag pool size mismatch: expected {} bytes ({} tags), got {}",
                    expected_len,
                    entries.len(),
                    bytes.len()
                ),
            });
        }

        let matrix: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        tracing::info!("Loaded cached tag pool: {} tags from {:?}", entries.len(), path);

        Ok(Self {
            entries,
            matrix,
            embedding_dim,
        })
    }

    /// Whether the sidecar next to `path` was written for `key`.
    pub fn cache_valid(path: &Path, key: &str) -> bool {
        let Ok(content) = std::fs::read_to_string(path.with_extension("meta")) else {
            return false;
        };
        content.lines().any(|line| line == format!("pool_key={}", key))
    }
}

/// Cache file for a pool key.
pub fn cache_path(cache_dir: &Path, key: &str) -> PathBuf {
    cache_dir.join(format!("pool-{}.bin", &key[..16.min(key.len())]))
}
