//! ONNX text encoder for prompt and caption embeddings.
//!
//! Serves two model shapes:
//!
//! - CLIP text towers with a projection head: the embedding is read directly
//!   from a projected output such as `text_embeds`.
//! - Sentence encoders (MiniLM and friends): the embedding is the mean of the
//!   token states under the attention mask.

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Value;

use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};

use super::TextEncoder;

/// How token-level outputs are reduced to one vector per text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pooling {
    /// The output already holds one vector per text
    Projected,
    /// Mask-weighted mean over `[batch, seq, hidden]`
    Mean,
}

/// Files and tensor names describing one text model.
#[derive(Debug, Clone)]
pub struct TextModelSpec {
    pub model_file: String,
    pub tokenizer_file: String,
    pub max_length: usize,
    pub output_name: String,
    pub pooling: Pooling,
    pub model_id: String,
}

impl TextModelSpec {
    /// The CLIP text tower paired with the vision encoder.
    pub fn clip(config: &Config) -> Self {
        let e = &config.embedding;
        Self {
            model_file: e.text_model.clone(),
            tokenizer_file: e.tokenizer.clone(),
            max_length: e.max_length,
            output_name: e.text_output.clone(),
            pooling: Pooling::Projected,
            model_id: format!("{}/{}", e.model, e.text_model),
        }
    }

    /// The sentence encoder used to match captions.
    pub fn sentence(config: &Config) -> Self {
        let c = &config.caption;
        Self {
            model_file: c.text_model.clone(),
            tokenizer_file: c.tokenizer.clone(),
            max_length: c.max_length,
            output_name: c.text_output.clone(),
            pooling: Pooling::Mean,
            model_id: format!("{}/{}", c.sentence_model, c.text_model),
        }
    }
}

/// ONNX text encoder wrapper.
///
/// Uses the same `Mutex<Session>` pattern as the vision encoder.
pub struct OnnxTextEncoder {
    session: Mutex<Session>,
    tokenizer: tokenizers::Tokenizer,
    spec: TextModelSpec,
    feeds_attention_mask: bool,
    feeds_token_type_ids: bool,
    dim: usize,
}

impl OnnxTextEncoder {
    /// Load a text model and tokenizer from `model_dir`.
    pub fn load(spec: TextModelSpec, model_dir: &Path) -> PipelineResult<Self> {
        let model_path = model_dir.join(&spec.model_file);
        let tokenizer_path = model_dir.join(&spec.tokenizer_file);

        if !model_path.exists() {
            return Err(PipelineError::Model {
                message: format!("Text model not found at {:?}", model_path),
            });
        }
        if !tokenizer_path.exists() {
            return Err(PipelineError::Model {
                message: format!("Tokenizer not found at {:?}", tokenizer_path),
            });
        }

        let session = Session::builder()
            .map_err(|e| PipelineError::Model {
                message: format!("Failed to create ONNX session builder: {e}"),
            })?
            .commit_from_file(&model_path)
            .map_err(|e| PipelineError::Model {
                message: format!("Failed to load text model: {e}"),
            })?;

        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            PipelineError::Model {
                message: format!("Failed to load tokenizer: {e}"),
            }
        })?;

        let input_names: Vec<String> = session
            .inputs()
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        tracing::debug!("Text encoder {} inputs: {:?}", spec.model_id, input_names);

        let mut encoder = Self {
            session: Mutex::new(session),
            tokenizer,
            feeds_attention_mask: input_names.iter().any(|n| n == "attention_mask"),
            feeds_token_type_ids: input_names.iter().any(|n| n == "token_type_ids"),
            spec,
            dim: 0,
        };

        encoder.dim = encoder
            .encode_batch(&["a photo".to_string()])?
            .first()
            .map(Vec::len)
            .unwrap_or(0);
        tracing::info!(
            "Text encoder {} ready ({} dims)",
            encoder.spec.model_id,
            encoder.dim
        );

        Ok(encoder)
    }

    fn encoding_error(texts: &[String], message: String) -> PipelineError {
        PipelineError::Encoding {
            prompt: texts.first().cloned().unwrap_or_default(),
            message,
        }
    }
}

impl TextEncoder for OnnxTextEncoder {
    fn model_id(&self) -> &str {
        &self.spec.model_id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn encode_batch(&self, texts: &[String]) -> PipelineResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let max_length = self.spec.max_length;
        let batch_size = texts.len();

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| Self::encoding_error(texts, format!("Tokenization failed: {e}")))?;

        // Fixed-length, zero-padded input_ids with a matching attention mask.
        let mut input_ids = vec![0i64; batch_size * max_length];
        let mut attention_mask = vec![0i64; batch_size * max_length];
        for (i, encoding) in encodings.iter().enumerate() {
            for (j, &id) in encoding.get_ids().iter().take(max_length).enumerate() {
                input_ids[i * max_length + j] = id as i64;
                attention_mask[i * max_length + j] = 1;
            }
        }

        let shape = vec![batch_size as i64, max_length as i64];
        let tensor = |data: Vec<i64>| {
            Value::from_array((shape.clone(), data))
                .map_err(|e| Self::encoding_error(texts, format!("Failed to create tensor: {e}")))
        };
        let ids_value = tensor(input_ids)?;

        let mut session = self.session.lock().map_err(|e| PipelineError::Model {
            message: format!("Text encoder lock poisoned: {e}"),
        })?;

        let outputs = match (self.feeds_attention_mask, self.feeds_token_type_ids) {
            (true, true) => session.run(ort::inputs![
                "input_ids" => ids_value,
                "attention_mask" => tensor(attention_mask.clone())?,
                "token_type_ids" => tensor(vec![0i64; batch_size * max_length])?,
            ]),
            (true, false) => session.run(ort::inputs![
                "input_ids" => ids_value,
                "attention_mask" => tensor(attention_mask.clone())?,
            ]),
            _ => session.run(ort::inputs!["input_ids" => ids_value]),
        }
        .map_err(|e| PipelineError::Model {
            message: format!("Text encoder inference failed: {e}"),
        })?;

        let output = outputs
            .iter()
            .find(|(name, _)| *name == self.spec.output_name.as_str())
            .ok_or_else(|| PipelineError::Model {
                message: format!("Text model did not produce {:?}", self.spec.output_name),
            })?;

        let (shape, data) = output.1.try_extract_tensor::<f32>().map_err(|e| {
            PipelineError::Model {
                message: format!("Failed to extract {}: {e}", self.spec.output_name),
            }
        })?;
        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();

        reduce_output(
            self.spec.pooling,
            &dims,
            data,
            &attention_mask,
            max_length,
            batch_size,
        )
        .map_err(|message| PipelineError::Model {
            message: format!("{}: {message}", self.spec.output_name),
        })
    }
}

/// Turn a raw model output of shape `dims` into one unit vector per text.
fn reduce_output(
    pooling: Pooling,
    dims: &[usize],
    data: &[f32],
    attention_mask: &[i64],
    max_length: usize,
    batch_size: usize,
) -> Result<Vec<Vec<f32>>, String> {
    match (pooling, dims) {
        (_, [.., 0]) => Err("empty embedding axis".to_string()),
        (Pooling::Projected, [_, dim]) => Ok(data
            .chunks(*dim)
            .take(batch_size)
            .map(crate::math::l2_normalize)
            .collect()),
        (Pooling::Mean, [_, seq, hidden]) => Ok(mean_pool(
            data,
            attention_mask,
            max_length,
            *seq,
            *hidden,
            batch_size,
        )),
        (pooling, other) => Err(format!("unexpected shape {:?} for {:?} pooling", other, pooling)),
    }
}

/// Mask-weighted mean of token states, L2-normalized per text.
fn mean_pool(
    data: &[f32],
    attention_mask: &[i64],
    mask_stride: usize,
    seq: usize,
    hidden: usize,
    batch_size: usize,
) -> Vec<Vec<f32>> {
    (0..batch_size)
        .map(|b| {
            let mut pooled = vec![0.0f32; hidden];
            let mut count = 0.0f32;
            for t in 0..seq.min(mask_stride) {
                if attention_mask[b * mask_stride + t] == 0 {
                    continue;
                }
                let offset = (b * seq + t) * hidden;
                for (acc, v) in pooled.iter_mut().zip(&data[offset..offset + hidden]) {
                    *acc += v;
                }
                count += 1.0;
            }
            if count > 0.0 {
                pooled.iter_mut().for_each(|v| *v /= count);
            }
            crate::math::l2_normalize_in_place(&mut pooled);
            pooled
        })
        .collect()
}
