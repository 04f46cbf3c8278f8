//! ONNX vision encoder session management and inference.
//!
//! Loads a CLIP-style vision tower exported to ONNX with its projection head
//! and returns the projected, L2-normalized image embedding.

use std::path::Path;
use std::sync::Mutex;

use image::DynamicImage;
use ort::session::Session;
use ort::value::Value;

use crate::config::EmbeddingConfig;
use crate::error::{PipelineError, PipelineResult};

use super::preprocess::preprocess;
use super::ImageEncoder;

/// Wraps an ONNX Runtime session for image embedding.
///
/// Uses a `Mutex` because `Session::run` requires `&mut self`.
pub struct OnnxImageEncoder {
    session: Mutex<Session>,
    /// Name of the input tensor (detected from model metadata).
    input_name: String,
    output_name: String,
    image_size: u32,
    model_id: String,
    dim: usize,
}

impl OnnxImageEncoder {
    /// Load the vision model from `model_dir`.
    ///
    /// Runs one inference on a blank image to learn the embedding size.
    pub fn load(config: &EmbeddingConfig, model_dir: &Path) -> PipelineResult<Self> {
        let model_path = model_dir.join(&config.vision_model);
        if !model_path.exists() {
            return Err(PipelineError::Model {
                message: format!("Vision model not found at {:?}", model_path),
            });
        }

        tracing::info!("Loading vision encoder from {:?}", model_path);
        let session = Session::builder()
            .map_err(|e| PipelineError::Model {
                message: format!("Failed to create ONNX session builder: {e}"),
            })?
            .commit_from_file(&model_path)
            .map_err(|e| PipelineError::Model {
                message: format!("Failed to load vision model: {e}"),
            })?;

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .unwrap_or_else(|| "pixel_values".to_string());

        tracing::debug!(
            "Vision encoder input: {:?}, outputs: {:?}",
            input_name,
            session
                .outputs()
                .iter()
                .map(|o| o.name())
                .collect::<Vec<_>>()
        );

        let mut encoder = Self {
            session: Mutex::new(session),
            input_name,
            output_name: config.vision_output.clone(),
            image_size: config.image_size,
            model_id: format!("{}/{}", config.model, config.vision_model),
            dim: 0,
        };

        let blank = DynamicImage::new_rgb8(config.image_size, config.image_size);
        encoder.dim = encoder.run(&blank, &model_path)?.len();
        tracing::info!("Vision encoder ready ({} dims)", encoder.dim);

        Ok(encoder)
    }

    fn run(&self, image: &DynamicImage, path: &Path) -> PipelineResult<Vec<f32>> {
        let tensor = preprocess(image, self.image_size);
        let shape: Vec<i64> = tensor.shape().iter().map(|&d| d as i64).collect();
        let flat_data: Vec<f32> = tensor.iter().copied().collect();

        let input_value =
            Value::from_array((shape, flat_data)).map_err(|e| PipelineError::Embedding {
                path: path.to_path_buf(),
                message: format!("Failed to create input tensor: {e}"),
            })?;

        let mut session = self.session.lock().map_err(|e| PipelineError::Model {
            message: format!("Vision session lock poisoned: {e}"),
        })?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .map_err(|e| PipelineError::Embedding {
                path: path.to_path_buf(),
                message: format!("ONNX inference failed: {e}"),
            })?;

        let output = outputs
            .iter()
            .find(|(name, _)| *name == self.output_name.as_str())
            .ok_or_else(|| PipelineError::Model {
                message: format!("Vision model did not produce {:?}", self.output_name),
            })?;

        let (shape, data) =
            output
                .1
                .try_extract_tensor::<f32>()
                .map_err(|e| PipelineError::Embedding {
                    path: path.to_path_buf(),
                    message: format!("Failed to extract {}: {e}", self.output_name),
                })?;

        // Projected output is [1, dim]; take the single row.
        let mut raw = match shape.len() {
            1 => data.to_vec(),
            2 => data[..shape[1] as usize].to_vec(),
            _ => {
                return Err(PipelineError::Model {
                    message: format!("Unexpected {} shape: {:?}", self.output_name, shape),
                });
            }
        };

        crate::math::l2_normalize_in_place(&mut raw);
        Ok(raw)
    }
}

impl ImageEncoder for OnnxImageEncoder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn encode(&self, image: &DynamicImage, path: &Path) -> PipelineResult<Vec<f32>> {
        self.run(image, path)
    }
}
