//! Deterministic stand-ins for the model-backed collaborators.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, GenericImageView};

use crate::caption::{CaptionGenerator, CaptionRequest};
use crate::encoder::{ImageEncoder, TextEncoder};
use crate::error::{PipelineError, PipelineResult};
use crate::math::l2_normalize;

/// Text encoder backed by a lookup table. Unknown texts fail to encode.
pub struct FixedTextEncoder {
    table: HashMap<String, Vec<f32>>,
    dim: usize,
    calls: AtomicUsize,
}

impl FixedTextEncoder {
    pub fn new(table: Vec<(&str, Vec<f32>)>) -> Self {
        let dim = table.first().map(|(_, v)| v.len()).unwrap_or(0);
        Self {
            table: table
                .into_iter()
                .map(|(text, v)| (text.to_string(), l2_normalize(&v)))
                .collect(),
            dim,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `encode_batch` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextEncoder for FixedTextEncoder {
    fn model_id(&self) -> &str {
        "fixed-text"
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn encode_batch(&self, texts: &[String]) -> PipelineResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        texts
            .iter()
            .map(|text| {
                self.table
                    .get(text)
                    .cloned()
                    .ok_or_else(|| PipelineError::Encoding {
                        prompt: text.clone(),
                        message: "not in lookup table".to_string(),
                    })
            })
            .collect()
    }
}

/// Image encoder that embeds an image as its normalized mean RGB color.
#[derive(Default)]
pub struct ColorImageEncoder {
    calls: AtomicUsize,
}

impl ColorImageEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImageEncoder for ColorImageEncoder {
    fn model_id(&self) -> &str {
        "mean-color"
    }

    fn dim(&self) -> usize {
        3
    }

    fn encode(&self, image: &DynamicImage, _path: &Path) -> PipelineResult<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rgb = image.to_rgb8();
        let (w, h) = image.dimensions();
        let count = (w as f32 * h as f32).max(1.0);
        let mut sums = [0.0f32; 3];
        for pixel in rgb.pixels() {
            for (sum, &channel) in sums.iter_mut().zip(pixel.0.iter()) {
                *sum += channel as f32;
            }
        }
        Ok(l2_normalize(&sums.map(|s| s / count / 255.0)))
    }
}

/// Caption generator that returns a fixed caption, fails, or stalls.
pub struct FixedCaptioner {
    caption: Option<String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl FixedCaptioner {
    pub fn new(caption: &str) -> Self {
        Self {
            caption: Some(caption.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// A captioner whose every call fails with a server error.
    pub fn failing() -> Self {
        Self {
            caption: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptionGenerator for FixedCaptioner {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn caption(&self, _request: &CaptionRequest) -> Result<String, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.caption.clone().ok_or_else(|| PipelineError::Caption {
            message: "HTTP 500: model crashed".to_string(),
            status_code: Some(500),
        })
    }
}

/// Write a solid-color PNG and return its path as a string.
pub fn write_png(dir: &Path, name: &str, rgb: [u8; 3]) -> String {
    let path = dir.join(name);
    image::RgbImage::from_pixel(8, 8, image::Rgb(rgb))
        .save_with_format(&path, image::ImageFormat::Png)
        .unwrap();
    path.to_string_lossy().into_owned()
}

/// Write bytes that no decoder accepts.
pub fn write_garbage(dir: &Path, name: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, b"this is not an image at all").unwrap();
    path.to_string_lossy().into_owned()
}
