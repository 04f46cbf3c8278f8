//! Image loading with size limits, content-sniffed decoding and timeout.

use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use image::{DynamicImage, GenericImageView, ImageFormat};
use tokio::time::timeout;

use crate::config::LimitsConfig;
use crate::error::{PipelineError, PipelineResult};

/// A decoded image plus the original file bytes.
pub struct LoadedImage {
    pub image: DynamicImage,
    /// Raw file contents, forwarded to caption providers
    pub bytes: Vec<u8>,
    /// Detected format name ("jpeg", "png", ...)
    pub format: String,
}

/// Loads and decodes images under the configured limits.
#[derive(Debug, Clone)]
pub struct ImageLoader {
    limits: LimitsConfig,
}

impl ImageLoader {
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Read, decode and validate one image.
    pub async fn load(&self, path: &Path) -> PipelineResult<LoadedImage> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| PipelineError::FileNotFound(path.to_path_buf()))?;
        if !metadata.is_file() {
            return Err(PipelineError::FileNotFound(path.to_path_buf()));
        }

        let max_bytes = self.limits.max_file_size_mb * 1024 * 1024;
        if metadata.len() > max_bytes {
            return Err(PipelineError::FileTooLarge {
                path: path.to_path_buf(),
                size_mb: metadata.len() / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }

        let bytes = tokio::fs::read(path).await.map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!("Cannot read file: {e}"),
        })?;

        let (image, format, bytes) = self.decode(bytes, path).await?;

        let (width, height) = image.dimensions();
        if width > self.limits.max_image_dimension || height > self.limits.max_image_dimension {
            return Err(PipelineError::ImageTooLarge {
                path: path.to_path_buf(),
                width,
                height,
                max_dim: self.limits.max_image_dimension,
            });
        }

        tracing::trace!("Decoded {:?} ({}x{}, {})", path, width, height, format);
        Ok(LoadedImage {
            image,
            bytes,
            format,
        })
    }

    /// Decode on a blocking thread under the decode timeout.
    async fn decode(
        &self,
        bytes: Vec<u8>,
        path: &Path,
    ) -> PipelineResult<(DynamicImage, String, Vec<u8>)> {
        let path_owned = path.to_path_buf();
        let timeout_duration = Duration::from_millis(self.limits.decode_timeout_ms);

        let decode_result = timeout(
            timeout_duration,
            tokio::task::spawn_blocking(move || {
                let decoded = decode_bytes_sync(&bytes, &path_owned);
                decoded.map(|(image, format)| (image, format, bytes))
            }),
        )
        .await;

        match decode_result {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Task join error: {e}"),
            }),
            Err(_) => Err(PipelineError::Timeout {
                path: path.to_path_buf(),
                stage: "decode".to_string(),
                timeout_ms: self.limits.decode_timeout_ms,
            }),
        }
    }
}

fn decode_bytes_sync(bytes: &[u8], path: &Path) -> PipelineResult<(DynamicImage, String)> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!("Cannot detect image format: {e}"),
        })?;

    let format = match reader.format() {
        Some(f) => f,
        None => ImageFormat::from_path(path).map_err(|_| PipelineError::UnsupportedFormat {
            path: path.to_path_buf(),
            format: path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("unknown")
                .to_string(),
        })?,
    };

    let image = reader.decode().map_err(|e| PipelineError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok((image, format_to_string(format)))
}

/// Convert an ImageFormat to its short name.
pub fn format_to_string(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Png => "png",
        ImageFormat::WebP => "webp",
        ImageFormat::Gif => "gif",
        ImageFormat::Tiff => "tiff",
        ImageFormat::Bmp => "bmp",
        ImageFormat::Avif => "avif",
        _ => "unknown",
    }
    .to_string()
}
