//! Image decoding: read the screenshot and decode it to a `DynamicImage`.
//!
//! Decoding a tall email render (600 × 8,000 px is common) takes tens of
//! milliseconds of pure CPU, so it runs inside `spawn_blocking` to keep the
//! Tokio worker threads free for the OCR and LLM requests in flight.
//!
//! The original bytes are kept next to the decoded pixels: OCR providers and
//! vision LLMs accept PNG/JPEG directly, and re-encoding would only cost time.

use crate::error::SlicerError;
use image::{DynamicImage, ImageFormat};
use std::path::Path;
use tracing::debug;

/// A decoded screenshot together with its source bytes.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// Raw file contents as read from disk.
    pub bytes: Vec<u8>,
    /// Container format detected from the magic bytes.
    pub format: ImageFormat,
    /// Decoded pixels.
    pub image: DynamicImage,
}

impl LoadedImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Read and decode the image at `path`.
pub async fn load_image(path: &Path) -> Result<LoadedImage, SlicerError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            SlicerError::PermissionDenied {
                path: path.to_path_buf(),
            }
        } else {
            SlicerError::FileNotFound {
                path: path.to_path_buf(),
            }
        }
    })?;

    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || decode_bytes(&owned, bytes))
        .await
        .map_err(|e| SlicerError::Internal(format!("Decode task panicked: {}", e)))?
}

/// Blocking decode of in-memory image bytes. `path` is used for error messages only.
pub fn decode_bytes(path: &Path, bytes: Vec<u8>) -> Result<LoadedImage, SlicerError> {
    let format = crate::pipeline::input::sniff_format(path, &bytes[..bytes.len().min(16)])?;

    let image = image::load_from_memory_with_format(&bytes, format).map_err(|e| {
        SlicerError::ImageDecodeFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        }
    })?;

    if image.width() == 0 || image.height() == 0 {
        return Err(SlicerError::EmptyImage {
            path: path.to_path_buf(),
            width: image.width(),
            height: image.height(),
        });
    }

    debug!(
        "Decoded {:?} screenshot: {}x{} px",
        format,
        image.width(),
        image.height()
    );

    Ok(LoadedImage {
        bytes,
        format,
        image,
    })
}
