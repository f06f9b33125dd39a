//! Input resolution: normalise a user-supplied path or URL to a local file.
//!
//! Screenshots usually live in a CDN bucket, so URLs are first-class input.
//! Downloads land in a `TempDir` that is removed when [`ResolvedInput`] is
//! dropped. The leading bytes are sniffed before returning so a mistyped
//! path to an HTML page or PDF fails here with a readable error instead of
//! deep inside the decoder.

use crate::error::SlicerError;
use image::ImageFormat;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// The resolved input: either a local path or a downloaded temp file.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the image was downloaded to a temp directory.
    /// The `TempDir` is kept alive to prevent cleanup until analysis completes.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Get the path to the image file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local image file path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, SlicerError> {
    if input.trim().is_empty() {
        return Err(SlicerError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Identify a supported image container from its leading bytes.
pub fn sniff_format(path: &Path, head: &[u8]) -> Result<ImageFormat, SlicerError> {
    match image::guess_format(head) {
        Ok(f @ (ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif | ImageFormat::WebP)) => Ok(f),
        Ok(other) => Err(SlicerError::UnsupportedImageFormat {
            path: path.to_path_buf(),
            format: format!("{other:?}"),
        }),
        Err(_) => {
            let mut magic = [0u8; 4];
            let n = head.len().min(4);
            magic[..n].copy_from_slice(&head[..n]);
            Err(SlicerError::NotAnImage {
                path: path.to_path_buf(),
                magic,
            })
        }
    }
}

/// Resolve a local file path, validating existence and image magic bytes.
fn resolve_local(path_str: &str) -> Result<ResolvedInput, SlicerError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(SlicerError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(f) => {
            let mut head = Vec::with_capacity(16);
            f.take(16)
                .read_to_end(&mut head)
                .map_err(|e| SlicerError::Internal(format!("Failed to read '{}': {e}", path.display())))?;
            sniff_format(&path, &head)?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(SlicerError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(SlicerError::FileNotFound { path });
        }
    }

    debug!("Resolved local screenshot: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, SlicerError> {
    info!("Downloading screenshot from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| SlicerError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            SlicerError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            SlicerError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(SlicerError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = extract_filename(url);

    let temp_dir = TempDir::new().map_err(|e| SlicerError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| SlicerError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    sniff_format(&file_path, &bytes[..bytes.len().min(16)])?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| SlicerError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Last URL path segment when it looks like a file name.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "screenshot.img".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn test_is_url() {
        assert!(is_url("https://cdn.example.com/campaign.png"));
        assert!(is_url("http://cdn.example.com/campaign.png"));
        assert!(!is_url("/tmp/campaign.png"));
        assert!(!is_url("campaign.png"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_extract_filename() {
        assert_eq!(extract_filename("https://cdn.example.com/a/hero.jpg?v=2"), "hero.jpg");
        assert_eq!(extract_filename("https://cdn.example.com/render/"), "screenshot.img");
    }

    #[test]
    fn sniff_accepts_png_and_rejects_pdf() {
        let p = Path::new("x");
        assert_eq!(sniff_format(p, PNG_MAGIC).unwrap(), ImageFormat::Png);
        let err = sniff_format(p, b"%PDF-1.7").unwrap_err();
        assert!(matches!(err, SlicerError::NotAnImage { magic, .. } if &magic == b"%PDF"));
    }

    #[test]
    fn sniff_handles_short_input() {
        let err = sniff_format(Path::new("x"), b"ab").unwrap_err();
        assert!(matches!(err, SlicerError::NotAnImage { magic, .. } if magic == [b'a', b'b', 0, 0]));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = resolve_input("/definitely/not/here.png", 5).await.err().unwrap();
        assert!(matches!(err, SlicerError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn blank_input_is_invalid() {
        let err = resolve_input("  ", 5).await.err().unwrap();
        assert!(matches!(err, SlicerError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn text_file_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello world").unwrap();
        let err = resolve_input(f.path().to_str().unwrap(), 5).await.err().unwrap();
        assert!(matches!(err, SlicerError::NotAnImage { .. }));
    }

    #[tokio::test]
    async fn png_file_resolves_locally() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(PNG_MAGIC).unwrap();
        let resolved = resolve_input(f.path().to_str().unwrap(), 5).await.unwrap();
        assert_eq!(resolved.path(), f.path());
    }
}
