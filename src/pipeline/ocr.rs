//! OCR providers: screenshot bytes → Vision-style [`TextAnnotation`].
//!
//! The trait is object-safe (boxed futures) so the orchestration layer can
//! hold an `Arc<dyn OcrProvider>` picked at runtime, and tests can plug in a
//! canned annotation without a network.

use crate::config::{OcrSource, SliceConfig};
use crate::error::SlicerError;
use crate::pipeline::text::TextAnnotation;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::BoxFuture;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Source of text geometry for a screenshot.
pub trait OcrProvider: Send + Sync {
    /// Short identifier used in logs and error messages.
    fn name(&self) -> &str;

    /// Run text detection over the encoded image (PNG, JPEG, GIF or WebP).
    fn recognize<'a>(&'a self, image_bytes: &'a [u8]) -> BoxFuture<'a, Result<TextAnnotation, SlicerError>>;
}

// ── Google Vision ────────────────────────────────────────────────────────

/// `images:annotate` with `DOCUMENT_TEXT_DETECTION`.
pub struct GoogleVisionOcr {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    timeout_secs: u64,
}

impl GoogleVisionOcr {
    pub const DEFAULT_ENDPOINT: &'static str = "https://vision.googleapis.com/v1/images:annotate";
    pub const API_KEY_ENV: &'static str = "GOOGLE_VISION_API_KEY";

    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> Result<Self, SlicerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SlicerError::Internal(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            timeout_secs,
        })
    }

    /// Build from `GOOGLE_VISION_API_KEY`.
    pub fn from_env(timeout_secs: u64) -> Result<Self, SlicerError> {
        match std::env::var(Self::API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Self::new(key, timeout_secs),
            _ => Err(SlicerError::OcrNotConfigured {
                hint: format!(
                    "Set {} or pass a saved OCR response with --ocr-json.",
                    Self::API_KEY_ENV
                ),
            }),
        }
    }

    /// Point at a different annotate endpoint (proxies, regional hosts, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn annotate(&self, image_bytes: &[u8]) -> Result<TextAnnotation, SlicerError> {
        let body = serde_json::json!({
            "requests": [{
                "image": { "content": STANDARD.encode(image_bytes) },
                "features": [{ "type": "DOCUMENT_TEXT_DETECTION" }],
            }]
        });

        debug!("Vision request: {} image bytes", image_bytes.len());

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SlicerError::OcrTimeout {
                        secs: self.timeout_secs,
                    }
                } else {
                    SlicerError::OcrFailed {
                        provider: self.name().to_string(),
                        message: e.without_url().to_string(),
                    }
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| SlicerError::OcrFailed {
            provider: self.name().to_string(),
            message: e.without_url().to_string(),
        })?;

        if !status.is_success() {
            return Err(SlicerError::OcrFailed {
                provider: self.name().to_string(),
                message: format!("HTTP {}: {}", status, excerpt(&text)),
            });
        }

        parse_vision_json(&text)
    }
}

impl OcrProvider for GoogleVisionOcr {
    fn name(&self) -> &str {
        "google-vision"
    }

    fn recognize<'a>(&'a self, image_bytes: &'a [u8]) -> BoxFuture<'a, Result<TextAnnotation, SlicerError>> {
        Box::pin(self.annotate(image_bytes))
    }
}

// ── Saved response ───────────────────────────────────────────────────────

/// Reads a previously saved Vision response from disk; the image is ignored.
#[derive(Debug, Clone)]
pub struct FileOcr {
    path: PathBuf,
}

impl FileOcr {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl OcrProvider for FileOcr {
    fn name(&self) -> &str {
        "file"
    }

    fn recognize<'a>(&'a self, _image_bytes: &'a [u8]) -> BoxFuture<'a, Result<TextAnnotation, SlicerError>> {
        Box::pin(async move {
            let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::PermissionDenied {
                    SlicerError::PermissionDenied {
                        path: self.path.clone(),
                    }
                } else {
                    SlicerError::FileNotFound {
                        path: self.path.clone(),
                    }
                }
            })?;
            parse_vision_json(&text)
        })
    }
}

// ── Response parsing ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct VisionResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    #[serde(default)]
    full_text_annotation: Option<TextAnnotation>,
    #[serde(default)]
    error: Option<VisionStatus>,
}

#[derive(Debug, Deserialize)]
struct VisionStatus {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Parse a Vision payload in any of the shapes people save to disk:
/// the full `{"responses": [...]}` batch, a single `AnnotateImageResponse`,
/// or a bare `fullTextAnnotation`.
///
/// A response without `fullTextAnnotation` means no text was found and yields
/// an empty annotation.
pub fn parse_vision_json(json: &str) -> Result<TextAnnotation, SlicerError> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| SlicerError::OcrResponseInvalid {
            detail: e.to_string(),
        })?;

    let invalid = |e: serde_json::Error| SlicerError::OcrResponseInvalid {
        detail: e.to_string(),
    };

    let single = if value.get("responses").is_some() {
        let batch: VisionResponse = serde_json::from_value(value).map_err(invalid)?;
        match batch.responses.into_iter().next() {
            Some(r) => r,
            None => {
                return Err(SlicerError::OcrResponseInvalid {
                    detail: "empty responses array".into(),
                })
            }
        }
    } else if value.get("fullTextAnnotation").is_some() || value.get("error").is_some() {
        serde_json::from_value(value).map_err(invalid)?
    } else if value.get("pages").is_some() {
        return serde_json::from_value(value).map_err(invalid);
    } else if value.as_object().is_some_and(|o| o.is_empty()) {
        // Vision answers `{}` for an image with no text at all.
        return Ok(TextAnnotation::default());
    } else {
        return Err(SlicerError::OcrResponseInvalid {
            detail: "expected `responses`, `fullTextAnnotation` or `pages`".into(),
        });
    };

    if let Some(err) = single.error {
        return Err(SlicerError::OcrFailed {
            provider: "google-vision".into(),
            message: format!("code {}: {}", err.code, err.message),
        });
    }

    Ok(single.full_text_annotation.unwrap_or_default())
}

fn excerpt(text: &str) -> String {
    text.chars().take(200).collect()
}

/// Pick the OCR provider for `config`: an explicit provider wins, then the
/// configured [`OcrSource`].
pub fn resolve_ocr(config: &SliceConfig) -> Result<Arc<dyn OcrProvider>, SlicerError> {
    if let Some(ref p) = config.ocr_provider {
        return Ok(Arc::clone(p));
    }

    match &config.ocr {
        OcrSource::File(path) => {
            info!("OCR from saved response: {}", path.display());
            Ok(Arc::new(FileOcr::new(path.clone())))
        }
        OcrSource::GoogleVision { api_key: Some(key) } => {
            Ok(Arc::new(GoogleVisionOcr::new(key.clone(), config.api_timeout_secs)?))
        }
        OcrSource::GoogleVision { api_key: None } => {
            Ok(Arc::new(GoogleVisionOcr::from_env(config.api_timeout_secs)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANNOTATION: &str = r#"{
        "pages": [{
            "width": 600, "height": 1000,
            "blocks": [{
                "paragraphs": [{
                    "boundingBox": {"vertices": [{"x": 10, "y": 900}, {"x": 300, "y": 900}, {"x": 300, "y": 920}, {"x": 10, "y": 920}]},
                    "words": [{"symbols": [{"text": "Hi"}]}]
                }]
            }]
        }],
        "text": "Hi"
    }"#;

    #[test]
    fn parses_bare_annotation() {
        let a = parse_vision_json(ANNOTATION).unwrap();
        assert_eq!(a.pages.len(), 1);
        assert_eq!(a.text, "Hi");
    }

    #[test]
    fn parses_batch_response() {
        let json = format!(r#"{{"responses": [{{"fullTextAnnotation": {ANNOTATION}}}]}}"#);
        let a = parse_vision_json(&json).unwrap();
        assert_eq!(a.pages[0].blocks[0].paragraphs.len(), 1);
    }

    #[test]
    fn parses_single_response() {
        let json = format!(r#"{{"fullTextAnnotation": {ANNOTATION}}}"#);
        assert_eq!(parse_vision_json(&json).unwrap().pages.len(), 1);
    }

    #[test]
    fn no_text_is_an_empty_annotation() {
        assert_eq!(parse_vision_json(r#"{"responses": [{}]}"#).unwrap(), TextAnnotation::default());
        assert_eq!(parse_vision_json("{}").unwrap(), TextAnnotation::default());
    }

    #[test]
    fn embedded_error_is_reported() {
        let json = r#"{"responses": [{"error": {"code": 3, "message": "Bad image data."}}]}"#;
        let err = parse_vision_json(json).unwrap_err();
        assert!(matches!(err, SlicerError::OcrFailed { ref message, .. } if message.contains("Bad image data")));
    }

    #[test]
    fn malformed_json_is_invalid() {
        assert!(matches!(
            parse_vision_json("not json").unwrap_err(),
            SlicerError::OcrResponseInvalid { .. }
        ));
        assert!(matches!(
            parse_vision_json(r#"{"responses": []}"#).unwrap_err(),
            SlicerError::OcrResponseInvalid { .. }
        ));
        assert!(matches!(
            parse_vision_json("[1, 2]").unwrap_err(),
            SlicerError::OcrResponseInvalid { .. }
        ));
    }

    #[tokio::test]
    async fn file_ocr_reads_saved_response() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ocr.json");
        std::fs::write(&path, ANNOTATION).unwrap();
        let ocr = FileOcr::new(&path);
        let a = ocr.recognize(&[]).await.unwrap();
        assert_eq!(a.text, "Hi");
    }

    #[tokio::test]
    async fn file_ocr_missing_file() {
        let ocr = FileOcr::new("/no/such/ocr.json");
        assert!(matches!(
            ocr.recognize(&[]).await.unwrap_err(),
            SlicerError::FileNotFound { .. }
        ));
    }

    #[test]
    fn resolve_prefers_explicit_file_source() {
        let config = SliceConfig::builder()
            .ocr(OcrSource::File(PathBuf::from("saved.json")))
            .build()
            .unwrap();
        assert_eq!(resolve_ocr(&config).unwrap().name(), "file");
    }

    #[test]
    fn resolve_with_inline_key() {
        let config = SliceConfig::builder()
            .ocr(OcrSource::GoogleVision {
                api_key: Some("k".into()),
            })
            .build()
            .unwrap();
        assert_eq!(resolve_ocr(&config).unwrap().name(), "google-vision");
    }
}
