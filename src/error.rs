//! Error types for the email-slicer library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`SlicerError`] is **fatal**: the analysis of one screenshot cannot
//!   proceed at all (missing file, not an image, OCR provider unreachable,
//!   invalid configuration). Returned as `Err(SlicerError)` from the
//!   top-level `analyze*` functions.
//!
//! * [`StageError`] is **non-fatal**: an optional stage failed (the semantic
//!   boundary proposer timed out, visual cut detection crashed) but the slice
//!   plan can still be computed from the remaining inputs. Stored in
//!   [`crate::output::SliceAnalysis::warnings`].
//!
//! The slicing core itself never returns errors: malformed boundary proposals
//! are repaired, and the repairs are reported on the layout instead.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the email-slicer library.
#[derive(Debug, Error)]
pub enum SlicerError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Screenshot not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but its leading bytes match no image format.
    #[error("File is not an image: '{path}'\nFirst bytes: {magic:?}")]
    NotAnImage { path: PathBuf, magic: [u8; 4] },

    /// Recognised image container that the slicer does not decode.
    #[error("Unsupported image format {format} in '{path}' (expected PNG, JPEG, GIF or WebP)")]
    UnsupportedImageFormat { path: PathBuf, format: String },

    /// The image header was valid but pixel data could not be decoded.
    #[error("Failed to decode image '{path}': {detail}")]
    ImageDecodeFailed { path: PathBuf, detail: String },

    /// Decoded image has zero width or height.
    #[error("Image '{path}' is empty ({width}x{height})")]
    EmptyImage { path: PathBuf, width: u32, height: u32 },

    // ── OCR errors ────────────────────────────────────────────────────────
    /// No OCR provider could be constructed (missing API key etc.).
    #[error("OCR provider is not configured.\n{hint}")]
    OcrNotConfigured { hint: String },

    /// The OCR provider returned an error or an unusable HTTP status.
    #[error("OCR provider '{provider}' failed: {message}")]
    OcrFailed { provider: String, message: String },

    /// The OCR call exceeded the configured API timeout.
    #[error("OCR call timed out after {secs}s\nIncrease --api-timeout.")]
    OcrTimeout { secs: u64 },

    /// The OCR payload could not be interpreted as a text annotation.
    #[error("Invalid OCR response: {detail}")]
    OcrResponseInvalid { detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured LLM provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for one optional pipeline stage.
///
/// The analysis continues with a fallback (an empty boundary proposal, the
/// uniform candidate grid) and records the failure here.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum StageError {
    /// Boundary proposer failed after all retries.
    #[error("Boundary proposal failed after {retries} retries: {detail}")]
    ProposalFailed { retries: u8, detail: String },

    /// Boundary proposer timed out on its final attempt.
    #[error("Boundary proposal timed out after {secs}s")]
    ProposalTimeout { secs: u64 },

    /// The proposer answered, but no integer list could be found in the reply.
    #[error("Boundary proposal reply contained no boundary list: {excerpt:?}")]
    ProposalUnparseable { excerpt: String },

    /// Row-profile analysis of the pixels did not complete.
    #[error("Visual cut detection failed: {detail}")]
    VisualCutsFailed { detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_an_image_display() {
        let e = SlicerError::NotAnImage {
            path: PathBuf::from("/tmp/notes.txt"),
            magic: *b"hell",
        };
        let msg = e.to_string();
        assert!(msg.contains("notes.txt"), "got: {msg}");
    }

    #[test]
    fn empty_image_display() {
        let e = SlicerError::EmptyImage {
            path: PathBuf::from("blank.png"),
            width: 600,
            height: 0,
        };
        assert!(e.to_string().contains("600x0"));
    }

    #[test]
    fn ocr_failed_display() {
        let e = SlicerError::OcrFailed {
            provider: "google-vision".into(),
            message: "HTTP 403".into(),
        };
        assert!(e.to_string().contains("google-vision"));
        assert!(e.to_string().contains("HTTP 403"));
    }

    #[test]
    fn proposal_timeout_display() {
        let e = StageError::ProposalTimeout { secs: 60 };
        assert!(e.to_string().contains("60s"));
    }

    #[test]
    fn stage_error_serialises() {
        let e = StageError::ProposalFailed {
            retries: 3,
            detail: "HTTP 503".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: StageError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
