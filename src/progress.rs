//! Progress-callback trait for per-stage analysis events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::SliceConfigBuilder::progress_callback`] to receive events
//! as each screenshot moves through the pipeline. The CLI uses it to drive
//! its spinner; services can forward events to a channel or a job record.
//!
//! # Example
//!
//! ```rust
//! use email_slicer::{AnalysisProgressCallback, SliceConfig, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl AnalysisProgressCallback for CountingCallback {
//!     fn on_stage_complete(&self, input: &str, stage: Stage) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{input}: {stage} done");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = SliceConfig::builder()
//!     .progress_callback(counter as Arc<dyn AnalysisProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Pipeline stage reported to [`AnalysisProgressCallback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Path/URL resolution and download.
    Resolve,
    /// Image decoding.
    Decode,
    /// Text detection.
    Ocr,
    /// Semantic boundary proposal.
    Propose,
    /// Bands, candidates, footer and validation.
    Plan,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Resolve => "resolve",
            Stage::Decode => "decode",
            Stage::Ocr => "ocr",
            Stage::Propose => "propose",
            Stage::Plan => "plan",
        };
        f.write_str(s)
    }
}

/// Called by the analysis pipeline as it processes each screenshot.
///
/// Implementations must be `Send + Sync`: OCR and the boundary proposal run
/// concurrently, and [`crate::stream::analyze_stream`] analyses several
/// screenshots at once. All methods have default no-op implementations so
/// callers only override what they care about.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called once before the input is resolved.
    fn on_analysis_start(&self, input: &str) {
        let _ = input;
    }

    fn on_stage_start(&self, input: &str, stage: Stage) {
        let _ = (input, stage);
    }

    fn on_stage_complete(&self, input: &str, stage: Stage) {
        let _ = (input, stage);
    }

    /// Called when a stage fails. For fatal stages this is followed by no
    /// further events; for the proposer the analysis continues.
    fn on_stage_error(&self, input: &str, stage: Stage, error: &str) {
        let _ = (input, stage, error);
    }

    /// Called once with the final slice count.
    fn on_analysis_complete(&self, input: &str, slice_count: usize) {
        let _ = (input, slice_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::SliceConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
