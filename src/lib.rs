//! # email-slicer
//!
//! Plan where to cut a full-length marketing email screenshot into
//! horizontal slices, without ever cutting through text.
//!
//! ## Why this crate?
//!
//! Email builders export campaigns as stacks of image slices. Cutting by
//! hand is slow, and a naive fixed-height cut splits headlines and buttons
//! in half. This crate reads the text geometry from OCR, marks every text
//! line as forbidden, finds where the legal footer starts, and repairs any
//! proposed set of cut positions (hand-written, or suggested by a vision
//! LLM) into a lawful slice layout.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Screenshot
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Decode    PNG / JPEG / GIF / WebP (CPU-bound, spawn_blocking)
//!  ├─ 3. Extract   OCR ∥ boundary proposal ∥ visual cut detection
//!  ├─ 4. Bands     padded text boxes → merged forbidden bands
//!  ├─ 5. Cuts      uniform grid + visual candidates + low-risk bands
//!  ├─ 6. Footer    keyword + small-print heuristics, snapped to a safe line
//!  └─ 7. Validate  repair the proposal into slices [0, footer]
//! ```
//!
//! Stages 4–7 are pure and deterministic; see [`plan_slices`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use email_slicer::{analyze, BoundarySource, SliceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // OCR key from GOOGLE_VISION_API_KEY
//!     let config = SliceConfig::builder()
//!         .boundaries(BoundarySource::Fixed(vec![420, 980, 1600]))
//!         .build()?;
//!     let analysis = analyze("campaign.png", &config).await?;
//!     for s in analysis.slices() {
//!         println!("{}..{}", s.y_top, s.y_bottom);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `mailslice` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! email-slicer = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze, analyze_bytes, analyze_sync, analyze_to_file, plan_slices};
pub use config::{BoundarySource, FooterRules, OcrSource, SliceConfig, SliceConfigBuilder, VisualCutParams};
pub use error::{SlicerError, StageError};
pub use output::{AnalysisStats, ImageInfo, SliceAnalysis, SlicePlan};
pub use pipeline::bands::{build_forbidden_bands, ForbiddenBand};
pub use pipeline::candidates::{generate_candidates, CandidateCutLine, CutCandidates, CutKind, LowRiskCutBand};
pub use pipeline::footer::{detect_footer, FooterConfidence, FooterDetection};
pub use pipeline::llm::{BoundaryProposer, LlmBoundaryProposer, Proposal, ProposalRequest};
pub use pipeline::ocr::{FileOcr, GoogleVisionOcr, OcrProvider};
pub use pipeline::text::{extract_text_blocks, TextAnnotation, TextBlock};
pub use pipeline::validate::{validate_boundaries, Repair, Slice, SliceLayout};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
pub use stream::{analyze_stream, AnalysisStream, StreamItem};
