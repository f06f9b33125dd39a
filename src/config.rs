//! Configuration types for screenshot slicing.
//!
//! All analysis behaviour is controlled through [`SliceConfig`], built via
//! its [`SliceConfigBuilder`]. The pure pipeline functions take their
//! thresholds as explicit parameters; this struct is only the place where the
//! orchestration layer and the CLI keep them together.

use crate::error::SlicerError;
use crate::pipeline::llm::BoundaryProposer;
use crate::pipeline::ocr::OcrProvider;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for one screenshot analysis.
///
/// # Example
/// ```rust
/// use email_slicer::SliceConfig;
///
/// let config = SliceConfig::builder()
///     .padding(6)
///     .min_slice_height(40)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct SliceConfig {
    /// Pixels added above and below every text box before merging into
    /// forbidden bands. Default: 4.
    pub padding: u32,

    /// Spacing of the uniform candidate grid in pixels. Default: 10.
    pub step: u32,

    /// Low-risk bands are placed every `step * low_risk_multiple` pixels.
    /// Default: 5.
    pub low_risk_multiple: u32,

    /// Minimum slice height in pixels. Default: 20.
    pub min_slice_height: u32,

    /// Footer detection heuristics.
    pub footer: FooterRules,

    /// Row-profile analysis of the pixels. `None` uses the uniform grid only.
    /// Default: enabled with [`VisualCutParams::default`].
    pub visual_cuts: Option<VisualCutParams>,

    /// Where the raw boundary proposal comes from. Default: [`BoundarySource::None`].
    pub boundaries: BoundarySource,

    /// Where text geometry comes from. Default: Google Vision, key from env.
    pub ocr: OcrSource,

    /// Pre-constructed OCR provider. Takes precedence over `ocr`.
    pub ocr_provider: Option<Arc<dyn OcrProvider>>,

    /// Pre-constructed boundary proposer. Used when `boundaries` is
    /// [`BoundarySource::Llm`]; takes precedence over the LLM settings below.
    pub proposer: Option<Arc<dyn BoundaryProposer>>,

    /// LLM model identifier for the boundary proposer.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the proposer. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the proposer may generate. Default: 1024.
    pub max_tokens: usize,

    /// Retry attempts on a failed proposer call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Custom proposer system prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Timeout per OCR or LLM call in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Screenshots analysed at once by [`crate::stream::analyze_stream`]. Default: 4.
    pub concurrency: usize,

    /// Stage progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            padding: 4,
            step: 10,
            low_risk_multiple: 5,
            min_slice_height: 20,
            footer: FooterRules::default(),
            visual_cuts: Some(VisualCutParams::default()),
            boundaries: BoundarySource::default(),
            ocr: OcrSource::default(),
            ocr_provider: None,
            proposer: None,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 1024,
            max_retries: 3,
            retry_backoff_ms: 500,
            system_prompt: None,
            download_timeout_secs: 120,
            api_timeout_secs: 60,
            concurrency: 4,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for SliceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SliceConfig")
            .field("padding", &self.padding)
            .field("step", &self.step)
            .field("low_risk_multiple", &self.low_risk_multiple)
            .field("min_slice_height", &self.min_slice_height)
            .field("footer", &self.footer)
            .field("visual_cuts", &self.visual_cuts)
            .field("boundaries", &self.boundaries)
            .field("ocr", &self.ocr)
            .field("ocr_provider", &self.ocr_provider.as_ref().map(|p| p.name().to_string()))
            .field("proposer", &self.proposer.as_ref().map(|_| "<dyn BoundaryProposer>"))
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl SliceConfig {
    /// Create a new builder for `SliceConfig`.
    pub fn builder() -> SliceConfigBuilder {
        SliceConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check the constraints the pipeline relies on.
    ///
    /// Called by [`SliceConfigBuilder::build`] and again by the `analyze*`
    /// entry points, since fields are public and may be edited after building.
    pub fn validate(&self) -> Result<(), SlicerError> {
        if self.step == 0 {
            return Err(SlicerError::InvalidConfig(
                "Candidate step must be ≥ 1".into(),
            ));
        }
        if self.concurrency == 0 {
            return Err(SlicerError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        let f = &self.footer;
        if !(0.0..=1.0).contains(&f.bottom_region_ratio) {
            return Err(SlicerError::InvalidConfig(format!(
                "Footer region ratio must be 0–1, got {}",
                f.bottom_region_ratio
            )));
        }
        if !(0.0..=1.0).contains(&f.fallback_ratio) {
            return Err(SlicerError::InvalidConfig(format!(
                "Footer fallback ratio must be 0–1, got {}",
                f.fallback_ratio
            )));
        }
        if f.high_confidence_matches == 0 {
            return Err(SlicerError::InvalidConfig(
                "High-confidence footer match count must be ≥ 1".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`SliceConfig`].
#[derive(Debug)]
pub struct SliceConfigBuilder {
    config: SliceConfig,
}

impl SliceConfigBuilder {
    pub fn padding(mut self, px: u32) -> Self {
        self.config.padding = px;
        self
    }

    pub fn step(mut self, px: u32) -> Self {
        self.config.step = px.max(1);
        self
    }

    pub fn low_risk_multiple(mut self, n: u32) -> Self {
        self.config.low_risk_multiple = n.max(1);
        self
    }

    pub fn min_slice_height(mut self, px: u32) -> Self {
        self.config.min_slice_height = px;
        self
    }

    pub fn footer_rules(mut self, rules: FooterRules) -> Self {
        self.config.footer = rules;
        self
    }

    pub fn visual_cuts(mut self, params: Option<VisualCutParams>) -> Self {
        self.config.visual_cuts = params;
        self
    }

    pub fn boundaries(mut self, source: BoundarySource) -> Self {
        self.config.boundaries = source;
        self
    }

    pub fn ocr(mut self, source: OcrSource) -> Self {
        self.config.ocr = source;
        self
    }

    pub fn ocr_provider(mut self, provider: Arc<dyn OcrProvider>) -> Self {
        self.config.ocr_provider = Some(provider);
        self
    }

    pub fn proposer(mut self, proposer: Arc<dyn BoundaryProposer>) -> Self {
        self.config.proposer = Some(proposer);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SliceConfig, SlicerError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ── Stage parameters ─────────────────────────────────────────────────────

/// Thresholds for the footer detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FooterRules {
    /// Only blocks with `y_top ≥ bottom_region_ratio × height` are
    /// considered. Default: 0.6 (the bottom 40 %).
    pub bottom_region_ratio: f64,

    /// Footer start used when nothing is detected, as a fraction of the
    /// height. Default: 0.95.
    pub fallback_ratio: f64,

    /// Matches needed for `high` confidence. Default: 3.
    pub high_confidence_matches: usize,

    /// Blocks shorter than this count as small text. Default: 30.
    pub small_text_max_height: u32,

    /// Small-text blocks must have more characters than this. Default: 10.
    pub small_text_min_chars: usize,

    /// Small-text blocks needed before they count as footer evidence. Default: 3.
    pub dense_text_min_blocks: usize,
}

impl Default for FooterRules {
    fn default() -> Self {
        Self {
            bottom_region_ratio: 0.6,
            fallback_ratio: 0.95,
            high_confidence_matches: 3,
            small_text_max_height: 30,
            small_text_min_chars: 10,
            dense_text_min_blocks: 3,
        }
    }
}

/// Thresholds for row-profile visual cut detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualCutParams {
    /// Maximum luminance standard deviation for a row to count as uniform,
    /// and maximum mean drift within one uniform run. Default: 2.0.
    pub uniform_tolerance: f32,

    /// Shortest uniform run reported, in rows. Default: 6.
    pub min_uniform_run: u32,

    /// Row-mean luminance change that marks a colour shift. Default: 24.0.
    pub color_shift_threshold: f32,

    /// Per-pixel luminance change that counts as "changed". Default: 40.
    pub edge_pixel_delta: u8,

    /// Fraction of changed pixels that marks an edge row. Default: 0.6.
    pub edge_row_fraction: f32,
}

impl Default for VisualCutParams {
    fn default() -> Self {
        Self {
            uniform_tolerance: 2.0,
            min_uniform_run: 6,
            color_shift_threshold: 24.0,
            edge_pixel_delta: 40,
            edge_row_fraction: 0.6,
        }
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Origin of the raw (untrusted) boundary proposal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum BoundarySource {
    /// No proposal: one slice per footer region, subject to repairs. (default)
    #[default]
    None,
    /// Caller-supplied y positions.
    Fixed(Vec<i64>),
    /// Ask a vision LLM for section boundaries.
    Llm,
}

/// Origin of the OCR text geometry.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub enum OcrSource {
    /// Google Vision `DOCUMENT_TEXT_DETECTION`. The key falls back to the
    /// `GOOGLE_VISION_API_KEY` environment variable.
    GoogleVision { api_key: Option<String> },
    /// A saved Vision response (or bare `fullTextAnnotation`) on disk.
    File(PathBuf),
}

impl Default for OcrSource {
    fn default() -> Self {
        OcrSource::GoogleVision { api_key: None }
    }
}

impl fmt::Debug for OcrSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OcrSource::GoogleVision { api_key } => f
                .debug_struct("GoogleVision")
                .field("api_key", &api_key.as_ref().map(|_| "<redacted>"))
                .finish(),
            OcrSource::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}
