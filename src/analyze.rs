//! Eager (single-screenshot) analysis entry points.
//!
//! [`plan_slices`] is the pure core: text geometry and a raw proposal in, a
//! validated slice plan out. [`analyze`] wraps it with everything needed to
//! get there from a path or URL: resolve, decode, then OCR, boundary
//! proposal and visual cut detection in parallel. Use
//! [`crate::stream::analyze_stream`] for batches.

use crate::config::{BoundarySource, SliceConfig};
use crate::error::{SlicerError, StageError};
use crate::output::{AnalysisStats, ImageInfo, SliceAnalysis, SlicePlan};
use crate::pipeline::bands::{build_forbidden_bands, is_forbidden};
use crate::pipeline::candidates::{generate_candidates, merge_candidates, CandidateCutLine, CutCandidates};
use crate::pipeline::decode::{self, LoadedImage};
use crate::pipeline::edges::detect_visual_cuts;
use crate::pipeline::footer::detect_footer;
use crate::pipeline::llm::{BoundaryProposer, LlmBoundaryProposer, Proposal, ProposalRequest};
use crate::pipeline::ocr::resolve_ocr;
use crate::pipeline::text::{extract_text_blocks, TextBlock};
use crate::pipeline::validate::validate_boundaries;
use crate::pipeline::{encode, input};
use crate::progress::{AnalysisProgressCallback, Stage};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Run the slicing core over already-extracted inputs.
///
/// `visual` holds candidates detected from the pixels; they are merged with
/// the uniform grid. The footer is snapped only to candidate lines outside
/// every forbidden band, so it never lands on text.
///
/// # Panics
/// When `image_height` or `config.step` is zero.
pub fn plan_slices(
    text_blocks: Vec<TextBlock>,
    image_height: u32,
    visual: Option<CutCandidates>,
    proposed_boundaries: Vec<i64>,
    config: &SliceConfig,
) -> SlicePlan {
    let forbidden_bands = build_forbidden_bands(&text_blocks, config.padding);

    let grid = generate_candidates(image_height, config.step, config.low_risk_multiple);
    let candidates = match visual {
        Some(v) => merge_candidates(grid, v),
        None => grid,
    };

    let safe_lines: Vec<CandidateCutLine> = candidates
        .lines
        .iter()
        .filter(|c| !is_forbidden(c.y, &forbidden_bands))
        .copied()
        .collect();
    let footer = detect_footer(&text_blocks, image_height, &safe_lines, &config.footer);

    let layout = validate_boundaries(
        &proposed_boundaries,
        footer.start_y,
        &forbidden_bands,
        &candidates.lines,
        &candidates.low_risk,
        config.min_slice_height,
    );

    debug!(
        "Plan: {} blocks → {} bands, {} candidates, footer at {}, {} slices, {} repairs",
        text_blocks.len(),
        forbidden_bands.len(),
        candidates.lines.len(),
        footer.start_y,
        layout.slices.len(),
        layout.repairs.len()
    );

    SlicePlan {
        text_blocks,
        forbidden_bands,
        candidates,
        footer,
        proposed_boundaries,
        layout,
    }
}

/// Analyse an email screenshot file or URL.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Returns `Err(SlicerError)` only for fatal errors: unreadable or
/// non-image input, OCR failure, or a provider that cannot be configured.
/// A failing boundary proposer is recorded in
/// [`SliceAnalysis::warnings`] and the plan is built from an empty proposal.
pub async fn analyze(input_str: impl AsRef<str>, config: &SliceConfig) -> Result<SliceAnalysis, SlicerError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    config.validate()?;
    info!("Starting analysis: {}", input_str);
    notify(config, |cb| cb.on_analysis_start(input_str));

    // ── Step 1: Resolve input ────────────────────────────────────────────
    notify(config, |cb| cb.on_stage_start(input_str, Stage::Resolve));
    let resolved = input::resolve_input(input_str, config.download_timeout_secs)
        .await
        .map_err(|e| stage_failed(config, input_str, Stage::Resolve, e))?;
    notify(config, |cb| cb.on_stage_complete(input_str, Stage::Resolve));

    // ── Step 2: Decode ───────────────────────────────────────────────────
    let decode_start = Instant::now();
    notify(config, |cb| cb.on_stage_start(input_str, Stage::Decode));
    let loaded = decode::load_image(resolved.path())
        .await
        .map_err(|e| stage_failed(config, input_str, Stage::Decode, e))?;
    notify(config, |cb| cb.on_stage_complete(input_str, Stage::Decode));
    let decode_ms = decode_start.elapsed().as_millis() as u64;

    analyze_loaded(input_str, loaded, decode_ms, total_start, config).await
}

/// Analyse a screenshot held in memory. `source` labels the result.
pub async fn analyze_bytes(
    bytes: Vec<u8>,
    source: impl Into<String>,
    config: &SliceConfig,
) -> Result<SliceAnalysis, SlicerError> {
    let total_start = Instant::now();
    let source = source.into();
    config.validate()?;
    notify(config, |cb| cb.on_analysis_start(&source));

    let decode_start = Instant::now();
    notify(config, |cb| cb.on_stage_start(&source, Stage::Decode));
    let label = std::path::PathBuf::from(&source);
    let loaded = tokio::task::spawn_blocking(move || decode::decode_bytes(&label, bytes))
        .await
        .map_err(|e| SlicerError::Internal(format!("Decode task panicked: {}", e)))?
        .map_err(|e| stage_failed(config, &source, Stage::Decode, e))?;
    notify(config, |cb| cb.on_stage_complete(&source, Stage::Decode));
    let decode_ms = decode_start.elapsed().as_millis() as u64;

    analyze_loaded(&source, loaded, decode_ms, total_start, config).await
}

/// Analyse a screenshot and write the JSON result to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn analyze_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &SliceConfig,
) -> Result<SliceAnalysis, SlicerError> {
    let analysis = analyze(input_str, config).await?;
    let path = output_path.as_ref();
    let json = serde_json::to_vec_pretty(&analysis)
        .map_err(|e| SlicerError::Internal(format!("Failed to serialise analysis: {}", e)))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SlicerError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &json)
        .await
        .map_err(|e| SlicerError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| SlicerError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(analysis)
}

/// Synchronous wrapper around [`analyze`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(input_str: impl AsRef<str>, config: &SliceConfig) -> Result<SliceAnalysis, SlicerError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| SlicerError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyze(input_str, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Steps 3–5: (OCR ∥ proposal ∥ visual cuts) → plan.
async fn analyze_loaded(
    source: &str,
    loaded: LoadedImage,
    decode_ms: u64,
    total_start: Instant,
    config: &SliceConfig,
) -> Result<SliceAnalysis, SlicerError> {
    let (width, height) = (loaded.width(), loaded.height());
    let image = ImageInfo {
        width,
        height,
        format: format!("{:?}", loaded.format).to_lowercase(),
    };

    // Misconfiguration is fatal; surface it before any network call.
    let ocr = resolve_ocr(config)?;
    let proposer = resolve_proposer(config)?;
    let loaded = Arc::new(loaded);

    // ── Step 3: OCR ∥ proposal ∥ visual cuts ─────────────────────────────
    let ocr_task = async {
        let start = Instant::now();
        notify(config, |cb| cb.on_stage_start(source, Stage::Ocr));
        let limit = Duration::from_secs(config.api_timeout_secs);
        let result = match tokio::time::timeout(limit, ocr.recognize(&loaded.bytes)).await {
            Ok(r) => r,
            Err(_) => Err(SlicerError::OcrTimeout {
                secs: config.api_timeout_secs,
            }),
        };
        (result, start.elapsed().as_millis() as u64)
    };

    let proposal_task = async {
        let start = Instant::now();
        let result = propose(source, &loaded, proposer.as_ref(), config).await;
        (result, start.elapsed().as_millis() as u64)
    };

    let visual_task = async {
        let Some(params) = config.visual_cuts.clone() else {
            return Ok(None);
        };
        let img = Arc::clone(&loaded);
        tokio::task::spawn_blocking(move || detect_visual_cuts(&img.image, &params))
            .await
            .map(Some)
            .map_err(|e| StageError::VisualCutsFailed { detail: e.to_string() })
    };

    let ((ocr_result, ocr_ms), (proposal_result, proposal_ms), visual_result) =
        tokio::join!(ocr_task, proposal_task, visual_task);

    let annotation = ocr_result.map_err(|e| stage_failed(config, source, Stage::Ocr, e))?;
    notify(config, |cb| cb.on_stage_complete(source, Stage::Ocr));

    let mut warnings = Vec::new();
    let proposal = proposal_result.unwrap_or_else(|e| {
        warn!("{}: {}; continuing with an empty proposal", source, e);
        warnings.push(e);
        Proposal::default()
    });
    let visual = visual_result.unwrap_or_else(|e| {
        warn!("{}: {}; using the uniform grid only", source, e);
        warnings.push(e);
        None
    });

    // ── Step 4: Plan ─────────────────────────────────────────────────────
    let plan_start = Instant::now();
    notify(config, |cb| cb.on_stage_start(source, Stage::Plan));
    let text_blocks = extract_text_blocks(&annotation, width, height);
    let plan = plan_slices(text_blocks, height, visual, proposal.boundaries, config);
    notify(config, |cb| cb.on_stage_complete(source, Stage::Plan));
    let plan_ms = plan_start.elapsed().as_millis() as u64;

    // ── Step 5: Stats ────────────────────────────────────────────────────
    let stats = AnalysisStats {
        text_blocks: plan.text_blocks.len(),
        forbidden_bands: plan.forbidden_bands.len(),
        candidate_lines: plan.candidates.lines.len(),
        repairs: plan.layout.repairs.len(),
        slices: plan.layout.slices.len(),
        proposal_input_tokens: proposal.input_tokens,
        proposal_output_tokens: proposal.output_tokens,
        proposal_retries: proposal.retries,
        decode_ms,
        ocr_ms,
        proposal_ms,
        plan_ms,
        total_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Analysis complete: {} → {} slices, footer at {} ({:?}), {}ms total",
        source,
        stats.slices,
        plan.footer.start_y,
        plan.footer.confidence,
        stats.total_ms
    );
    notify(config, |cb| cb.on_analysis_complete(source, stats.slices));

    Ok(SliceAnalysis {
        source: source.to_string(),
        image,
        plan,
        warnings,
        stats,
    })
}

/// Obtain the raw proposal for the configured [`BoundarySource`].
async fn propose(
    source: &str,
    loaded: &LoadedImage,
    proposer: Option<&Arc<dyn BoundaryProposer>>,
    config: &SliceConfig,
) -> Result<Proposal, StageError> {
    match (&config.boundaries, proposer) {
        (BoundarySource::Fixed(boundaries), _) => Ok(Proposal {
            boundaries: boundaries.clone(),
            ..Proposal::default()
        }),
        (BoundarySource::Llm, Some(proposer)) => {
            notify(config, |cb| cb.on_stage_start(source, Stage::Propose));
            let result = match encode::encode_for_vision(loaded) {
                Ok(image) => {
                    proposer
                        .propose(ProposalRequest {
                            image: &image,
                            image_width: loaded.width(),
                            image_height: loaded.height(),
                        })
                        .await
                }
                Err(e) => Err(StageError::ProposalFailed {
                    retries: 0,
                    detail: format!("Image encoding failed: {}", e),
                }),
            };
            match &result {
                Ok(_) => notify(config, |cb| cb.on_stage_complete(source, Stage::Propose)),
                Err(e) => notify(config, |cb| cb.on_stage_error(source, Stage::Propose, &e.to_string())),
            }
            result
        }
        _ => Ok(Proposal::default()),
    }
}

/// The proposer used for [`BoundarySource::Llm`]; `None` for other sources.
fn resolve_proposer(config: &SliceConfig) -> Result<Option<Arc<dyn BoundaryProposer>>, SlicerError> {
    if config.boundaries != BoundarySource::Llm {
        return Ok(None);
    }
    if let Some(ref p) = config.proposer {
        return Ok(Some(Arc::clone(p)));
    }
    let provider = resolve_provider(config)?;
    Ok(Some(Arc::new(LlmBoundaryProposer::new(provider, config))))
}

/// Instantiate a named provider with the given model.
fn create_vision_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, SlicerError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| SlicerError::ProviderNotConfigured {
        provider: provider_name.to_string(),
        hint: format!("{e}"),
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &SliceConfig) -> Result<Arc<dyn LLMProvider>, SlicerError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) = ProviderFactory::from_env().map_err(|e| SlicerError::ProviderNotConfigured {
        provider: "auto".to_string(),
        hint: format!(
            "No LLM provider could be auto-detected from environment.\n\
            Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
            Error: {}",
            e
        ),
    })?;

    Ok(llm_provider)
}

fn notify(config: &SliceConfig, event: impl FnOnce(&dyn AnalysisProgressCallback)) {
    if let Some(ref cb) = config.progress_callback {
        event(cb.as_ref());
    }
}

fn stage_failed(config: &SliceConfig, source: &str, stage: Stage, err: SlicerError) -> SlicerError {
    notify(config, |cb| cb.on_stage_error(source, stage, &err.to_string()));
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::footer::FooterConfidence;
    use crate::pipeline::validate::Slice;

    fn block(text: &str, y0: u32, y1: u32) -> TextBlock {
        TextBlock::new(text, 20, y0, 580, y1)
    }

    #[test]
    fn plan_without_text_or_proposal_is_one_slice() {
        let config = SliceConfig::default();
        let plan = plan_slices(vec![], 1000, None, vec![], &config);
        assert_eq!(plan.footer.confidence, FooterConfidence::Low);
        assert_eq!(plan.footer.start_y, 950);
        assert_eq!(plan.slices(), &[Slice { y_top: 0, y_bottom: 950 }]);
    }

    #[test]
    fn footer_never_snaps_into_text() {
        // Unsubscribe line spans 940..962 → band 936..966; grid lines 940,
        // 950, 960 are forbidden, so the footer snaps to 930 rather than 940.
        let config = SliceConfig::default();
        let blocks = vec![block("Unsubscribe | Privacy Policy", 940, 962)];
        let plan = plan_slices(blocks, 1000, None, vec![], &config);
        assert_eq!(plan.footer.raw_start_y, 940);
        assert_eq!(plan.footer.start_y, 930);
        assert!(!is_forbidden(plan.footer.start_y, &plan.forbidden_bands));
    }

    #[test]
    fn proposal_is_repaired_against_text() {
        let config = SliceConfig::default();
        let blocks = vec![block("Hero headline", 200, 260), block("Unsubscribe", 950, 970)];
        let plan = plan_slices(blocks, 1000, None, vec![230, 500], &config);
        // 230 is inside band 196..264 → nearest safe grid lines 190 (40) / 270 (40) → tie → 270.
        assert_eq!(plan.layout.boundaries(), vec![0, 270, 500, 940]);
        assert_eq!(plan.proposed_boundaries, vec![230, 500]);
    }

    #[test]
    fn visual_candidates_are_merged() {
        let config = SliceConfig::default();
        let visual = CutCandidates {
            lines: vec![CandidateCutLine {
                y: 333,
                strength: 1.0,
                kind: crate::pipeline::candidates::CutKind::Edge,
            }],
            low_risk: vec![],
        };
        let plan = plan_slices(vec![], 1000, Some(visual), vec![], &config);
        assert!(plan.candidates.lines.iter().any(|c| c.y == 333));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_io() {
        let config = SliceConfig {
            step: 0,
            ..SliceConfig::default()
        };
        let err = analyze("/does/not/matter.png", &config).await.unwrap_err();
        assert!(matches!(err, SlicerError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn missing_file_is_fatal() {
        let err = analyze("/does/not/exist.png", &SliceConfig::default()).await.unwrap_err();
        assert!(matches!(err, SlicerError::FileNotFound { .. }));
    }
}
