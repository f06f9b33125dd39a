//! Output types returned by the analysis entry points.
//!
//! Everything here is `Serialize + Deserialize`: the CLI's `--json` output
//! and [`crate::analyze::analyze_to_file`] are a direct dump of
//! [`SliceAnalysis`], and downstream exporters read it back.

use crate::error::StageError;
use crate::pipeline::bands::ForbiddenBand;
use crate::pipeline::candidates::CutCandidates;
use crate::pipeline::footer::FooterDetection;
use crate::pipeline::text::TextBlock;
use crate::pipeline::validate::{Slice, SliceLayout};
use serde::{Deserialize, Serialize};

/// Basic facts about the analysed screenshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    /// Container format, e.g. `"png"`.
    pub format: String,
}

/// Everything the pure pipeline derives from text geometry and a proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlicePlan {
    pub text_blocks: Vec<TextBlock>,
    pub forbidden_bands: Vec<ForbiddenBand>,
    /// Grid plus visual candidates. Not serialised: it is large and fully
    /// reproducible from the image and the config.
    #[serde(default, skip_serializing)]
    pub candidates: CutCandidates,
    pub footer: FooterDetection,
    /// Raw, unvalidated boundaries as received.
    pub proposed_boundaries: Vec<i64>,
    pub layout: SliceLayout,
}

impl SlicePlan {
    pub fn slices(&self) -> &[Slice] {
        &self.layout.slices
    }
}

/// Result of analysing one screenshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceAnalysis {
    /// Input as given by the caller (path or URL).
    pub source: String,
    pub image: ImageInfo,
    pub plan: SlicePlan,
    /// Non-fatal failures of optional stages.
    #[serde(default)]
    pub warnings: Vec<StageError>,
    pub stats: AnalysisStats,
}

impl SliceAnalysis {
    pub fn slices(&self) -> &[Slice] {
        self.plan.slices()
    }

    pub fn footer_start_y(&self) -> u32 {
        self.plan.layout.footer_start_y
    }
}

/// Timing and usage accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub text_blocks: usize,
    pub forbidden_bands: usize,
    pub candidate_lines: usize,
    pub repairs: usize,
    pub slices: usize,
    /// Tokens spent by the boundary proposer (0 without an LLM).
    pub proposal_input_tokens: u64,
    pub proposal_output_tokens: u64,
    pub proposal_retries: u8,
    pub decode_ms: u64,
    pub ocr_ms: u64,
    pub proposal_ms: u64,
    pub plan_ms: u64,
    pub total_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::footer::FooterConfidence;

    fn plan() -> SlicePlan {
        SlicePlan {
            text_blocks: vec![],
            forbidden_bands: vec![],
            candidates: CutCandidates::default(),
            footer: FooterDetection {
                start_y: 100,
                raw_start_y: 100,
                confidence: FooterConfidence::Low,
                matched_blocks: 0,
                dense_small_text: false,
            },
            proposed_boundaries: vec![],
            layout: SliceLayout {
                footer_start_y: 100,
                slices: vec![Slice { y_top: 0, y_bottom: 100 }],
                repairs: vec![],
            },
        }
    }

    #[test]
    fn candidates_are_not_serialised() {
        let json = serde_json::to_value(plan()).unwrap();
        assert!(json.get("candidates").is_none());
        assert_eq!(json["footer"]["confidence"], "low");
    }

    #[test]
    fn analysis_round_trips_without_candidates() {
        let analysis = SliceAnalysis {
            source: "a.png".into(),
            image: ImageInfo {
                width: 600,
                height: 120,
                format: "png".into(),
            },
            plan: plan(),
            warnings: vec![StageError::ProposalTimeout { secs: 5 }],
            stats: AnalysisStats::default(),
        };
        let json = serde_json::to_string(&analysis).unwrap();
        let back: SliceAnalysis = serde_json::from_str(&json).unwrap();
        assert_eq!(back, analysis);
        assert_eq!(back.footer_start_y(), 100);
        assert_eq!(back.slices().len(), 1);
    }
}
