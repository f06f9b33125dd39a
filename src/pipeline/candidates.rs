//! Candidate cut lines and low-risk bands.
//!
//! Candidates are content-independent snapping targets. Without pixel data
//! they degrade to a uniform grid; [`crate::pipeline::edges`] can add
//! pre-scored visual candidates on top via [`merge_candidates`]. Nothing
//! downstream trusts a candidate on its own: the validator still checks every
//! one against the forbidden bands.

use serde::{Deserialize, Serialize};

/// Strength assigned to grid candidates that carry no visual evidence.
pub const GRID_STRENGTH: f32 = 0.5;

/// Where a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CutKind {
    Edge,
    Whitespace,
    ColorShift,
}

/// A y position where a cut is structurally plausible.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateCutLine {
    pub y: u32,
    pub strength: f32,
    pub kind: CutKind,
}

/// A y range where cutting is always safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowRiskCutBand {
    pub y_top: u32,
    pub y_bottom: u32,
}

/// Candidate lines plus low-risk bands, both sorted by y.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CutCandidates {
    pub lines: Vec<CandidateCutLine>,
    pub low_risk: Vec<LowRiskCutBand>,
}

/// Build the uniform fallback grid.
///
/// Lines sit at every multiple of `step` in `[0, image_height]`. Low-risk
/// bands are `step` tall and start at every multiple of
/// `step * low_risk_multiple` strictly inside the image.
///
/// # Panics
/// When `image_height` or `step` is zero.
pub fn generate_candidates(image_height: u32, step: u32, low_risk_multiple: u32) -> CutCandidates {
    assert!(image_height > 0, "image height must be positive");
    assert!(step > 0, "candidate step must be positive");

    let lines = (0..=image_height)
        .step_by(step as usize)
        .map(|y| CandidateCutLine {
            y,
            strength: GRID_STRENGTH,
            kind: CutKind::Whitespace,
        })
        .collect();

    let coarse = step.saturating_mul(low_risk_multiple.max(1));
    let low_risk = (coarse..image_height)
        .step_by(coarse as usize)
        .map(|y| LowRiskCutBand {
            y_top: y,
            y_bottom: y.saturating_add(step).min(image_height),
        })
        .collect();

    CutCandidates { lines, low_risk }
}

/// Combine two candidate sets.
///
/// Lines at the same y collapse to the strongest one. Overlapping or touching
/// low-risk bands are merged.
pub fn merge_candidates(base: CutCandidates, extra: CutCandidates) -> CutCandidates {
    let mut lines: Vec<CandidateCutLine> = base.lines.into_iter().chain(extra.lines).collect();
    lines.sort_by(|a, b| a.y.cmp(&b.y).then(b.strength.total_cmp(&a.strength)));
    lines.dedup_by_key(|l| l.y);

    let mut bands: Vec<LowRiskCutBand> = base.low_risk.into_iter().chain(extra.low_risk).collect();
    bands.sort_unstable_by_key(|b| (b.y_top, b.y_bottom));
    let mut low_risk: Vec<LowRiskCutBand> = Vec::with_capacity(bands.len());
    for band in bands {
        match low_risk.last_mut() {
            Some(current) if band.y_top <= current.y_bottom => {
                current.y_bottom = current.y_bottom.max(band.y_bottom);
            }
            _ => low_risk.push(band),
        }
    }

    CutCandidates { lines, low_risk }
}

/// The position in `positions` closest to `target`.
///
/// On an exact tie the later (larger) position wins, independent of the
/// iteration order.
pub fn nearest_position(target: u32, positions: impl IntoIterator<Item = u32>) -> Option<u32> {
    positions
        .into_iter()
        .min_by_key(|&y| (y.abs_diff(target), std::cmp::Reverse(y)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_covers_whole_height() {
        let c = generate_candidates(100, 10, 5);
        let ys: Vec<u32> = c.lines.iter().map(|l| l.y).collect();
        assert_eq!(ys, vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
        assert!(c.lines.iter().all(|l| l.kind == CutKind::Whitespace));
        assert!(c.lines.iter().all(|l| l.strength == GRID_STRENGTH));
    }

    #[test]
    fn grid_skips_non_multiple_bottom() {
        let c = generate_candidates(25, 10, 5);
        let ys: Vec<u32> = c.lines.iter().map(|l| l.y).collect();
        assert_eq!(ys, vec![0, 10, 20]);
    }

    #[test]
    fn low_risk_bands_use_coarse_step() {
        let c = generate_candidates(200, 10, 5);
        assert_eq!(
            c.low_risk,
            vec![
                LowRiskCutBand { y_top: 50, y_bottom: 60 },
                LowRiskCutBand { y_top: 100, y_bottom: 110 },
                LowRiskCutBand { y_top: 150, y_bottom: 160 },
            ]
        );
    }

    #[test]
    fn low_risk_band_clipped_to_image() {
        let c = generate_candidates(55, 10, 5);
        assert_eq!(c.low_risk, vec![LowRiskCutBand { y_top: 50, y_bottom: 55 }]);
    }

    #[test]
    #[should_panic(expected = "image height must be positive")]
    fn zero_height_panics() {
        generate_candidates(0, 10, 5);
    }

    #[test]
    #[should_panic(expected = "candidate step must be positive")]
    fn zero_step_panics() {
        generate_candidates(100, 0, 5);
    }

    #[test]
    fn merge_keeps_strongest_per_y() {
        let grid = generate_candidates(30, 10, 5);
        let visual = CutCandidates {
            lines: vec![
                CandidateCutLine { y: 10, strength: 0.9, kind: CutKind::Edge },
                CandidateCutLine { y: 15, strength: 0.3, kind: CutKind::ColorShift },
            ],
            low_risk: vec![LowRiskCutBand { y_top: 12, y_bottom: 18 }],
        };
        let merged = merge_candidates(grid, visual);
        let ys: Vec<u32> = merged.lines.iter().map(|l| l.y).collect();
        assert_eq!(ys, vec![0, 10, 15, 20, 30]);
        assert_eq!(merged.lines[1].kind, CutKind::Edge);
        assert_eq!(merged.low_risk, vec![LowRiskCutBand { y_top: 12, y_bottom: 18 }]);
    }

    #[test]
    fn merge_joins_overlapping_low_risk() {
        let a = CutCandidates {
            lines: vec![],
            low_risk: vec![LowRiskCutBand { y_top: 10, y_bottom: 30 }],
        };
        let b = CutCandidates {
            lines: vec![],
            low_risk: vec![LowRiskCutBand { y_top: 30, y_bottom: 45 }],
        };
        assert_eq!(
            merge_candidates(a, b).low_risk,
            vec![LowRiskCutBand { y_top: 10, y_bottom: 45 }]
        );
    }

    #[test]
    fn nearest_prefers_later_on_tie() {
        assert_eq!(nearest_position(100, [85, 115]), Some(115));
        assert_eq!(nearest_position(100, [115, 85]), Some(115));
        assert_eq!(nearest_position(100, [85, 120]), Some(85));
        assert_eq!(nearest_position(100, []), None);
    }
}
