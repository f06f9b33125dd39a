//! Boundary validation: repair an untrusted proposal into a slice partition.
//!
//! The proposal usually comes from a language model and is wrong in every
//! way one can imagine: unsorted, duplicated, negative, past the footer,
//! cutting straight through a headline, or so dense it would yield 3-pixel
//! slices. None of these is an error. Each step below applies one
//! deterministic repair and records it as a [`Repair`], so callers that care
//! can audit what changed without diffing input and output themselves.
//!
//! ## Step order
//!
//! 1. Sort and deduplicate.
//! 2. Ensure the list starts at 0.
//! 3. Drop anything past the footer; ensure the list ends at the footer.
//! 4. Drop anything outside `[0, footer]`.
//! 5. Snap boundaries strictly inside a forbidden band to the nearest safe
//!    candidate line, then to the nearest safe point of a low-risk band;
//!    drop the boundary when neither exists. The endpoints 0 and footer are
//!    fixed and never snapped.
//! 6. Sort and deduplicate again.
//! 7. Greedily drop interior boundaries closer than the minimum height to
//!    the last accepted one.
//! 8. Close the partition at the footer, folding a too-short final slice
//!    into its neighbour.
//! 9. Turn consecutive boundaries into slices.

use crate::pipeline::bands::{is_forbidden, ForbiddenBand};
use crate::pipeline::candidates::{nearest_position, CandidateCutLine, LowRiskCutBand};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One horizontal region of the screenshot, `[y_top, y_bottom)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slice {
    pub y_top: u32,
    pub y_bottom: u32,
}

impl Slice {
    pub fn height(&self) -> u32 {
        self.y_bottom - self.y_top
    }
}

/// One change made to the raw proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Repair {
    DuplicateRemoved { y: i64 },
    ZeroInserted,
    BeyondFooterDropped { y: i64 },
    FooterAppended,
    OutOfRangeDropped { y: i64 },
    SnappedToCandidate { from: u32, to: u32 },
    SnappedToLowRiskBand { from: u32, to: u32 },
    UnsnappableDropped { y: u32 },
    TooCloseDropped { y: u32 },
    ShortFinalSliceMerged { y: u32 },
}

/// Validated slice partition of `[0, footer_start_y]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceLayout {
    pub footer_start_y: u32,
    pub slices: Vec<Slice>,
    /// Repairs applied to the raw proposal, in the order they happened.
    #[serde(default)]
    pub repairs: Vec<Repair>,
}

impl SliceLayout {
    /// The boundary list `[0, b1, …, footer_start_y]` behind the slices.
    /// Empty when there are no slices.
    pub fn boundaries(&self) -> Vec<u32> {
        let mut out: Vec<u32> = self.slices.iter().map(|s| s.y_top).collect();
        if let Some(last) = self.slices.last() {
            out.push(last.y_bottom);
        }
        out
    }
}

/// Repair `raw` into a lawful slice layout ending at `footer_start_y`.
///
/// Deterministic and infallible. On an exact tie between two snapping
/// targets the later (larger) y wins.
pub fn validate_boundaries(
    raw: &[i64],
    footer_start_y: u32,
    bands: &[ForbiddenBand],
    candidates: &[CandidateCutLine],
    low_risk: &[LowRiskCutBand],
    min_slice_height: u32,
) -> SliceLayout {
    let mut repairs = Vec::new();
    let footer = i64::from(footer_start_y);

    // ── 1. Sort + dedup ─────────────────────────────────────────────────
    let mut sorted = raw.to_vec();
    sorted.sort_unstable();
    let mut proposal: Vec<i64> = Vec::with_capacity(sorted.len() + 2);
    for y in sorted {
        if proposal.last() == Some(&y) {
            repairs.push(Repair::DuplicateRemoved { y });
        } else {
            proposal.push(y);
        }
    }

    // ── 2. Leading zero ─────────────────────────────────────────────────
    if proposal.binary_search(&0).is_err() {
        let at = proposal.partition_point(|&y| y < 0);
        proposal.insert(at, 0);
        repairs.push(Repair::ZeroInserted);
    }

    // ── 3. Trailing footer ──────────────────────────────────────────────
    proposal.retain(|&y| {
        let keep = y <= footer;
        if !keep {
            repairs.push(Repair::BeyondFooterDropped { y });
        }
        keep
    });
    if proposal.last() != Some(&footer) {
        proposal.push(footer);
        repairs.push(Repair::FooterAppended);
    }

    // ── 4. Range ────────────────────────────────────────────────────────
    let mut boundaries: Vec<u32> = Vec::with_capacity(proposal.len());
    for y in proposal {
        match u32::try_from(y) {
            Ok(v) if v <= footer_start_y => boundaries.push(v),
            _ => repairs.push(Repair::OutOfRangeDropped { y }),
        }
    }

    // ── 5. Snap out of forbidden bands ──────────────────────────────────
    let mut snapped: Vec<u32> = Vec::with_capacity(boundaries.len());
    for y in boundaries {
        if y == 0 || y == footer_start_y || !is_forbidden(y, bands) {
            snapped.push(y);
            continue;
        }
        if let Some(to) = snap_to_candidate(y, footer_start_y, bands, candidates) {
            repairs.push(Repair::SnappedToCandidate { from: y, to });
            snapped.push(to);
        } else if let Some(to) = snap_to_low_risk(y, footer_start_y, bands, low_risk) {
            repairs.push(Repair::SnappedToLowRiskBand { from: y, to });
            snapped.push(to);
        } else {
            repairs.push(Repair::UnsnappableDropped { y });
        }
    }

    // ── 6. Sort + dedup ─────────────────────────────────────────────────
    snapped.sort_unstable();
    snapped.dedup();

    // ── 7. Minimum height ───────────────────────────────────────────────
    let mut accepted: Vec<u32> = vec![0];
    for &y in snapped.iter().filter(|&&y| y > 0 && y < footer_start_y) {
        let last = accepted[accepted.len() - 1];
        if y - last >= min_slice_height {
            accepted.push(y);
        } else {
            repairs.push(Repair::TooCloseDropped { y });
        }
    }

    // ── 8. Close at footer ──────────────────────────────────────────────
    if footer_start_y > 0 {
        let last = accepted[accepted.len() - 1];
        if accepted.len() > 1 && footer_start_y - last < min_slice_height {
            accepted.pop();
            repairs.push(Repair::ShortFinalSliceMerged { y: last });
        }
        accepted.push(footer_start_y);
    }

    // ── 9. Slices ───────────────────────────────────────────────────────
    let slices: Vec<Slice> = accepted
        .windows(2)
        .map(|w| Slice {
            y_top: w[0],
            y_bottom: w[1],
        })
        .collect();

    for repair in &repairs {
        debug!("Boundary repair: {:?}", repair);
    }
    debug!(
        "Validated {} raw boundaries → {} slices ({} repairs)",
        raw.len(),
        slices.len(),
        repairs.len()
    );

    SliceLayout {
        footer_start_y,
        slices,
        repairs,
    }
}

fn snap_to_candidate(
    y: u32,
    footer_start_y: u32,
    bands: &[ForbiddenBand],
    candidates: &[CandidateCutLine],
) -> Option<u32> {
    nearest_position(
        y,
        candidates
            .iter()
            .map(|c| c.y)
            .filter(|&c| c <= footer_start_y && !is_forbidden(c, bands)),
    )
}

/// Nearest safe point of any low-risk band: the clamp of `y` into the band,
/// or either band edge when the clamp itself is forbidden.
fn snap_to_low_risk(
    y: u32,
    footer_start_y: u32,
    bands: &[ForbiddenBand],
    low_risk: &[LowRiskCutBand],
) -> Option<u32> {
    let points = low_risk
        .iter()
        .filter(|b| b.y_top <= footer_start_y)
        .flat_map(|b| {
            let bottom = b.y_bottom.min(footer_start_y);
            [y.clamp(b.y_top, bottom.max(b.y_top)), b.y_top, bottom]
        })
        .filter(|&p| !is_forbidden(p, bands));
    nearest_position(y, points)
}
