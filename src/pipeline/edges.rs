//! Visual cut detection from the decoded screenshot.
//!
//! Works on a per-row luminance profile rather than on 2-D edges: email
//! layouts are stacks of full-width sections, so the signal that matters is
//! how each pixel row differs from the one above it.
//!
//! - A run of near-uniform rows is background between sections. Its midpoint
//!   becomes a `whitespace` candidate and the whole run a low-risk band.
//! - A row whose mean luminance jumps relative to the previous row is a
//!   `colorShift` (e.g. a white section followed by a beige one).
//! - A row where most pixels change sharply is an `edge` (a divider line or
//!   the top of a full-width banner).
//!
//! The profile pass is CPU-bound; callers run it inside `spawn_blocking`.

use crate::config::VisualCutParams;
use crate::pipeline::candidates::{CandidateCutLine, CutCandidates, CutKind, LowRiskCutBand};
use image::DynamicImage;
use tracing::debug;

/// Statistics for one pixel row.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RowProfile {
    mean: f32,
    std_dev: f32,
    /// Fraction of pixels differing from the row above by more than the
    /// configured delta. Zero for the first row.
    changed: f32,
}

/// Detect visual candidates and low-risk bands in `img`.
pub fn detect_visual_cuts(img: &DynamicImage, params: &VisualCutParams) -> CutCandidates {
    let luma = img.to_luma8();
    let (width, height) = luma.dimensions();
    if width == 0 || height == 0 {
        return CutCandidates::default();
    }

    let profiles = row_profiles(&luma, params.edge_pixel_delta);
    let mut lines = Vec::new();
    let mut low_risk = Vec::new();

    // Uniform runs of one colour → whitespace midpoint + low-risk band.
    // `run` holds (start row, run colour); the sentinel row `height` closes
    // the last run.
    let mut run: Option<(u32, f32)> = None;
    for y in 0..=height {
        let row = profiles
            .get(y as usize)
            .filter(|p| p.std_dev <= params.uniform_tolerance);
        let continues = matches!(
            (row, run),
            (Some(p), Some((_, colour))) if (p.mean - colour).abs() <= params.uniform_tolerance
        );
        if continues {
            continue;
        }
        if let Some((start, _)) = run.take() {
            let len = y - start;
            if len >= params.min_uniform_run {
                lines.push(CandidateCutLine {
                    y: start + len / 2,
                    strength: (len as f32 / (2 * params.min_uniform_run.max(1)) as f32).min(1.0),
                    kind: CutKind::Whitespace,
                });
                low_risk.push(LowRiskCutBand {
                    y_top: start,
                    y_bottom: y,
                });
            }
        }
        run = row.map(|p| (y, p.mean));
    }

    // Row-to-row transitions.
    for y in 1..height {
        let prev = profiles[(y - 1) as usize];
        let cur = profiles[y as usize];
        let shift = (cur.mean - prev.mean).abs();
        if cur.changed >= params.edge_row_fraction {
            lines.push(CandidateCutLine {
                y,
                strength: cur.changed.min(1.0),
                kind: CutKind::Edge,
            });
        } else if shift >= params.color_shift_threshold {
            lines.push(CandidateCutLine {
                y,
                strength: (shift / 255.0).min(1.0),
                kind: CutKind::ColorShift,
            });
        }
    }

    lines.sort_by(|a, b| a.y.cmp(&b.y).then(b.strength.total_cmp(&a.strength)));
    lines.dedup_by_key(|l| l.y);

    debug!(
        "Visual cuts: {} lines, {} low-risk bands over {} rows",
        lines.len(),
        low_risk.len(),
        height
    );

    CutCandidates { lines, low_risk }
}

fn row_profiles(luma: &image::GrayImage, edge_pixel_delta: u8) -> Vec<RowProfile> {
    let (width, height) = luma.dimensions();
    let n = width as f32;
    let mut profiles = Vec::with_capacity(height as usize);

    for y in 0..height {
        let mut sum = 0f32;
        let mut sum_sq = 0f32;
        let mut changed = 0u32;
        for x in 0..width {
            let v = luma.get_pixel(x, y)[0];
            let f = v as f32;
            sum += f;
            sum_sq += f * f;
            if y > 0 && v.abs_diff(luma.get_pixel(x, y - 1)[0]) > edge_pixel_delta {
                changed += 1;
            }
        }
        let mean = sum / n;
        let variance = (sum_sq / n - mean * mean).max(0.0);
        profiles.push(RowProfile {
            mean,
            std_dev: variance.sqrt(),
            changed: changed as f32 / n,
        });
    }

    profiles
}
