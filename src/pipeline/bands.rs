//! Forbidden bands: vertical ranges a slice boundary must never cut through.
//!
//! Each text block's vertical extent is padded by a small margin (anti-aliased
//! glyph edges and descenders bleed a few pixels past the OCR box) and the
//! padded intervals are merged with a single sweep after sorting.

use crate::pipeline::text::TextBlock;
use serde::{Deserialize, Serialize};

/// A vertical pixel interval that overlaps text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForbiddenBand {
    pub y_top: u32,
    pub y_bottom: u32,
}

impl ForbiddenBand {
    /// True when `y` lies strictly between the band edges. Cutting exactly on
    /// an edge is allowed.
    pub fn contains_strictly(&self, y: u32) -> bool {
        self.y_top < y && y < self.y_bottom
    }
}

/// Pad, sort and merge text extents into non-overlapping bands.
///
/// Intervals that merely touch (`next.y_top == current.y_bottom`) are merged,
/// so consecutive output bands always satisfy `y_top(i+1) > y_bottom(i)`.
pub fn build_forbidden_bands(blocks: &[TextBlock], padding: u32) -> Vec<ForbiddenBand> {
    let mut padded: Vec<ForbiddenBand> = blocks
        .iter()
        .map(|b| ForbiddenBand {
            y_top: b.y_top.saturating_sub(padding),
            y_bottom: b.y_bottom.saturating_add(padding),
        })
        .collect();
    padded.sort_unstable_by_key(|b| (b.y_top, b.y_bottom));

    let mut merged: Vec<ForbiddenBand> = Vec::with_capacity(padded.len());
    for band in padded {
        match merged.last_mut() {
            Some(current) if band.y_top <= current.y_bottom => {
                current.y_bottom = current.y_bottom.max(band.y_bottom);
            }
            _ => merged.push(band),
        }
    }
    merged
}

/// True when `y` is strictly inside any band.
pub fn is_forbidden(y: u32, bands: &[ForbiddenBand]) -> bool {
    bands.iter().any(|b| b.contains_strictly(y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(y_top: u32, y_bottom: u32) -> TextBlock {
        TextBlock::new("text", 0, y_top, 100, y_bottom)
    }

    #[test]
    fn empty_input_gives_no_bands() {
        assert!(build_forbidden_bands(&[], 4).is_empty());
    }

    #[test]
    fn single_block_is_padded() {
        let bands = build_forbidden_bands(&[block(100, 120)], 4);
        assert_eq!(bands, vec![ForbiddenBand { y_top: 96, y_bottom: 124 }]);
    }

    #[test]
    fn padding_clamps_at_zero() {
        let bands = build_forbidden_bands(&[block(2, 15)], 4);
        assert_eq!(bands[0].y_top, 0);
    }

    #[test]
    fn overlapping_and_touching_blocks_merge() {
        // 100..120 and 125..140 overlap once padded (96..124, 121..144);
        // 152..160 touches at 148 == 148.
        let bands = build_forbidden_bands(&[block(152, 160), block(100, 120), block(125, 140)], 4);
        assert_eq!(bands, vec![ForbiddenBand { y_top: 96, y_bottom: 164 }]);
    }

    #[test]
    fn separate_blocks_stay_separate_and_sorted() {
        let bands = build_forbidden_bands(&[block(300, 320), block(10, 30)], 4);
        assert_eq!(
            bands,
            vec![
                ForbiddenBand { y_top: 6, y_bottom: 34 },
                ForbiddenBand { y_top: 296, y_bottom: 324 },
            ]
        );
    }

    #[test]
    fn nested_block_does_not_shrink_band() {
        let bands = build_forbidden_bands(&[block(100, 200), block(120, 130)], 0);
        assert_eq!(bands, vec![ForbiddenBand { y_top: 100, y_bottom: 200 }]);
    }

    #[test]
    fn strict_containment() {
        let band = ForbiddenBand { y_top: 90, y_bottom: 110 };
        assert!(band.contains_strictly(100));
        assert!(!band.contains_strictly(90));
        assert!(!band.contains_strictly(110));
        assert!(is_forbidden(91, &[band]));
        assert!(!is_forbidden(200, &[band]));
    }
}
