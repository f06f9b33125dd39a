//! Footer detection: where the legal / unsubscribe block of an email begins.
//!
//! Marketing footers are recognisable by a small, brand-agnostic vocabulary
//! (unsubscribe, privacy policy, ©, a postal address) and by dense runs of
//! small print. Only the bottom of the screenshot is searched so that a
//! "Shop now" button in the hero section does not drag the footer upwards.
//!
//! The pattern list is English-only.

use crate::config::FooterRules;
use crate::pipeline::candidates::{nearest_position, CandidateCutLine};
use crate::pipeline::text::TextBlock;
use once_cell::sync::Lazy;
use regex::RegexSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How much evidence backs a footer detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FooterConfidence {
    High,
    Medium,
    Low,
}

/// Result of [`detect_footer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FooterDetection {
    /// Footer start after snapping to a candidate line.
    pub start_y: u32,
    /// Footer start before snapping.
    pub raw_start_y: u32,
    pub confidence: FooterConfidence,
    /// Blocks matching at least one footer pattern.
    pub matched_blocks: usize,
    /// Whether the dense small-text heuristic fired.
    pub dense_small_text: bool,
}

static FOOTER_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)unsubscribe",
        r"(?i)\bprivacy\s+policy\b",
        r"(?i)\bterms\s+(?:of\s+(?:service|use)|(?:&|and)\s+conditions)\b",
        r"(?i)\bfaqs?\b",
        r"(?i)\bcontact\s+us\b",
        r"(?i)\bcustomer\s+(?:service|care|support)\b",
        r"(?i)\bshop\b",
        r"(?i)\bour\s+story\b",
        r"(?i)\bfollow\s+us\b",
        r"(?i)\bcopyright\b|©|\(c\)",
        r"(?i)\ball\s+rights\s+reserved\b",
        r"(?i)statements?\s+(?:have|has)\s+not\s+been\s+evaluated",
        r"(?i)not\s+intended\s+to\s+diagnose",
        r"\b\d{5}(?:-\d{4})?\b",
        r"\b[A-Z]{2}\s*\d{5}\b",
    ])
    .unwrap()
});

/// True when `text` contains any footer indicator.
pub fn is_footer_text(text: &str) -> bool {
    FOOTER_PATTERNS.is_match(text)
}

/// Locate the footer start in a screenshot of `image_height` pixels.
///
/// The earliest matching block in the bottom region wins; dense small print
/// counts as one additional match and may move the start further up. With no
/// evidence the footer is assumed to occupy the last
/// `1 - rules.fallback_ratio` of the image. The result is snapped to the
/// nearest candidate line (ties go to the later line).
///
/// # Panics
/// When `image_height` is zero.
pub fn detect_footer(
    blocks: &[TextBlock],
    image_height: u32,
    candidates: &[CandidateCutLine],
    rules: &FooterRules,
) -> FooterDetection {
    assert!(image_height > 0, "image height must be positive");

    let region_top = rules.bottom_region_ratio * image_height as f64;
    let bottom: Vec<&TextBlock> = blocks
        .iter()
        .filter(|b| b.y_top as f64 >= region_top)
        .collect();

    let mut earliest: Option<u32> = None;
    let mut matches = 0usize;
    for block in bottom.iter().filter(|b| is_footer_text(&b.text)) {
        matches += 1;
        earliest = Some(earliest.map_or(block.y_top, |y| y.min(block.y_top)));
    }

    let small_print: Vec<u32> = bottom
        .iter()
        .filter(|b| {
            b.height() < rules.small_text_max_height
                && b.text.chars().count() > rules.small_text_min_chars
        })
        .map(|b| b.y_top)
        .collect();
    let dense_small_text = small_print.len() >= rules.dense_text_min_blocks;
    if dense_small_text {
        matches += 1;
        if let Some(&first) = small_print.iter().min() {
            earliest = Some(earliest.map_or(first, |y| y.min(first)));
        }
    }

    let confidence = if matches >= rules.high_confidence_matches {
        FooterConfidence::High
    } else if matches >= 1 {
        FooterConfidence::Medium
    } else {
        FooterConfidence::Low
    };

    let raw_start_y = match (confidence, earliest) {
        (FooterConfidence::Low, _) | (_, None) => {
            (rules.fallback_ratio * image_height as f64).floor() as u32
        }
        (_, Some(y)) => y,
    };
    let start_y = nearest_position(raw_start_y, candidates.iter().map(|c| c.y)).unwrap_or(raw_start_y);

    debug!(
        "Footer: start {} (raw {}), {} matches, confidence {:?}",
        start_y, raw_start_y, matches, confidence
    );

    FooterDetection {
        start_y,
        raw_start_y,
        confidence,
        matched_blocks: matches - usize::from(dense_small_text),
        dense_small_text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::candidates::generate_candidates;

    fn block(text: &str, y_top: u32, height: u32) -> TextBlock {
        TextBlock::new(text, 20, y_top, 580, y_top + height)
    }

    #[test]
    fn patterns_match_common_footer_lines() {
        for text in [
            "Unsubscribe here",
            "Read our Privacy Policy",
            "Terms & Conditions",
            "Terms of Service",
            "FAQ",
            "Contact Us",
            "Customer Service",
            "SHOP",
            "Our Story",
            "Follow us on Instagram",
            "© 2024 Brand Inc.",
            "Copyright 2024",
            "All rights reserved.",
            "These statements have not been evaluated by the Food and Drug Administration.",
            "123 Main St, Springfield, IL 62704",
            "Austin, TX 78701-1234",
        ] {
            assert!(is_footer_text(text), "expected footer match: {text:?}");
        }
    }

    #[test]
    fn patterns_ignore_hero_copy() {
        for text in ["New arrivals are here", "Shopping for summer?", "50% off everything"] {
            assert!(!is_footer_text(text), "unexpected footer match: {text:?}");
        }
    }

    #[test]
    fn single_match_is_medium_confidence() {
        let blocks = vec![block("Big summer sale", 100, 40), block("Unsubscribe here", 950, 20)];
        let d = detect_footer(&blocks, 1000, &[], &FooterRules::default());
        assert_eq!(d.raw_start_y, 950);
        assert_eq!(d.start_y, 950);
        assert_eq!(d.confidence, FooterConfidence::Medium);
        assert_eq!(d.matched_blocks, 1);
    }

    #[test]
    fn three_matches_is_high_confidence_and_earliest_wins() {
        let blocks = vec![
            block("Follow us", 820, 20),
            block("Privacy Policy | Unsubscribe", 900, 20),
            block("© 2024 Brand", 940, 20),
        ];
        let d = detect_footer(&blocks, 1000, &[], &FooterRules::default());
        assert_eq!(d.confidence, FooterConfidence::High);
        assert_eq!(d.raw_start_y, 820);
    }

    #[test]
    fn matches_above_bottom_region_are_ignored() {
        let blocks = vec![block("Shop the collection", 300, 40)];
        let d = detect_footer(&blocks, 1000, &[], &FooterRules::default());
        assert_eq!(d.confidence, FooterConfidence::Low);
        assert_eq!(d.raw_start_y, 950);
    }

    #[test]
    fn no_evidence_falls_back_to_last_five_percent() {
        let d = detect_footer(&[], 1234, &[], &FooterRules::default());
        assert_eq!(d.confidence, FooterConfidence::Low);
        assert_eq!(d.raw_start_y, 1172); // floor(0.95 * 1234)
        assert!(!d.dense_small_text);
    }

    #[test]
    fn dense_small_print_moves_start_up() {
        let blocks = vec![
            block("Questions? Reach our team any time.", 700, 14),
            block("You received this email because you opted in.", 720, 14),
            block("Prices valid while supplies last.", 740, 14),
            block("Unsubscribe", 800, 14),
        ];
        let d = detect_footer(&blocks, 1000, &[], &FooterRules::default());
        assert!(d.dense_small_text);
        assert_eq!(d.raw_start_y, 700);
        assert_eq!(d.matched_blocks, 1);
        assert_eq!(d.confidence, FooterConfidence::Medium);
    }

    #[test]
    fn dense_small_print_alone_is_medium() {
        let blocks = vec![
            block("Questions? Reach our team any time.", 700, 14),
            block("You received this email because you opted in.", 720, 14),
            block("Prices valid while supplies last.", 740, 14),
        ];
        let d = detect_footer(&blocks, 1000, &[], &FooterRules::default());
        assert_eq!(d.confidence, FooterConfidence::Medium);
        assert_eq!(d.raw_start_y, 700);
    }

    #[test]
    fn start_is_snapped_to_nearest_candidate() {
        let blocks = vec![block("Unsubscribe", 953, 14)];
        let grid = generate_candidates(1000, 10, 5);
        let d = detect_footer(&blocks, 1000, &grid.lines, &FooterRules::default());
        assert_eq!(d.raw_start_y, 953);
        assert_eq!(d.start_y, 950);
    }

    #[test]
    fn snapping_tie_goes_to_later_line() {
        let blocks = vec![block("Unsubscribe", 955, 14)];
        let grid = generate_candidates(1000, 10, 5);
        let d = detect_footer(&blocks, 1000, &grid.lines, &FooterRules::default());
        assert_eq!(d.start_y, 960);
    }
}
