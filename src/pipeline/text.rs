//! Text geometry extraction: OCR paragraphs → normalised [`TextBlock`]s.
//!
//! The OCR provider speaks the Google Vision `fullTextAnnotation` shape:
//! pages → blocks → paragraphs → words → symbols, each paragraph carrying a
//! bounding polygon in image pixels. Everything downstream only needs the
//! vertical extent of each paragraph plus its text, so this stage flattens
//! the tree into one axis-aligned box per paragraph.
//!
//! Vision omits a vertex coordinate entirely when it is zero, and happily
//! reports vertices slightly outside the image for text touching an edge.
//! Both quirks are absorbed here so later stages can trust the geometry.

use serde::{Deserialize, Serialize};

/// One OCR paragraph with its pixel bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    pub y_top: u32,
    pub y_bottom: u32,
    pub x_left: u32,
    pub x_right: u32,
    /// Provider confidence in `[0, 1]`.
    pub confidence: f32,
}

impl TextBlock {
    /// Create a block from two opposite corners; coordinates may be given in
    /// any order. Confidence defaults to 1.0.
    pub fn new(text: impl Into<String>, x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self {
            text: text.into(),
            y_top: y0.min(y1),
            y_bottom: y0.max(y1),
            x_left: x0.min(x1),
            x_right: x0.max(x1),
            confidence: 1.0,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = clamp_confidence(confidence);
        self
    }

    pub fn width(&self) -> u32 {
        self.x_right.saturating_sub(self.x_left)
    }

    pub fn height(&self) -> u32 {
        self.y_bottom.saturating_sub(self.y_top)
    }
}

// ── Vision annotation model ──────────────────────────────────────────────

/// `fullTextAnnotation` as returned by `DOCUMENT_TEXT_DETECTION`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAnnotation {
    #[serde(default)]
    pub pages: Vec<AnnotatedPage>,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedPage {
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub blocks: Vec<AnnotatedBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedBlock {
    #[serde(default)]
    pub paragraphs: Vec<AnnotatedParagraph>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedParagraph {
    #[serde(default)]
    pub bounding_box: Option<BoundingPoly>,
    #[serde(default)]
    pub words: Vec<AnnotatedWord>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedWord {
    #[serde(default)]
    pub symbols: Vec<AnnotatedSymbol>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedSymbol {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingPoly {
    #[serde(default)]
    pub vertices: Vec<Vertex>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    #[serde(default)]
    pub x: i64,
    #[serde(default)]
    pub y: i64,
}

// ── Extraction ───────────────────────────────────────────────────────────

/// Flatten an annotation into text blocks for an image of the given size.
///
/// Paragraphs without text or without a bounding polygon are dropped. Boxes
/// are clamped into `[0, width] × [0, height]` and the result is sorted
/// top-to-bottom, then left-to-right.
pub fn extract_text_blocks(annotation: &TextAnnotation, width: u32, height: u32) -> Vec<TextBlock> {
    let mut blocks: Vec<TextBlock> = annotation
        .pages
        .iter()
        .flat_map(|page| page.blocks.iter())
        .flat_map(|block| block.paragraphs.iter())
        .filter_map(|paragraph| paragraph_to_block(paragraph, width, height))
        .collect();

    blocks.sort_by(|a, b| (a.y_top, a.x_left).cmp(&(b.y_top, b.x_left)));
    blocks
}

fn paragraph_to_block(paragraph: &AnnotatedParagraph, width: u32, height: u32) -> Option<TextBlock> {
    let text = paragraph_text(paragraph);
    if text.is_empty() {
        return None;
    }

    let vertices = &paragraph.bounding_box.as_ref()?.vertices;
    let xs = vertices.iter().map(|v| clamp_coord(v.x, width));
    let ys = vertices.iter().map(|v| clamp_coord(v.y, height));
    let (x_left, x_right) = min_max(xs)?;
    let (y_top, y_bottom) = min_max(ys)?;

    Some(TextBlock {
        text,
        y_top,
        y_bottom,
        x_left,
        x_right,
        confidence: clamp_confidence(paragraph.confidence.unwrap_or(1.0)),
    })
}

/// Symbols are concatenated into words, words joined by single spaces.
fn paragraph_text(paragraph: &AnnotatedParagraph) -> String {
    paragraph
        .words
        .iter()
        .map(|w| w.symbols.iter().map(|s| s.text.as_str()).collect::<String>())
        .filter(|w| !w.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

fn clamp_coord(v: i64, max: u32) -> u32 {
    v.clamp(0, max as i64) as u32
}

fn clamp_confidence(c: f32) -> f32 {
    if c.is_nan() {
        0.0
    } else {
        c.clamp(0.0, 1.0)
    }
}

fn min_max(values: impl Iterator<Item = u32>) -> Option<(u32, u32)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(words: &[&str], vertices: &[(i64, i64)], confidence: Option<f32>) -> AnnotatedParagraph {
        AnnotatedParagraph {
            bounding_box: Some(BoundingPoly {
                vertices: vertices.iter().map(|&(x, y)| Vertex { x, y }).collect(),
            }),
            words: words
                .iter()
                .map(|w| AnnotatedWord {
                    symbols: w
                        .chars()
                        .map(|c| AnnotatedSymbol { text: c.to_string() })
                        .collect(),
                })
                .collect(),
            confidence,
        }
    }

    fn annotation(paragraphs: Vec<AnnotatedParagraph>) -> TextAnnotation {
        TextAnnotation {
            pages: vec![AnnotatedPage {
                width: 600,
                height: 1000,
                blocks: vec![AnnotatedBlock { paragraphs }],
            }],
            text: String::new(),
        }
    }

    #[test]
    fn text_block_new_normalises_corners() {
        let b = TextBlock::new("Sale", 300, 120, 100, 90);
        assert_eq!((b.x_left, b.y_top, b.x_right, b.y_bottom), (100, 90, 300, 120));
        assert_eq!(b.width(), 200);
        assert_eq!(b.height(), 30);
    }

    #[test]
    fn extracts_box_and_joins_words() {
        let ann = annotation(vec![paragraph(
            &["Free", "shipping"],
            &[(10, 40), (200, 40), (200, 62), (10, 62)],
            Some(0.97),
        )]);
        let blocks = extract_text_blocks(&ann, 600, 1000);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "Free shipping");
        assert_eq!((blocks[0].y_top, blocks[0].y_bottom), (40, 62));
        assert_eq!((blocks[0].x_left, blocks[0].x_right), (10, 200));
        assert!((blocks[0].confidence - 0.97).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_vertex_coordinates_are_zero() {
        let json = r#"{"pages":[{"blocks":[{"paragraphs":[{
            "boundingBox":{"vertices":[{"y":5},{"x":80,"y":5},{"x":80,"y":20},{"y":20}]},
            "words":[{"symbols":[{"text":"H"},{"text":"i"}]}]
        }]}]}]}"#;
        let ann: TextAnnotation = serde_json::from_str(json).unwrap();
        let blocks = extract_text_blocks(&ann, 600, 1000);
        assert_eq!(blocks[0].x_left, 0);
        assert_eq!(blocks[0].text, "Hi");
        assert_eq!(blocks[0].confidence, 1.0);
    }

    #[test]
    fn clamps_to_image_and_confidence_range() {
        let ann = annotation(vec![paragraph(
            &["Edge"],
            &[(-4, 990), (640, 990), (640, 1012), (-4, 1012)],
            Some(1.4),
        )]);
        let blocks = extract_text_blocks(&ann, 600, 1000);
        assert_eq!((blocks[0].x_left, blocks[0].x_right), (0, 600));
        assert_eq!(blocks[0].y_bottom, 1000);
        assert_eq!(blocks[0].confidence, 1.0);
    }

    #[test]
    fn drops_empty_and_boxless_paragraphs() {
        let mut boxless = paragraph(&["ghost"], &[], None);
        boxless.bounding_box = None;
        let ann = annotation(vec![
            paragraph(&[" "], &[(0, 0), (10, 10)], None),
            boxless,
            paragraph(&["kept"], &[(0, 0), (10, 10)], None),
        ]);
        let blocks = extract_text_blocks(&ann, 600, 1000);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "kept");
    }

    #[test]
    fn sorted_top_to_bottom() {
        let ann = annotation(vec![
            paragraph(&["footer"], &[(0, 900), (50, 920)], None),
            paragraph(&["right"], &[(300, 100), (350, 120)], None),
            paragraph(&["left"], &[(10, 100), (60, 120)], None),
        ]);
        let texts: Vec<_> = extract_text_blocks(&ann, 600, 1000)
            .into_iter()
            .map(|b| b.text)
            .collect();
        assert_eq!(texts, vec!["left", "right", "footer"]);
    }
}
