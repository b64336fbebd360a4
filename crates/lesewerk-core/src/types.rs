// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types: word boxes, annotations, and reconciled page output.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::geometry::Rectangle;
use crate::space::PageCoordinateSpace;

/// Which source produced a word box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Provenance {
    /// Extracted from the PDF content stream. Exact.
    Vector,
    /// Recognised from a rasterized page image. Probabilistic.
    Ocr,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vector => f.write_str("vector"),
            Self::Ocr => f.write_str("ocr"),
        }
    }
}

/// A word with its bounding box, tagged with the frame it was produced in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordBox {
    pub text: String,
    pub rect: Rectangle,
    pub space: PageCoordinateSpace,
    pub provenance: Provenance,
    /// Recognition confidence in `[0, 1]`. Vector words carry `None`.
    pub confidence: Option<f32>,
}

impl WordBox {
    pub fn vector(text: impl Into<String>, rect: Rectangle, space: PageCoordinateSpace) -> Self {
        Self {
            text: text.into(),
            rect,
            space,
            provenance: Provenance::Vector,
            confidence: None,
        }
    }

    pub fn ocr(
        text: impl Into<String>,
        rect: Rectangle,
        space: PageCoordinateSpace,
        confidence: Option<f32>,
    ) -> Self {
        Self {
            text: text.into(),
            rect,
            space,
            provenance: Provenance::Ocr,
            confidence,
        }
    }
}

/// Identifier of an annotation within its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnnotationId {
    /// The annotation is an indirect object: `(object number, generation)`.
    Object(u32, u16),
    /// A direct dictionary inside `/Annots`: `(page, index in array)`.
    Inline { page: u32, index: usize },
}

impl std::fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Object(num, generation) => write!(f, "{num} {generation} R"),
            Self::Inline { page, index } => write!(f, "p{page}#{index}"),
        }
    }
}

/// Annotation subtypes Lesewerk distinguishes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnnotationKind {
    Highlight,
    Underline,
    StrikeOut,
    Squiggly,
    /// Sticky note (`/Text`).
    Text,
    FreeText,
    Link,
    /// Rectangle drawn over the page.
    Square,
    /// Oval drawn over the page.
    Circle,
    Ink,
    Stamp,
    Other(String),
}

impl AnnotationKind {
    /// Map a PDF `/Subtype` name.
    pub fn from_subtype(name: &str) -> Self {
        match name {
            "Highlight" => Self::Highlight,
            "Underline" => Self::Underline,
            "StrikeOut" => Self::StrikeOut,
            "Squiggly" => Self::Squiggly,
            "Text" => Self::Text,
            "FreeText" => Self::FreeText,
            "Link" => Self::Link,
            "Square" => Self::Square,
            "Circle" => Self::Circle,
            "Ink" => Self::Ink,
            "Stamp" => Self::Stamp,
            other => Self::Other(other.to_string()),
        }
    }

    /// Kinds that mark a region of text rather than a point or a link.
    pub fn marks_text(&self) -> bool {
        matches!(
            self,
            Self::Highlight
                | Self::Underline
                | Self::StrikeOut
                | Self::Squiggly
                | Self::Square
                | Self::Circle
        )
    }
}

/// One annotation read from a page's `/Annots` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub id: AnnotationId,
    /// 1-indexed page number.
    pub page: u32,
    pub kind: AnnotationKind,
    pub rect: Rectangle,
    pub space: PageCoordinateSpace,
    /// `/Contents`.
    pub contents: Option<String>,
    /// `/Subj`.
    pub subject: Option<String>,
    /// `/T`.
    pub author: Option<String>,
}

/// Stable reading-order key of a reconciled word.
///
/// Ordering compares line, then position within the line, then detection
/// order (vector before OCR, then input index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReadingOrder {
    pub line: usize,
    pub position: usize,
    pub source: Provenance,
    pub source_index: usize,
}

/// A word surviving reconciliation, expressed in the display frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledWord {
    pub word: WordBox,
    pub order: ReadingOrder,
}

impl ReconciledWord {
    pub fn text(&self) -> &str {
        &self.word.text
    }

    pub fn rect(&self) -> &Rectangle {
        &self.word.rect
    }

    pub fn provenance(&self) -> Provenance {
        self.word.provenance
    }
}

/// A word matched to an annotation together with its coverage score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedWord {
    /// Index into the page's reconciled word list.
    pub word_index: usize,
    /// Fraction of the word's area covered by the annotation.
    pub score: f64,
}

/// An annotation with the words it covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationMatch {
    pub annotation: AnnotationRecord,
    pub words: Vec<MatchedWord>,
    /// `true` when only the low-threshold fallback produced the match.
    pub weak: bool,
}

/// Word indices touched by a character span of a page's text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanWords {
    pub full: Vec<usize>,
    pub partial: Vec<usize>,
}

/// Everything Lesewerk knows about one page after reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledPage {
    /// 1-indexed page number.
    pub page: u32,
    /// The display frame all rectangles below are expressed in.
    pub space: PageCoordinateSpace,
    pub words: Vec<ReconciledWord>,
    pub annotations: Vec<AnnotationRecord>,
    pub matches: Vec<AnnotationMatch>,
    /// Whether the page was rasterized and OCRed.
    pub ocr_applied: bool,
}

impl ReconciledPage {
    /// Page text: words joined by spaces, lines by newlines.
    pub fn text(&self) -> String {
        let mut out = String::new();
        let mut current_line = None;
        for word in &self.words {
            match current_line {
                Some(line) if line == word.order.line => out.push(' '),
                Some(_) => out.push('\n'),
                None => {}
            }
            current_line = Some(word.order.line);
            out.push_str(word.text());
        }
        out
    }

    /// The plain word strings in reading order.
    pub fn word_texts(&self) -> Vec<&str> {
        self.words.iter().map(|w| w.text()).collect()
    }

    /// Which words a character span `[lo, hi)` of the space-joined word
    /// sequence covers fully and which only partially.
    pub fn words_in_char_span(&self, lo: usize, hi: usize) -> SpanWords {
        let mut span = SpanWords::default();
        let mut offset = 0;
        for (i, word) in self.words.iter().enumerate() {
            let len = word.text().chars().count();
            let (start, end) = (offset, offset + len);
            if lo <= start && hi >= end {
                span.full.push(i);
            } else if lo < end && hi > start {
                span.partial.push(i);
            }
            offset = end + 1;
        }
        span
    }
}

/// A run of neighbouring lines on one page (a paragraph or small block),
/// with the annotations whose words fall inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFlow {
    /// Position among all flows of the document, in reading order.
    pub index: usize,
    /// 1-indexed page number.
    pub page: u32,
    /// Index of the flow's first word in the page's word list.
    pub first_word: usize,
    pub words: Vec<String>,
    /// Annotation description to the flow-relative indices of its words.
    pub annotated: BTreeMap<String, Vec<usize>>,
}

/// Group annotation records by page, as written to JSON dumps.
pub fn group_by_page(records: &[AnnotationRecord]) -> BTreeMap<u32, Vec<AnnotationRecord>> {
    let mut grouped: BTreeMap<u32, Vec<AnnotationRecord>> = BTreeMap::new();
    for record in records {
        grouped.entry(record.page).or_default().push(record.clone());
    }
    grouped
}

/// Write records as pretty-printed JSON keyed by page number.
pub fn save_annotations_json(records: &[AnnotationRecord], path: impl AsRef<Path>) -> Result<()> {
    let data = serde_json::to_string_pretty(&group_by_page(records))?;
    std::fs::write(path.as_ref(), data)?;
    debug!(path = %path.as_ref().display(), annotations = records.len(), "annotations saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, line: usize, position: usize) -> ReconciledWord {
        ReconciledWord {
            word: WordBox::vector(
                text,
                Rectangle::new(0.0, 0.0, 1.0, 1.0),
                PageCoordinateSpace::display(100.0, 100.0),
            ),
            order: ReadingOrder {
                line,
                position,
                source: Provenance::Vector,
                source_index: position,
            },
        }
    }

    fn page(words: Vec<ReconciledWord>) -> ReconciledPage {
        ReconciledPage {
            page: 1,
            space: PageCoordinateSpace::display(100.0, 100.0),
            words,
            annotations: Vec::new(),
            matches: Vec::new(),
            ocr_applied: false,
        }
    }

    #[test]
    fn text_breaks_lines() {
        let p = page(vec![word("Hello", 0, 0), word("world", 0, 1), word("again", 1, 0)]);
        assert_eq!(p.text(), "Hello world\nagain");
    }

    #[test]
    fn char_span_full_and_partial() {
        // "Hello world again": Hello [0,5) world [6,11) again [12,17)
        let p = page(vec![word("Hello", 0, 0), word("world", 0, 1), word("again", 0, 2)]);
        let span = p.words_in_char_span(3, 11);
        assert_eq!(span.full, vec![1]);
        assert_eq!(span.partial, vec![0]);

        let none = p.words_in_char_span(5, 6);
        assert!(none.full.is_empty() && none.partial.is_empty());
    }

    #[test]
    fn subtype_mapping() {
        assert_eq!(AnnotationKind::from_subtype("Square"), AnnotationKind::Square);
        assert_eq!(
            AnnotationKind::from_subtype("Polygon"),
            AnnotationKind::Other("Polygon".into())
        );
        assert!(AnnotationKind::Highlight.marks_text());
        assert!(!AnnotationKind::Link.marks_text());
    }

    #[test]
    fn reading_order_compares_line_first() {
        let a = ReadingOrder {
            line: 0,
            position: 5,
            source: Provenance::Ocr,
            source_index: 9,
        };
        let b = ReadingOrder {
            line: 1,
            position: 0,
            source: Provenance::Vector,
            source_index: 0,
        };
        assert!(a < b);
    }

    #[test]
    fn annotations_group_by_page() {
        let record = |page| AnnotationRecord {
            id: AnnotationId::Inline { page, index: 0 },
            page,
            kind: AnnotationKind::Text,
            rect: Rectangle::new(0.0, 0.0, 1.0, 1.0),
            space: PageCoordinateSpace::display(10.0, 10.0),
            contents: None,
            subject: None,
            author: None,
        };
        let grouped = group_by_page(&[record(2), record(1), record(2)]);
        assert_eq!(grouped[&1].len(), 1);
        assert_eq!(grouped[&2].len(), 2);
    }

    #[test]
    fn annotation_dump_is_keyed_by_page() {
        let record = |page, contents: &str| AnnotationRecord {
            id: AnnotationId::Object(7 + page, 0),
            page,
            kind: AnnotationKind::Square,
            rect: Rectangle::new(10.0, 20.0, 30.0, 40.0),
            space: PageCoordinateSpace::display(612.0, 792.0),
            contents: Some(contents.into()),
            subject: None,
            author: Some("Reviewer".into()),
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotations.json");
        save_annotations_json(&[record(3, "late"), record(1, "early")], &path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let pages: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(pages, vec!["1", "3"]);
        assert_eq!(json["1"][0]["contents"], "early");
        assert_eq!(json["3"][0]["kind"], "Square");
    }
}
