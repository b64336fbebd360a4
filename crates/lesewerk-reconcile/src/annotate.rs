// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Match annotation rectangles to the reconciled words they cover.

use lesewerk_core::config::AnnotationMatchConfig;
use lesewerk_core::types::{AnnotationMatch, AnnotationRecord, MatchedWord, ReconciledWord};
use tracing::{debug, instrument, warn};

use crate::index::GridIndex;

/// Match every annotation of an enabled kind against `words`.
///
/// Annotations and words must already share one frame. A word's score is the
/// fraction of its own area covered by the annotation rectangle. Words scoring
/// above `match_threshold` match; when there are none, the single best word
/// above `minimal_threshold` is taken and the match is marked weak.
#[instrument(skip_all, fields(annotations = annotations.len(), words = words.len()))]
pub fn match_annotations(
    annotations: &[AnnotationRecord],
    words: &[ReconciledWord],
    config: &AnnotationMatchConfig,
) -> Vec<AnnotationMatch> {
    let cell = GridIndex::cell_size_for(words.iter().map(|w| w.rect()));
    let mut index = GridIndex::new(cell);
    for word in words {
        index.insert(*word.rect());
    }

    let mut matches = Vec::new();
    for annotation in annotations {
        if !config.kinds.contains(&annotation.kind) {
            continue;
        }

        let scored: Vec<MatchedWord> = index
            .intersecting(&annotation.rect)
            .into_iter()
            .map(|word_index| MatchedWord {
                word_index,
                score: annotation.rect.coverage_of(words[word_index].rect()),
            })
            .collect();

        let strong: Vec<MatchedWord> = scored
            .iter()
            .filter(|m| m.score > config.match_threshold)
            .cloned()
            .collect();

        let (matched, weak) = if !strong.is_empty() {
            (strong, false)
        } else {
            let best = scored
                .into_iter()
                .filter(|m| m.score > config.minimal_threshold)
                .fold(None::<MatchedWord>, |best, m| match best {
                    Some(b) if b.score >= m.score => Some(b),
                    _ => Some(m),
                });
            match best {
                Some(m) => {
                    warn!(
                        annotation = %annotation.id,
                        word = words[m.word_index].text(),
                        score = m.score,
                        "annotation matched only by fallback threshold"
                    );
                    (vec![m], true)
                }
                None => {
                    warn!(annotation = %annotation.id, page = annotation.page, "annotation covers no word");
                    (Vec::new(), false)
                }
            }
        };

        debug!(annotation = %annotation.id, words = matched.len(), weak, "annotation matched");
        matches.push(AnnotationMatch {
            annotation: annotation.clone(),
            words: matched,
            weak,
        });
    }
    matches
}

#[cfg(test)]
mod tests {
    use lesewerk_core::space::PageCoordinateSpace;
    use lesewerk_core::types::{
        AnnotationId, AnnotationKind, Provenance, ReadingOrder, WordBox,
    };
    use lesewerk_core::Rectangle;

    use super::*;

    fn page() -> PageCoordinateSpace {
        PageCoordinateSpace::display(612.0, 792.0)
    }

    fn words(rects: &[(f64, f64, f64, f64)]) -> Vec<ReconciledWord> {
        rects
            .iter()
            .enumerate()
            .map(|(i, r)| ReconciledWord {
                word: WordBox::vector(format!("w{i}"), Rectangle::new(r.0, r.1, r.2, r.3), page()),
                order: ReadingOrder {
                    line: 0,
                    position: i,
                    source: Provenance::Vector,
                    source_index: i,
                },
            })
            .collect()
    }

    fn annotation(kind: AnnotationKind, r: (f64, f64, f64, f64)) -> AnnotationRecord {
        AnnotationRecord {
            id: AnnotationId::Object(12, 0),
            page: 1,
            kind,
            rect: Rectangle::new(r.0, r.1, r.2, r.3),
            space: page(),
            contents: Some("check this".into()),
            subject: None,
            author: None,
        }
    }

    fn indices(m: &AnnotationMatch) -> Vec<usize> {
        m.words.iter().map(|w| w.word_index).collect()
    }

    #[test]
    fn covered_words_match() {
        let ws = words(&[
            (0.0, 0.0, 40.0, 10.0),
            (50.0, 0.0, 90.0, 10.0),
            (100.0, 0.0, 140.0, 10.0),
        ]);
        // Covers all of w1 and half of w0 and w2.
        let out = match_annotations(
            &[annotation(AnnotationKind::Square, (20.0, 0.0, 120.0, 10.0))],
            &ws,
            &AnnotationMatchConfig::default(),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(indices(&out[0]), vec![0, 1, 2]);
        assert!(!out[0].weak);
        assert_eq!(out[0].words[1].score, 1.0);
    }

    #[test]
    fn fallback_keeps_single_best_word() {
        let ws = words(&[(0.0, 0.0, 100.0, 10.0), (110.0, 0.0, 210.0, 10.0)]);
        // 30% of w0 and 25% of w1.
        let out = match_annotations(
            &[annotation(AnnotationKind::Highlight, (70.0, 0.0, 135.0, 10.0))],
            &ws,
            &AnnotationMatchConfig::default(),
        );
        assert_eq!(indices(&out[0]), vec![0]);
        assert!(out[0].weak);
    }

    #[test]
    fn barely_touching_annotation_matches_nothing() {
        let ws = words(&[(0.0, 0.0, 100.0, 10.0)]);
        let out = match_annotations(
            &[annotation(AnnotationKind::Circle, (90.0, 0.0, 200.0, 10.0))],
            &ws,
            &AnnotationMatchConfig::default(),
        );
        assert!(out[0].words.is_empty());
        assert!(!out[0].weak);
    }

    #[test]
    fn disabled_kinds_are_skipped() {
        let ws = words(&[(0.0, 0.0, 100.0, 10.0)]);
        let out = match_annotations(
            &[annotation(AnnotationKind::Link, (0.0, 0.0, 100.0, 10.0))],
            &ws,
            &AnnotationMatchConfig::default(),
        );
        assert!(out.is_empty());
    }
}
