// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Position reconciler: merge vector and OCR word boxes of one page into a
// single de-duplicated list in reading order.
//
// Vector text is exact and always wins over OCR text covering the same spot.
// OCR boxes survive only where the vector layer has nothing, which is how
// image-only regions make it into the output.

use lesewerk_core::config::{OverlapMetric, ReconcileConfig};
use lesewerk_core::error::ReconcileError;
use lesewerk_core::types::{Provenance, ReconciledWord, WordBox};
use lesewerk_core::Rectangle;
use tracing::{debug, instrument, warn};

use crate::frame::DisplayFrame;
use crate::index::GridIndex;
use crate::order::{Placement, reading_order};

/// Overlap ratio of two boxes under `metric`. Zero for zero-area boxes.
pub fn overlap_ratio(a: &Rectangle, b: &Rectangle, metric: OverlapMetric) -> f64 {
    match metric {
        OverlapMetric::IntersectionOverSmaller => a.intersection_over_smaller(b),
        OverlapMetric::IntersectionOverUnion => a.iou(b),
    }
}

/// Reconcile one page's vector and OCR words with `config`.
pub fn reconcile(
    vector: &[WordBox],
    ocr: &[WordBox],
    config: &ReconcileConfig,
) -> Result<Vec<ReconciledWord>, ReconcileError> {
    Reconciler::new(config.clone()).reconcile(vector, ocr)
}

fn validate(words: &[WordBox], provenance: Provenance) -> Result<(), ReconcileError> {
    for (index, word) in words.iter().enumerate() {
        word.rect
            .validate()
            .map_err(|reason| ReconcileError::InvalidGeometry {
                provenance,
                index,
                reason,
            })?;
    }
    Ok(())
}

/// Stateless reconciler holding its settings. Safe to share between threads.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    fn threshold(&self) -> f64 {
        let t = self.config.overlap_threshold;
        if (0.0..=1.0).contains(&t) {
            return t;
        }
        let fallback = if t.is_nan() {
            ReconcileConfig::default().overlap_threshold
        } else {
            t.clamp(0.0, 1.0)
        };
        warn!(threshold = t, used = fallback, "overlap threshold outside [0, 1]");
        fallback
    }

    /// Reconcile in the frame of the first vector word (or the first OCR word
    /// when there is no vector text).
    pub fn reconcile(
        &self,
        vector: &[WordBox],
        ocr: &[WordBox],
    ) -> Result<Vec<ReconciledWord>, ReconcileError> {
        let Some(reference) = vector.first().or(ocr.first()).map(|w| w.space) else {
            return Ok(Vec::new());
        };
        let frame = DisplayFrame::for_reference(&reference, self.config.size_tolerance);
        self.reconcile_in(&frame, vector, ocr)
    }

    /// Reconcile with every box normalized into `frame`.
    #[instrument(skip_all, fields(vector = vector.len(), ocr = ocr.len()))]
    pub fn reconcile_in(
        &self,
        frame: &DisplayFrame,
        vector: &[WordBox],
        ocr: &[WordBox],
    ) -> Result<Vec<ReconciledWord>, ReconcileError> {
        validate(vector, Provenance::Vector)?;
        validate(ocr, Provenance::Ocr)?;

        let vector = normalize_all(frame, vector, Provenance::Vector)?;
        let ocr = normalize_all(frame, ocr, Provenance::Ocr)?;
        let threshold = self.threshold();
        let metric = self.config.overlap_metric;

        let first_overlap = |index: &GridIndex, rect: &Rectangle| {
            index.intersecting(rect).into_iter().find(|&id| {
                index
                    .get(id)
                    .is_some_and(|other| overlap_ratio(rect, other, metric) >= threshold)
            })
        };

        let cell = GridIndex::cell_size_for(vector.iter().chain(&ocr).map(|w| &w.rect));

        // Vector boxes duplicating an earlier vector box collapse to the first.
        let mut vector_index = GridIndex::new(cell);
        let mut kept_vector: Vec<usize> = Vec::with_capacity(vector.len());
        for (i, word) in vector.iter().enumerate() {
            if let Some(id) = first_overlap(&vector_index, &word.rect) {
                debug!(index = i, duplicate_of = kept_vector[id], text = %word.text, "vector word collapsed");
                continue;
            }
            vector_index.insert(word.rect);
            kept_vector.push(i);
        }

        // OCR boxes covered by vector text are dropped.
        let mut candidates: Vec<usize> = Vec::with_capacity(ocr.len());
        let mut covered = 0usize;
        for (i, word) in ocr.iter().enumerate() {
            if first_overlap(&vector_index, &word.rect).is_some() {
                covered += 1;
                continue;
            }
            candidates.push(i);
        }

        // OCR duplicates: highest confidence first when every box has one.
        let confident = ocr
            .iter()
            .all(|w| w.confidence.is_some_and(|c| c.is_finite()));
        if confident {
            let conf = |i: usize| ocr[i].confidence.unwrap_or(0.0);
            candidates.sort_by(|&a, &b| conf(b).total_cmp(&conf(a)).then(a.cmp(&b)));
        }

        let mut ocr_index = GridIndex::new(cell);
        let mut kept_ocr: Vec<usize> = Vec::with_capacity(candidates.len());
        for i in candidates {
            if let Some(id) = first_overlap(&ocr_index, &ocr[i].rect) {
                debug!(index = i, duplicate_of = kept_ocr[id], text = %ocr[i].text, "ocr word collapsed");
                continue;
            }
            ocr_index.insert(ocr[i].rect);
            kept_ocr.push(i);
        }
        kept_ocr.sort_unstable();

        let placements: Vec<Placement> = kept_vector
            .iter()
            .map(|&i| (Provenance::Vector, i, &vector[i]))
            .chain(kept_ocr.iter().map(|&i| (Provenance::Ocr, i, &ocr[i])))
            .map(|(source, source_index, word)| Placement {
                rect: word.rect,
                source,
                source_index,
            })
            .collect();
        let keys = reading_order(&placements);

        let mut words: Vec<ReconciledWord> = placements
            .iter()
            .zip(keys)
            .map(|(p, order)| {
                let word = match p.source {
                    Provenance::Vector => &vector[p.source_index],
                    Provenance::Ocr => &ocr[p.source_index],
                };
                ReconciledWord {
                    word: word.clone(),
                    order,
                }
            })
            .collect();
        words.sort_by_key(|w| w.order);

        debug!(
            kept_vector = kept_vector.len(),
            kept_ocr = kept_ocr.len(),
            ocr_covered = covered,
            "page reconciled"
        );
        Ok(words)
    }
}

fn normalize_all(
    frame: &DisplayFrame,
    words: &[WordBox],
    provenance: Provenance,
) -> Result<Vec<WordBox>, ReconcileError> {
    words
        .iter()
        .map(|w| {
            let normalized = frame.normalize_word(w)?;
            Ok(WordBox {
                provenance,
                ..normalized
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use lesewerk_core::space::{PageCoordinateSpace, Rotation};

    use super::*;

    fn page() -> PageCoordinateSpace {
        PageCoordinateSpace::display(612.0, 792.0)
    }

    fn vector(text: &str, r: (f64, f64, f64, f64)) -> WordBox {
        WordBox::vector(text, Rectangle::new(r.0, r.1, r.2, r.3), page())
    }

    fn ocr(text: &str, r: (f64, f64, f64, f64), confidence: Option<f32>) -> WordBox {
        WordBox::ocr(text, Rectangle::new(r.0, r.1, r.2, r.3), page(), confidence)
    }

    fn summary(words: &[ReconciledWord]) -> Vec<(&str, Rectangle, Provenance)> {
        words
            .iter()
            .map(|w| (w.text(), *w.rect(), w.provenance()))
            .collect()
    }

    #[test]
    fn vector_wins_over_overlapping_ocr() {
        let out = reconcile(
            &[vector("Hello", (0.0, 0.0, 50.0, 10.0))],
            &[ocr("Hello", (2.0, 1.0, 52.0, 11.0), None)],
            &ReconcileConfig::with_threshold(0.5),
        )
        .unwrap();
        assert_eq!(
            summary(&out),
            vec![("Hello", Rectangle::new(0.0, 0.0, 50.0, 10.0), Provenance::Vector)]
        );
    }

    #[test]
    fn image_only_page_keeps_ocr() {
        let out = reconcile(
            &[],
            &[ocr("Scanned", (0.0, 0.0, 80.0, 12.0), Some(0.8))],
            &ReconcileConfig::default(),
        )
        .unwrap();
        assert_eq!(
            summary(&out),
            vec![("Scanned", Rectangle::new(0.0, 0.0, 80.0, 12.0), Provenance::Ocr)]
        );
    }

    #[test]
    fn highest_confidence_ocr_duplicate_survives() {
        let out = reconcile(
            &[],
            &[
                ocr("Helo", (0.0, 0.0, 100.0, 10.0), Some(0.4)),
                ocr("Hello", (10.0, 0.0, 110.0, 10.0), Some(0.9)),
            ],
            &ReconcileConfig::default(),
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text(), "Hello");
        assert_eq!(out[0].word.confidence, Some(0.9));
    }

    #[test]
    fn missing_confidence_keeps_first_seen() {
        let out = reconcile(
            &[],
            &[
                ocr("first", (0.0, 0.0, 100.0, 10.0), None),
                ocr("second", (10.0, 0.0, 110.0, 10.0), Some(0.9)),
            ],
            &ReconcileConfig::default(),
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text(), "first");
    }

    #[test]
    fn both_empty_gives_empty() {
        assert!(reconcile(&[], &[], &ReconcileConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn empty_ocr_keeps_vector_in_reading_order() {
        let out = reconcile(
            &[
                vector("world", (60.0, 0.0, 110.0, 10.0)),
                vector("second", (0.0, 20.0, 60.0, 30.0)),
                vector("Hello", (0.0, 0.0, 50.0, 10.0)),
            ],
            &[],
            &ReconcileConfig::default(),
        )
        .unwrap();
        let texts: Vec<&str> = out.iter().map(|w| w.text()).collect();
        assert_eq!(texts, vec!["Hello", "world", "second"]);
        assert_eq!(out[0].order.line, 0);
        assert_eq!(out[2].order.line, 1);
    }

    #[test]
    fn threshold_is_inclusive() {
        // Intersection 25 of a 50-unit smaller box: ratio exactly 0.5.
        let v = [vector("a", (0.0, 0.0, 10.0, 10.0))];
        let o_half = [ocr("b", (5.0, 5.0, 15.0, 10.0), None)];
        assert_eq!(reconcile(&v, &o_half, &ReconcileConfig::with_threshold(0.5)).unwrap().len(), 1);
        assert_eq!(reconcile(&v, &o_half, &ReconcileConfig::with_threshold(0.6)).unwrap().len(), 2);
    }

    #[test]
    fn metric_is_configurable() {
        // Small OCR box fully inside a long vector box.
        let v = [vector("headline", (0.0, 0.0, 200.0, 20.0))];
        let o = [ocr("head", (0.0, 0.0, 50.0, 20.0), None)];
        let smaller = ReconcileConfig::default();
        let union = ReconcileConfig {
            overlap_metric: OverlapMetric::IntersectionOverUnion,
            ..ReconcileConfig::default()
        };
        assert_eq!(reconcile(&v, &o, &smaller).unwrap().len(), 1);
        assert_eq!(reconcile(&v, &o, &union).unwrap().len(), 2);
    }

    #[test]
    fn duplicate_vector_runs_collapse_to_first() {
        let out = reconcile(
            &[
                vector("Bold", (0.0, 0.0, 40.0, 10.0)),
                vector("Bold", (0.5, 0.0, 40.5, 10.0)),
            ],
            &[],
            &ReconcileConfig::default(),
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].order.source_index, 0);
    }

    #[test]
    fn malformed_box_is_rejected() {
        let err = reconcile(
            &[vector("ok", (0.0, 0.0, 1.0, 1.0))],
            &[ocr("bad", (5.0, 0.0, 1.0, 1.0), None)],
            &ReconcileConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::InvalidGeometry {
                provenance: Provenance::Ocr,
                index: 0,
                ..
            }
        ));

        let negative = reconcile(
            &[vector("neg", (-1.0, 0.0, 1.0, 1.0))],
            &[],
            &ReconcileConfig::default(),
        );
        assert!(matches!(
            negative,
            Err(ReconcileError::InvalidGeometry {
                provenance: Provenance::Vector,
                ..
            })
        ));
    }

    #[test]
    fn incompatible_frames_are_rejected() {
        let pixels = PageCoordinateSpace::image(2000, 1000, None);
        let err = reconcile(
            &[vector("a", (0.0, 0.0, 10.0, 10.0))],
            &[WordBox::ocr("b", Rectangle::new(0.0, 0.0, 10.0, 10.0), pixels, None)],
            &ReconcileConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ReconcileError::CoordinateSpaceMismatch(_)));
    }

    #[test]
    fn pixel_ocr_is_scaled_before_comparison() {
        // 300 dpi raster of the same page: OCR coordinates are 300/72 larger.
        let raster = PageCoordinateSpace::image(2550, 3300, Some(300.0));
        let k = 300.0 / 72.0;
        let out = reconcile(
            &[vector("Hello", (72.0, 72.0, 122.0, 84.0))],
            &[WordBox::ocr(
                "Hello",
                Rectangle::new(72.0 * k, 72.0 * k, 122.0 * k, 84.0 * k),
                raster,
                Some(0.95),
            )],
            &ReconcileConfig::default(),
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].provenance(), Provenance::Vector);
    }

    #[test]
    fn rotated_page_is_normalized_before_comparison() {
        let rotated = PageCoordinateSpace::pdf_user_space(612.0, 792.0, Rotation::Clockwise90);
        let word = WordBox::vector("Sideways", Rectangle::new(72.0, 700.0, 144.0, 712.0), rotated);
        // Upright 72 dpi raster of the rotated page: 792 x 612 pixels.
        let raster = PageCoordinateSpace::image(792, 612, Some(72.0));
        let seen = WordBox::ocr("Sideways", Rectangle::new(701.0, 73.0, 713.0, 145.0), raster, None);

        let out = reconcile(
            std::slice::from_ref(&word),
            std::slice::from_ref(&seen),
            &ReconcileConfig::default(),
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(*out[0].rect(), Rectangle::new(700.0, 72.0, 712.0, 144.0));
        assert_eq!(out[0].word.space, PageCoordinateSpace::display(792.0, 612.0));
    }

    #[test]
    fn reconciliation_is_repeatable() {
        let v = [
            vector("b", (60.0, 0.0, 100.0, 10.0)),
            vector("a", (0.0, 0.0, 50.0, 10.0)),
        ];
        let o = [
            ocr("c", (0.0, 30.0, 40.0, 40.0), Some(0.5)),
            ocr("a", (1.0, 0.0, 50.0, 10.0), Some(0.9)),
        ];
        let config = ReconcileConfig::default();
        assert_eq!(reconcile(&v, &o, &config).unwrap(), reconcile(&v, &o, &config).unwrap());
    }

    #[test]
    fn out_of_range_threshold_is_clamped() {
        let reconciler = Reconciler::new(ReconcileConfig::with_threshold(7.0));
        assert_eq!(reconciler.threshold(), 1.0);
        let reconciler = Reconciler::new(ReconcileConfig::with_threshold(f64::NAN));
        assert_eq!(reconciler.threshold(), 0.5);
    }
}

#[cfg(test)]
mod properties {
    use std::collections::BTreeSet;

    use lesewerk_core::space::PageCoordinateSpace;
    use proptest::prelude::*;

    use super::*;

    fn page() -> PageCoordinateSpace {
        PageCoordinateSpace::display(1000.0, 1000.0)
    }

    /// Boxes placed in distinct cells of a 50 x 20 grid never intersect.
    fn grid_box(cell: usize, jx: f64, jy: f64) -> Rectangle {
        let (col, row) = ((cell % 10) as f64, (cell / 10) as f64);
        let (x, y) = (col * 50.0 + jx, row * 20.0 + jy);
        Rectangle::new(x, y, x + 40.0, y + 12.0)
    }

    fn arb_rect() -> impl Strategy<Value = Rectangle> {
        (0.0f64..500.0, 0.0f64..200.0, 1.0f64..60.0, 1.0f64..20.0)
            .prop_map(|(x, y, w, h)| Rectangle::new(x, y, x + w, y + h))
    }

    fn disjoint_words() -> impl Strategy<Value = (Vec<WordBox>, Vec<WordBox>)> {
        prop::collection::btree_map(0usize..100, (any::<bool>(), 0.0f64..5.0, 0.0f64..5.0), 0..40)
            .prop_map(|cells| {
                let (mut v, mut o) = (Vec::new(), Vec::new());
                for (cell, (is_vector, jx, jy)) in cells {
                    let rect = grid_box(cell, jx, jy);
                    let text = format!("w{cell}");
                    if is_vector {
                        v.push(WordBox::vector(text, rect, page()));
                    } else {
                        o.push(WordBox::ocr(text, rect, page(), Some(0.5)));
                    }
                }
                (v, o)
            })
    }

    fn ocr_words(rects: Vec<(Rectangle, f32)>) -> Vec<WordBox> {
        rects
            .into_iter()
            .enumerate()
            .map(|(i, (r, c))| WordBox::ocr(format!("o{i}"), r, page(), Some(c)))
            .collect()
    }

    proptest! {
        #[test]
        fn disjoint_inputs_pass_through((v, o) in disjoint_words()) {
            let out = reconcile(&v, &o, &ReconcileConfig::default()).unwrap();
            let expected: BTreeSet<String> = v.iter().chain(&o)
                .map(|w| format!("{} {} {}", w.text, w.rect, w.provenance))
                .collect();
            let actual: BTreeSet<String> = out.iter()
                .map(|w| format!("{} {} {}", w.text(), w.rect(), w.provenance()))
                .collect();
            prop_assert_eq!(out.len(), v.len() + o.len());
            prop_assert_eq!(actual, expected);
        }

        #[test]
        fn covered_ocr_never_survives(
            (v, _) in disjoint_words(),
            rects in prop::collection::vec((arb_rect(), 0.0f32..1.0), 0..30),
            threshold in 0.05f64..1.0,
        ) {
            let o = ocr_words(rects);
            let config = ReconcileConfig::with_threshold(threshold);
            let out = reconcile(&v, &o, &config).unwrap();
            let survivors: BTreeSet<&str> = out.iter()
                .filter(|w| w.provenance() == Provenance::Ocr)
                .map(|w| w.text())
                .collect();
            for word in &o {
                let covered = v.iter().any(|vw| {
                    overlap_ratio(&word.rect, &vw.rect, config.overlap_metric) >= threshold
                });
                if covered {
                    prop_assert!(!survivors.contains(word.text.as_str()));
                }
            }
            // Vector words are all disjoint, so every one of them survives.
            prop_assert_eq!(out.len() - survivors.len(), v.len());
        }

        #[test]
        fn output_never_overlaps_beyond_threshold(
            vr in prop::collection::vec(arb_rect(), 0..20),
            or in prop::collection::vec((arb_rect(), 0.0f32..1.0), 0..20),
        ) {
            let v: Vec<WordBox> = vr.into_iter().enumerate()
                .map(|(i, r)| WordBox::vector(format!("v{i}"), r, page()))
                .collect();
            let config = ReconcileConfig::default();
            let out = reconcile(&v, &ocr_words(or), &config).unwrap();
            for (i, a) in out.iter().enumerate() {
                for b in &out[i + 1..] {
                    prop_assert!(
                        overlap_ratio(a.rect(), b.rect(), config.overlap_metric)
                            < config.overlap_threshold
                    );
                }
            }
        }

        #[test]
        fn order_is_total_and_repeatable(
            vr in prop::collection::vec(arb_rect(), 0..20),
            or in prop::collection::vec((arb_rect(), 0.0f32..1.0), 0..20),
        ) {
            let v: Vec<WordBox> = vr.into_iter().enumerate()
                .map(|(i, r)| WordBox::vector(format!("v{i}"), r, page()))
                .collect();
            let o = ocr_words(or);
            let config = ReconcileConfig::default();
            let first = reconcile(&v, &o, &config).unwrap();
            let second = reconcile(&v, &o, &config).unwrap();
            prop_assert_eq!(&first, &second);

            for pair in first.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                prop_assert!(a.order < b.order);
                if a.order.line == b.order.line {
                    prop_assert!(a.rect().x_min <= b.rect().x_min);
                }
            }

            // Lines start top to bottom.
            let mut line_tops: Vec<(usize, f64)> = Vec::new();
            for w in &first {
                let center = w.rect().center().1;
                match line_tops.last_mut() {
                    Some((line, top)) if *line == w.order.line => *top = top.min(center),
                    _ => line_tops.push((w.order.line, center)),
                }
            }
            for pair in line_tops.windows(2) {
                prop_assert!(pair[0].1 <= pair[1].1);
            }
        }
    }
}
