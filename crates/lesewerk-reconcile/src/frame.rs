// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Display-frame normalization.
//
// Boxes from different sources arrive in different frames: PDF user space
// (bottom-left origin, points, page `/Rotate` still pending) and raster images
// (top-left origin, pixels at some DPI). Everything is mapped into one display
// frame before any overlap is measured.

use lesewerk_core::error::ReconcileError;
use lesewerk_core::space::{PageCoordinateSpace, Unit};
use lesewerk_core::types::{AnnotationRecord, WordBox};
use lesewerk_core::Rectangle;

/// The common frame one page's boxes are normalized into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayFrame {
    /// Upright, top-left frame. Its unit is points unless the reference
    /// frame was a raster of unknown resolution.
    space: PageCoordinateSpace,
    reference: PageCoordinateSpace,
    reference_scale: f64,
    /// Relative tolerance when comparing page extents.
    tolerance: f64,
}

impl DisplayFrame {
    /// Derive the display frame from the frame of one page source.
    ///
    /// A reference frame with a known unit yields a point-based display frame.
    /// A raster of unknown DPI yields a pixel-based one; other frames are then
    /// scaled onto it by page width.
    pub fn for_reference(reference: &PageCoordinateSpace, tolerance: f64) -> Self {
        let (scale, unit) = match reference.points_per_unit() {
            Some(scale) => (scale, Unit::Points),
            None => (1.0, reference.unit),
        };
        let (width, height) = reference.display_size(scale);
        Self {
            space: PageCoordinateSpace {
                unit,
                ..PageCoordinateSpace::display(width, height)
            },
            reference: *reference,
            reference_scale: scale,
            tolerance,
        }
    }

    /// The frame every normalized box is expressed in.
    pub fn space(&self) -> PageCoordinateSpace {
        self.space
    }

    /// Factor converting units of `source` into display-frame units.
    pub fn scale_for(&self, source: &PageCoordinateSpace) -> Result<f64, ReconcileError> {
        if *source == self.reference {
            return Ok(self.reference_scale);
        }

        let known = match (self.space.unit, source.points_per_unit()) {
            (Unit::Points, Some(scale)) => Some(scale),
            _ => None,
        };

        let (source_w, source_h) = source.display_size(1.0);
        let scale = match known {
            Some(scale) => scale,
            None => {
                if source_w <= 0.0 || self.space.width <= 0.0 {
                    return Err(ReconcileError::CoordinateSpaceMismatch(format!(
                        "cannot infer scale between degenerate frames {source} and {}",
                        self.space
                    )));
                }
                self.space.width / source_w
            }
        };

        self.check_extent(source, source_w * scale, source_h * scale)?;
        Ok(scale)
    }

    fn check_extent(
        &self,
        source: &PageCoordinateSpace,
        width: f64,
        height: f64,
    ) -> Result<(), ReconcileError> {
        let within = |actual: f64, expected: f64| {
            if expected <= 0.0 {
                actual <= 0.0
            } else {
                ((actual - expected) / expected).abs() <= self.tolerance
            }
        };
        if within(width, self.space.width) && within(height, self.space.height) {
            Ok(())
        } else {
            Err(ReconcileError::CoordinateSpaceMismatch(format!(
                "frame {source} maps to {width:.1}x{height:.1}, expected {:.1}x{:.1}",
                self.space.width, self.space.height
            )))
        }
    }

    /// Map a rectangle from `source` into the display frame.
    pub fn normalize(
        &self,
        rect: &Rectangle,
        source: &PageCoordinateSpace,
    ) -> Result<Rectangle, ReconcileError> {
        let scale = self.scale_for(source)?;
        Ok(source.to_display(rect, scale))
    }

    /// A copy of `word` expressed in the display frame.
    pub fn normalize_word(&self, word: &WordBox) -> Result<WordBox, ReconcileError> {
        Ok(WordBox {
            rect: self.normalize(&word.rect, &word.space)?,
            space: self.space,
            ..word.clone()
        })
    }

    /// A copy of `record` expressed in the display frame.
    pub fn normalize_annotation(
        &self,
        record: &AnnotationRecord,
    ) -> Result<AnnotationRecord, ReconcileError> {
        Ok(AnnotationRecord {
            rect: self.normalize(&record.rect, &record.space)?,
            space: self.space,
            ..record.clone()
        })
    }
}
