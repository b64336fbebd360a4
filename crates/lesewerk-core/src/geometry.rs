// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Axis-aligned rectangles: the bounding-box primitive shared by words,
// annotations and page extents.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle `(x_min, y_min, x_max, y_max)`.
///
/// The rectangle itself carries no coordinate-space information; callers pair
/// it with a [`PageCoordinateSpace`](crate::space::PageCoordinateSpace).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl Rectangle {
    pub const fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Build a rectangle from two arbitrary corners, ordering the bounds.
    pub fn from_corners(a: (f64, f64), b: (f64, f64)) -> Self {
        Self {
            x_min: a.0.min(b.0),
            y_min: a.1.min(b.1),
            x_max: a.0.max(b.0),
            y_max: a.1.max(b.1),
        }
    }

    /// Build a rectangle from its centre and extent.
    pub fn from_center(x_center: f64, y_center: f64, width: f64, height: f64) -> Self {
        let (w_half, h_half) = (width / 2.0, height / 2.0);
        Self::new(
            x_center - w_half,
            y_center - h_half,
            x_center + w_half,
            y_center + h_half,
        )
    }

    /// Centre-width-height form: `(x_center, y_center, width, height)`.
    pub fn to_center(&self) -> (f64, f64, f64, f64) {
        let (x, y) = self.center();
        (x, y, self.width(), self.height())
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    /// Check that the rectangle is well-formed: finite, ordered bounds and no
    /// negative coordinate.
    ///
    /// Returns a short reason on failure. Malformed geometry is never repaired.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let coords = [self.x_min, self.y_min, self.x_max, self.y_max];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(format!("non-finite coordinate in {self}"));
        }
        if self.x_min > self.x_max {
            return Err(format!("x_min > x_max in {self}"));
        }
        if self.y_min > self.y_max {
            return Err(format!("y_min > y_max in {self}"));
        }
        if coords.iter().any(|c| *c < 0.0) {
            return Err(format!("negative coordinate in {self}"));
        }
        Ok(())
    }

    /// The intersection rectangle, or `None` when the two are disjoint.
    ///
    /// Rectangles that only touch along an edge intersect in a zero-area
    /// rectangle.
    pub fn intersection(&self, other: &Rectangle) -> Option<Rectangle> {
        let x_min = self.x_min.max(other.x_min);
        let y_min = self.y_min.max(other.y_min);
        let x_max = self.x_max.min(other.x_max);
        let y_max = self.y_max.min(other.y_max);
        if x_min > x_max || y_min > y_max {
            return None;
        }
        Some(Rectangle::new(x_min, y_min, x_max, y_max))
    }

    pub fn intersection_area(&self, other: &Rectangle) -> f64 {
        self.intersection(other).map_or(0.0, |r| r.area())
    }

    /// Intersection over union. Zero when the union is empty.
    pub fn iou(&self, other: &Rectangle) -> f64 {
        let inter = self.intersection_area(other);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 { 0.0 } else { inter / union }
    }

    /// Intersection over the area of the smaller rectangle. Zero when the
    /// smaller rectangle has no area.
    pub fn intersection_over_smaller(&self, other: &Rectangle) -> f64 {
        let smaller = self.area().min(other.area());
        if smaller <= 0.0 {
            0.0
        } else {
            self.intersection_area(other) / smaller
        }
    }

    /// Fraction of `other`'s area covered by `self`.
    pub fn coverage_of(&self, other: &Rectangle) -> f64 {
        let area = other.area();
        if area <= 0.0 {
            0.0
        } else {
            self.intersection_area(other) / area
        }
    }

    /// Whether `other` lies fully inside `self`.
    pub fn contains(&self, other: &Rectangle) -> bool {
        other.x_min >= self.x_min
            && other.x_max <= self.x_max
            && other.y_min >= self.y_min
            && other.y_max <= self.y_max
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rectangle) -> Rectangle {
        Rectangle::new(
            self.x_min.min(other.x_min),
            self.y_min.min(other.y_min),
            self.x_max.max(other.x_max),
            self.y_max.max(other.y_max),
        )
    }

    pub fn rescale(&self, sx: f64, sy: f64) -> Rectangle {
        Rectangle::new(
            self.x_min * sx,
            self.y_min * sy,
            self.x_max * sx,
            self.y_max * sy,
        )
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Rectangle {
        Rectangle::new(
            self.x_min + dx,
            self.y_min + dy,
            self.x_max + dx,
            self.y_max + dy,
        )
    }

    /// Clamp the rectangle into `bounds`. Returns `None` if nothing remains.
    pub fn clamp_to(&self, bounds: &Rectangle) -> Option<Rectangle> {
        self.intersection(bounds)
    }

    /// Replace every group of mutually intersecting rectangles by their
    /// common super-rectangle, until no two rectangles in the result have a
    /// positive-area intersection.
    ///
    /// Order of the surviving rectangles follows first appearance of each
    /// group's earliest member.
    pub fn merge_overlapping(rectangles: &[Rectangle]) -> Vec<Rectangle> {
        let mut merged: Vec<Rectangle> = Vec::with_capacity(rectangles.len());
        for rect in rectangles {
            let mut current = *rect;
            let mut slot: Option<usize> = None;
            // A grown rectangle can reach ones it missed before, so absorb
            // until nothing intersects.
            while let Some(idx) = merged
                .iter()
                .position(|m| m.intersection_area(&current) > 0.0)
            {
                current = merged.remove(idx).union(&current);
                slot = Some(slot.map_or(idx, |s| s.min(idx)));
            }
            match slot {
                Some(idx) => merged.insert(idx.min(merged.len()), current),
                None => merged.push(current),
            }
        }
        merged
    }
}

impl std::fmt::Display for Rectangle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.x_min, self.y_min, self.x_max, self.y_max
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_height_area_center() {
        let r = Rectangle::new(1.0, 2.0, 5.0, 10.0);
        assert_eq!(r.width(), 4.0);
        assert_eq!(r.height(), 8.0);
        assert_eq!(r.area(), 32.0);
        assert_eq!(r.center(), (3.0, 6.0));
    }

    #[test]
    fn center_form_round_trips() {
        let r = Rectangle::from_center(10.0, 20.0, 4.0, 6.0);
        assert_eq!(r, Rectangle::new(8.0, 17.0, 12.0, 23.0));
        assert_eq!(r.to_center(), (10.0, 20.0, 4.0, 6.0));
    }

    #[test]
    fn intersection_of_disjoint_is_none() {
        let a = Rectangle::new(0.0, 0.0, 1.0, 1.0);
        let b = Rectangle::new(2.0, 2.0, 3.0, 3.0);
        assert!(a.intersection(&b).is_none());
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn touching_edges_intersect_with_zero_area() {
        let a = Rectangle::new(0.0, 0.0, 1.0, 1.0);
        let b = Rectangle::new(1.0, 0.0, 2.0, 1.0);
        let inter = a.intersection(&b).unwrap();
        assert_eq!(inter.area(), 0.0);
        assert_eq!(a.intersection_over_smaller(&b), 0.0);
    }

    #[test]
    fn iou_and_smaller_ratio() {
        let a = Rectangle::new(0.0, 0.0, 2.0, 2.0);
        let b = Rectangle::new(1.0, 0.0, 3.0, 2.0);
        // Intersection 2, union 6.
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-12);
        assert!((a.intersection_over_smaller(&b) - 0.5).abs() < 1e-12);

        let inner = Rectangle::new(0.5, 0.5, 1.0, 1.0);
        assert_eq!(a.intersection_over_smaller(&inner), 1.0);
        assert_eq!(a.coverage_of(&inner), 1.0);
        assert_eq!(inner.coverage_of(&a), 0.0625);
    }

    #[test]
    fn contains_and_union() {
        let outer = Rectangle::new(0.0, 0.0, 5.0, 5.0);
        assert!(outer.contains(&Rectangle::new(1.0, 1.0, 2.0, 2.0)));
        assert!(!Rectangle::new(1.0, 1.1, 2.0, 3.0).contains(&Rectangle::new(1.0, 1.0, 2.0, 2.0)));
        let u = Rectangle::new(0.0, 0.0, 1.0, 1.0).union(&Rectangle::new(3.0, -1.0, 4.0, 0.5));
        assert_eq!(u, Rectangle::new(0.0, -1.0, 4.0, 1.0));
    }

    #[test]
    fn rescale_and_translate() {
        let r = Rectangle::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(r.rescale(2.0, 0.5), Rectangle::new(2.0, 1.0, 6.0, 2.0));
        assert_eq!(r.translate(-1.0, 1.0), Rectangle::new(0.0, 3.0, 2.0, 5.0));
    }

    #[test]
    fn validate_rejects_malformed_boxes() {
        assert!(Rectangle::new(0.0, 0.0, 1.0, 1.0).validate().is_ok());
        assert!(Rectangle::new(2.0, 0.0, 1.0, 1.0).validate().is_err());
        assert!(Rectangle::new(0.0, 2.0, 1.0, 1.0).validate().is_err());
        assert!(Rectangle::new(-1.0, 0.0, 1.0, 1.0).validate().is_err());
        assert!(Rectangle::new(0.0, 0.0, f64::NAN, 1.0).validate().is_err());
        // Degenerate (zero-area) boxes are well-formed.
        assert!(Rectangle::new(1.0, 1.0, 1.0, 1.0).validate().is_ok());
    }

    #[test]
    fn merge_overlapping_chains_groups() {
        let rects = [
            Rectangle::new(0.0, 0.0, 2.0, 2.0),
            Rectangle::new(10.0, 10.0, 11.0, 11.0),
            Rectangle::new(1.0, 1.0, 3.0, 3.0),
            Rectangle::new(2.5, 2.5, 4.0, 4.0),
        ];
        let merged = Rectangle::merge_overlapping(&rects);
        assert_eq!(merged.len(), 2);
        assert!(merged.contains(&Rectangle::new(0.0, 0.0, 4.0, 4.0)));
        assert!(merged.contains(&Rectangle::new(10.0, 10.0, 11.0, 11.0)));
    }

    #[test]
    fn merge_overlapping_reaches_back_after_growth() {
        // The third rectangle bridges the first two, which were disjoint.
        let rects = [
            Rectangle::new(0.0, 0.0, 1.0, 1.0),
            Rectangle::new(2.0, 0.0, 3.0, 1.0),
            Rectangle::new(0.5, 0.0, 2.5, 1.0),
        ];
        let merged = Rectangle::merge_overlapping(&rects);
        assert_eq!(merged, vec![Rectangle::new(0.0, 0.0, 3.0, 1.0)]);
    }
}
