// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Uniform-grid spatial index over word rectangles.

use std::collections::HashMap;

use lesewerk_core::Rectangle;

/// Boxes covering more cells than this are kept in a side list that every
/// query scans.
const MAX_CELLS_PER_BOX: i64 = 1024;

/// Buckets rectangles into square grid cells so overlap queries only look at
/// boxes sharing a cell with the query.
#[derive(Debug, Clone)]
pub struct GridIndex {
    cell: f64,
    cells: HashMap<(i64, i64), Vec<usize>>,
    oversized: Vec<usize>,
    rects: Vec<Rectangle>,
}

impl GridIndex {
    /// An empty index with the given cell edge length.
    pub fn new(cell: f64) -> Self {
        let cell = if cell.is_finite() && cell > 0.0 { cell } else { 1.0 };
        Self {
            cell,
            cells: HashMap::new(),
            oversized: Vec::new(),
            rects: Vec::new(),
        }
    }

    /// Cell size suited to a set of word boxes: the mean of their larger side.
    pub fn cell_size_for<'a>(rects: impl IntoIterator<Item = &'a Rectangle>) -> f64 {
        let (sum, count) = rects
            .into_iter()
            .fold((0.0, 0usize), |(sum, n), r| (sum + r.width().max(r.height()), n + 1));
        if count == 0 {
            return 1.0;
        }
        (sum / count as f64).max(1e-3)
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Rectangle> {
        self.rects.get(id)
    }

    fn span(&self, rect: &Rectangle) -> (i64, i64, i64, i64) {
        let cell = |v: f64| (v / self.cell).floor() as i64;
        (
            cell(rect.x_min),
            cell(rect.y_min),
            cell(rect.x_max),
            cell(rect.y_max),
        )
    }

    /// Add a rectangle and return its id (insertion order).
    pub fn insert(&mut self, rect: Rectangle) -> usize {
        let id = self.rects.len();
        self.rects.push(rect);

        let (x0, y0, x1, y1) = self.span(&rect);
        let count = (x1 - x0 + 1).saturating_mul(y1 - y0 + 1);
        if count > MAX_CELLS_PER_BOX {
            self.oversized.push(id);
            return id;
        }
        for cx in x0..=x1 {
            for cy in y0..=y1 {
                self.cells.entry((cx, cy)).or_default().push(id);
            }
        }
        id
    }

    /// Ids of every stored rectangle that may intersect `rect`, ascending.
    pub fn candidates(&self, rect: &Rectangle) -> Vec<usize> {
        let mut found = self.oversized.clone();
        let (x0, y0, x1, y1) = self.span(rect);
        let count = (x1 - x0 + 1).saturating_mul(y1 - y0 + 1);

        if count > MAX_CELLS_PER_BOX {
            found.extend(0..self.rects.len());
        } else {
            for cx in x0..=x1 {
                for cy in y0..=y1 {
                    if let Some(ids) = self.cells.get(&(cx, cy)) {
                        found.extend_from_slice(ids);
                    }
                }
            }
        }

        found.sort_unstable();
        found.dedup();
        found
    }

    /// Ids of stored rectangles with positive-area intersection with `rect`.
    pub fn intersecting(&self, rect: &Rectangle) -> Vec<usize> {
        self.candidates(rect)
            .into_iter()
            .filter(|&id| self.rects[id].intersection_area(rect) > 0.0)
            .collect()
    }
}
