// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Reading order: group boxes into lines, then order left to right.

use std::cmp::Ordering;

use lesewerk_core::types::{Provenance, ReadingOrder};
use lesewerk_core::Rectangle;

/// Minimum vertical overlap, relative to the shorter of word and line, for a
/// word to join a line.
const LINE_OVERLAP: f64 = 0.5;

/// A box to be placed, identified by where it came from.
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    pub rect: Rectangle,
    pub source: Provenance,
    pub source_index: usize,
}

struct Line {
    top: f64,
    bottom: f64,
    members: Vec<usize>,
}

impl Line {
    fn height(&self) -> f64 {
        self.bottom - self.top
    }

    fn accepts(&self, rect: &Rectangle) -> bool {
        let shorter = rect.height().min(self.height());
        if shorter <= 0.0 {
            let center = rect.center().1;
            return center >= self.top && center <= self.bottom;
        }
        let overlap = rect.y_max.min(self.bottom) - rect.y_min.max(self.top);
        overlap >= LINE_OVERLAP * shorter
    }

    /// Extend the band to the running mean of its members' top and bottom.
    fn absorb(&mut self, index: usize, rect: &Rectangle) {
        let n = self.members.len() as f64;
        self.top = (self.top * n + rect.y_min) / (n + 1.0);
        self.bottom = (self.bottom * n + rect.y_max) / (n + 1.0);
        self.members.push(index);
    }
}

fn tie_break(a: &Placement, b: &Placement) -> Ordering {
    a.source
        .cmp(&b.source)
        .then(a.source_index.cmp(&b.source_index))
}

/// Assign a reading-order key to every placement, in input order.
///
/// Boxes are swept by vertical centre (display frame, y down); a box joins the
/// current line when it overlaps the line's band enough, otherwise it opens a
/// new line. Within a line boxes are ordered by left edge.
pub fn reading_order(items: &[Placement]) -> Vec<ReadingOrder> {
    let mut sorted: Vec<usize> = (0..items.len()).collect();
    sorted.sort_by(|&a, &b| {
        let (ra, rb) = (&items[a].rect, &items[b].rect);
        ra.center()
            .1
            .total_cmp(&rb.center().1)
            .then(ra.x_min.total_cmp(&rb.x_min))
            .then_with(|| tie_break(&items[a], &items[b]))
    });

    let mut lines: Vec<Line> = Vec::new();
    for idx in sorted {
        let rect = &items[idx].rect;
        match lines.last_mut() {
            Some(line) if line.accepts(rect) => line.absorb(idx, rect),
            _ => lines.push(Line {
                top: rect.y_min,
                bottom: rect.y_max,
                members: vec![idx],
            }),
        }
    }

    let mut keys = vec![
        ReadingOrder {
            line: 0,
            position: 0,
            source: Provenance::Vector,
            source_index: 0,
        };
        items.len()
    ];
    for (line_no, line) in lines.iter_mut().enumerate() {
        line.members.sort_by(|&a, &b| {
            items[a]
                .rect
                .x_min
                .total_cmp(&items[b].rect.x_min)
                .then_with(|| tie_break(&items[a], &items[b]))
        });
        for (position, &idx) in line.members.iter().enumerate() {
            keys[idx] = ReadingOrder {
                line: line_no,
                position,
                source: items[idx].source,
                source_index: items[idx].source_index,
            };
        }
    }
    keys
}
