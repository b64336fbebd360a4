// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Lesewerk Reconcile: merges vector and OCR word boxes of a page into one
// ordered word list and matches annotations against it.
//
// Everything here is pure and synchronous. No I/O, no shared state; pages can
// be reconciled concurrently from any number of workers.

pub mod annotate;
pub mod flow;
pub mod frame;
pub mod index;
pub mod order;
pub mod reconcile;

pub use annotate::match_annotations;
pub use flow::{flows_with_annotations, page_flows};
pub use frame::DisplayFrame;
pub use reconcile::{Reconciler, overlap_ratio, reconcile};
