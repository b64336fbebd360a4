// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: reading pages, words and annotations; writing searchable PDFs.

mod font;
mod objects;
pub mod reader;
mod text;
pub mod writer;

pub use reader::PdfReader;
pub use writer::PdfWriter;
