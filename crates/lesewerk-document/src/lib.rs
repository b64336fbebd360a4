// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// lesewerk-document: document-facing side of Lesewerk.
//
// Reads PDFs (page geometry, vector words, annotations, embedded images),
// renders pages with `pdftoppm`, recognises words with tesseract or `ocrs`,
// runs pages through the reconciler and writes searchable image PDFs.

pub mod pdf;
pub mod pipeline;
pub mod raster;
pub mod scan;

#[cfg(test)]
mod testing;

// Re-export the primary structs so callers can use `lesewerk_document::PdfReader` etc.
pub use pdf::reader::{PageInfo, PdfReader};
pub use pdf::writer::PdfWriter;
pub use pipeline::DocumentPipeline;
pub use raster::{PageImage, PageRenderer, Rasterizer, check_aspect};
pub use scan::{TesseractCli, WordRecognizer};

#[cfg(feature = "ocr")]
pub use scan::ocr::OcrEngine;
