// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Optical character recognition: word-level recognizers over rendered pages.

pub mod tesseract;

#[cfg(feature = "ocr")]
pub mod ocr;

use lesewerk_core::error::Result;
use lesewerk_core::types::WordBox;

use crate::raster::PageImage;

pub use tesseract::TesseractCli;

#[cfg(feature = "ocr")]
pub use ocr::OcrEngine;

/// Anything that turns a rendered page into positioned words.
///
/// Implementations return OCR [`WordBox`]es in the image's top-left pixel
/// frame ([`PageImage::space`]).
pub trait WordRecognizer: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    fn recognize_words(&self, image: &PageImage) -> Result<Vec<WordBox>>;
}
