// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Word recognition through the `tesseract` command-line tool in TSV mode.

use std::process::Command;

use lesewerk_core::config::TesseractConfig;
use lesewerk_core::error::{LesewerkError, Result};
use lesewerk_core::types::WordBox;
use lesewerk_core::{PageCoordinateSpace, Rectangle};
use tracing::{debug, instrument, warn};

use super::WordRecognizer;
use crate::raster::PageImage;

/// TSV `level` of word rows.
const WORD_LEVEL: &str = "5";

/// Runs an external `tesseract` binary per page.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    config: TesseractConfig,
}

impl TesseractCli {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    /// Whether the configured binary can be started.
    pub fn is_available(&self) -> bool {
        Command::new(&self.config.binary_path)
            .arg("--version")
            .output()
            .is_ok()
    }

    fn tool(&self) -> String {
        self.config.binary_path.display().to_string()
    }
}

impl WordRecognizer for TesseractCli {
    fn name(&self) -> &str {
        "tesseract"
    }

    #[instrument(skip_all, fields(width = image.image.width(), height = image.image.height()))]
    fn recognize_words(&self, image: &PageImage) -> Result<Vec<WordBox>> {
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join("page.png");
        image.image.save(&input).map_err(|err| {
            LesewerkError::ImageError(format!("failed to write OCR input: {}", err))
        })?;

        let output = Command::new(&self.config.binary_path)
            .arg(&input)
            .arg("stdout")
            .args(["-l", &self.config.language])
            .args(["--psm", &self.config.page_segmentation_mode.to_string()])
            .args(["--oem", &self.config.engine_mode.to_string()])
            .args(["--dpi", &format!("{}", image.dpi.round())])
            .arg("tsv")
            .output()
            .map_err(|e| LesewerkError::ExternalTool {
                tool: self.tool(),
                detail: format!("failed to execute: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LesewerkError::ExternalTool {
                tool: self.tool(),
                detail: format!("exited with {}: {}", output.status, stderr.trim()),
            });
        }

        let words = parse_tsv(&String::from_utf8_lossy(&output.stdout), image.space());
        debug!(words = words.len(), "tesseract words recognized");
        Ok(words)
    }
}

/// Parse tesseract's TSV output into word boxes in `space`.
///
/// Only word rows with a non-negative confidence and non-blank text are kept;
/// confidence is scaled from percent to `0..=1`.
pub fn parse_tsv(tsv: &str, space: PageCoordinateSpace) -> Vec<WordBox> {
    let mut words = Vec::new();
    for (line_no, line) in tsv.lines().enumerate().skip(1) {
        let fields: Vec<&str> = line.splitn(12, '\t').collect();
        if fields.len() < 12 || fields[0] != WORD_LEVEL {
            continue;
        }
        let text = fields[11].trim();
        if text.is_empty() {
            continue;
        }
        let numbers: Option<Vec<f64>> = fields[6..11].iter().map(|f| f.trim().parse().ok()).collect();
        let Some(&[left, top, width, height, conf]) = numbers.as_deref() else {
            warn!(line = line_no + 1, "malformed tesseract row, skipping");
            continue;
        };
        if conf < 0.0 {
            continue;
        }
        let rect = Rectangle::new(left, top, left + width, top + height);
        let confidence = (conf / 100.0).clamp(0.0, 1.0) as f32;
        words.push(WordBox::ocr(text, rect, space, Some(confidence)));
    }
    words
}
