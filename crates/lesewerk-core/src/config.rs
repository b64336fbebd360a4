// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Extraction configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{LesewerkError, Result};
use crate::types::AnnotationKind;

/// How the overlap between two boxes is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverlapMetric {
    /// Intersection area over the area of the smaller box.
    #[default]
    IntersectionOverSmaller,
    /// Intersection area over the union area.
    IntersectionOverUnion,
}

/// Settings for the position reconciler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Overlap ratio at or above which two boxes are the same word.
    pub overlap_threshold: f64,
    pub overlap_metric: OverlapMetric,
    /// Relative tolerance when comparing page extents across frames.
    pub size_tolerance: f64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            overlap_threshold: 0.5,
            overlap_metric: OverlapMetric::IntersectionOverSmaller,
            size_tolerance: 0.1,
        }
    }
}

impl ReconcileConfig {
    pub fn with_threshold(overlap_threshold: f64) -> Self {
        Self {
            overlap_threshold,
            ..Self::default()
        }
    }
}

/// Settings for matching annotations against words.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationMatchConfig {
    /// Word coverage above which a word belongs to an annotation.
    pub match_threshold: f64,
    /// Fallback coverage; only the single best word is kept.
    pub minimal_threshold: f64,
    /// Annotation kinds that are matched against words.
    pub kinds: Vec<AnnotationKind>,
}

impl Default for AnnotationMatchConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.4,
            minimal_threshold: 0.2,
            kinds: vec![
                AnnotationKind::Square,
                AnnotationKind::Circle,
                AnnotationKind::Highlight,
                AnnotationKind::Underline,
                AnnotationKind::StrikeOut,
                AnnotationKind::Squiggly,
            ],
        }
    }
}

/// Settings for grouping a page's lines into text flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Vertical gap, in heights of the taller of two lines, beyond which
    /// the lower line starts a new flow.
    pub line_gap: f64,
    /// Keep flows no annotation points into.
    pub include_unannotated: bool,
    /// Documents with fewer words produce no flows at all.
    pub min_document_words: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            line_gap: 1.0,
            include_unannotated: true,
            min_document_words: 10,
        }
    }
}

/// Settings for the `pdftoppm` rasterizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterConfig {
    pub pdftoppm_path: PathBuf,
    /// Resolution of page images (also embedded into rebuilt PDFs).
    pub dpi: u32,
    /// Higher resolution used for OCR only, when set.
    pub ocr_dpi: Option<u32>,
    /// Maximum difference between image and page aspect ratios.
    pub aspect_tolerance: f64,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            pdftoppm_path: PathBuf::from("pdftoppm"),
            dpi: 150,
            ocr_dpi: None,
            aspect_tolerance: 0.1,
        }
    }
}

/// Settings for the `tesseract` command-line recognizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TesseractConfig {
    pub binary_path: PathBuf,
    pub language: String,
    /// `--psm` value.
    pub page_segmentation_mode: u8,
    /// `--oem` value.
    pub engine_mode: u8,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("tesseract"),
            language: "eng".into(),
            page_segmentation_mode: 3,
            engine_mode: 3,
        }
    }
}

/// When a page is rasterized and OCRed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OcrPolicy {
    Never,
    /// OCR pages with fewer than `min_words` vector words.
    WhenTextSparse { min_words: usize },
    Always,
}

impl Default for OcrPolicy {
    fn default() -> Self {
        Self::WhenTextSparse { min_words: 10 }
    }
}

impl OcrPolicy {
    pub fn requires_ocr(&self, vector_words: usize) -> bool {
        match self {
            Self::Never => false,
            Self::WhenTextSparse { min_words } => vector_words < *min_words,
            Self::Always => true,
        }
    }
}

/// Complete Lesewerk settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LesewerkConfig {
    pub reconcile: ReconcileConfig,
    pub annotations: AnnotationMatchConfig,
    #[serde(default)]
    pub flows: FlowConfig,
    pub raster: RasterConfig,
    pub tesseract: TesseractConfig,
    pub ocr_policy: OcrPolicy,
    /// Pages processed concurrently by the document pipeline.
    #[serde(default = "default_parallel_pages")]
    pub max_parallel_pages: usize,
}

fn default_parallel_pages() -> usize {
    4
}

impl Default for LesewerkConfig {
    fn default() -> Self {
        Self {
            reconcile: ReconcileConfig::default(),
            annotations: AnnotationMatchConfig::default(),
            flows: FlowConfig::default(),
            raster: RasterConfig::default(),
            tesseract: TesseractConfig::default(),
            ocr_policy: OcrPolicy::default(),
            max_parallel_pages: default_parallel_pages(),
        }
    }
}

impl LesewerkConfig {
    /// Reject settings no pipeline could run with.
    pub fn validate(&self) -> Result<()> {
        let unit_interval = [
            ("reconcile.overlap_threshold", self.reconcile.overlap_threshold),
            ("reconcile.size_tolerance", self.reconcile.size_tolerance),
            ("annotations.match_threshold", self.annotations.match_threshold),
            ("annotations.minimal_threshold", self.annotations.minimal_threshold),
            ("raster.aspect_tolerance", self.raster.aspect_tolerance),
        ];
        for (name, value) in unit_interval {
            if !(0.0..=1.0).contains(&value) {
                return Err(LesewerkError::Configuration(format!(
                    "{name} must lie in [0, 1], got {value}"
                )));
            }
        }
        if !self.flows.line_gap.is_finite() || self.flows.line_gap < 0.0 {
            return Err(LesewerkError::Configuration(format!(
                "flows.line_gap must be a non-negative number, got {}",
                self.flows.line_gap
            )));
        }
        if self.raster.dpi == 0 || self.raster.ocr_dpi == Some(0) {
            return Err(LesewerkError::Configuration(
                "raster DPI must be positive".into(),
            ));
        }
        if self.max_parallel_pages == 0 {
            return Err(LesewerkError::Configuration(
                "max_parallel_pages must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Load and validate settings from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        info!(path = %path.as_ref().display(), "configuration loaded");
        Ok(config)
    }

    /// Write settings as pretty-printed JSON.
    pub fn save_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), data)?;
        debug!(path = %path.as_ref().display(), "configuration saved");
        Ok(())
    }
}
