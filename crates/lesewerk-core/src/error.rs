// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Lesewerk.

use thiserror::Error;

use crate::types::Provenance;

/// Validation failures raised by the position reconciler.
///
/// Both variants are local and permanent: the reconciler is pure, so retrying
/// with the same input always fails the same way.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReconcileError {
    #[error("invalid geometry in {provenance} word #{index}: {reason}")]
    InvalidGeometry {
        provenance: Provenance,
        index: usize,
        reason: String,
    },

    #[error("coordinate space mismatch: {0}")]
    CoordinateSpaceMismatch(String),
}

/// Top-level error type for all Lesewerk operations.
#[derive(Debug, Error)]
pub enum LesewerkError {
    // -- Reconciliation --
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    // -- Document errors --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("page {page} out of range (document has {page_count} pages)")]
    PageOutOfRange { page: u32, page_count: usize },

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("OCR failed: {0}")]
    OcrError(String),

    #[error("rasterization failed: {0}")]
    Rasterize(String),

    #[error("external tool `{tool}` failed: {detail}")]
    ExternalTool { tool: String, detail: String },

    #[error("page worker failed: {0}")]
    Task(String),

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    Configuration(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LesewerkError>;
