// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Lesewerk: core geometry, word and annotation types, configuration and
// error definitions shared across all crates.

pub mod config;
pub mod error;
pub mod geometry;
pub mod space;
pub mod types;

pub use config::LesewerkConfig;
pub use error::{LesewerkError, ReconcileError};
pub use geometry::Rectangle;
pub use space::{Origin, PageCoordinateSpace, Rotation, Unit};
pub use types::*;
