// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// DocMerger — Core types and error definitions shared across all crates.

pub mod bidi;
pub mod config;
pub mod error;
pub mod messages;
pub mod types;

pub use config::MergeConfig;
pub use error::DocMergerError;
pub use types::*;
