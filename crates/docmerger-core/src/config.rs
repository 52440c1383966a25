// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::messages::Locale;

/// Tunables for one merge run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Page geometry for rendered and diagnostic pages.
    pub paper_size: crate::PaperSize,
    /// Word-wrap budget in characters.
    pub chars_per_line: usize,
    /// Physical lines per rendered page, title line included.
    pub lines_per_page: usize,
    /// Body font size in points.
    pub font_size_pt: f32,
    /// Baseline-to-baseline distance in points.
    pub line_height_pt: f32,
    /// Left/right/top margin in points.
    pub margin_pt: f32,
    /// Bytes of junk tolerated before `%PDF-` on the second load attempt.
    pub relaxed_header_scan_bytes: usize,
    /// Extract text from inputs concurrently (results keep input order).
    pub parallel_extraction: bool,
    /// Language of diagnostic documents.
    pub locale: Locale,
    /// Product name stamped in diagnostic headers.
    pub producer: String,
    /// TrueType/OpenType font embedded for text the built-in Helvetica
    /// cannot encode (Hebrew, Arabic). Without one such characters print as `?`.
    pub unicode_font: Option<PathBuf>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            paper_size: crate::PaperSize::A4,
            chars_per_line: 80,
            lines_per_page: 45,
            font_size_pt: 11.0,
            line_height_pt: 16.0,
            margin_pt: 50.0,
            relaxed_header_scan_bytes: 1024,
            parallel_extraction: true,
            locale: Locale::English,
            producer: "DocMerger".into(),
            unicode_font: None,
        }
    }
}

impl MergeConfig {
    /// Read a JSON config file; missing keys take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }
}
