// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Right-to-left script detection.

use unicode_bidi::{BidiClass, BidiInfo, bidi_class};

/// Right-to-left mark, prefixed to right-anchored lines.
pub const RLM: char = '\u{200F}';

/// True if `c` is a strong right-to-left character (Hebrew, Arabic, Syriac, ...).
pub fn is_rtl_char(c: char) -> bool {
    matches!(bidi_class(c), BidiClass::R | BidiClass::AL)
}

/// True if any character in `text` belongs to a right-to-left script.
pub fn contains_rtl(text: &str) -> bool {
    text.chars().any(is_rtl_char)
}

/// Directional formatting characters. They steer layout but have no glyph.
pub fn is_bidi_mark(c: char) -> bool {
    matches!(
        c,
        '\u{061C}' | '\u{200E}' | '\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}'
    )
}

/// A single line reordered for display, left to right, with formatting
/// marks removed. Glyph-by-glyph writers need this for RTL runs.
pub fn visual_order(line: &str) -> String {
    let info = BidiInfo::new(line, None);
    let visual = match info.paragraphs.first() {
        Some(paragraph) => info.reorder_line(paragraph, paragraph.range.clone()).into_owned(),
        None => line.to_string(),
    };
    visual.chars().filter(|c| !is_bidi_mark(*c)).collect()
}
