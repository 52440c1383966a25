// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Format classifier: file name + declared media type -> semantic `Kind`.
//
// Extensions are checked for every kind first, in priority order; the media
// type is only a secondary signal consulted when no extension matched.

use docmerger_core::Kind;

/// Kinds in match priority order. `Unknown` is the fall-through.
const PRIORITY: [Kind; 6] = [
    Kind::Paged,
    Kind::FlowText,
    Kind::Presentation,
    Kind::Tabular,
    Kind::Image,
    Kind::PlainText,
];

fn extensions(kind: Kind) -> &'static [&'static str] {
    match kind {
        Kind::Paged => &["pdf"],
        Kind::FlowText => &["docx", "doc", "rtf", "odt"],
        Kind::Presentation => &["pptx", "ppt", "odp"],
        Kind::Tabular => &["xlsx", "xls", "ods", "csv"],
        Kind::Image => &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp"],
        Kind::PlainText => &["txt"],
        Kind::Unknown => &[],
    }
}

fn media_type_markers(kind: Kind) -> &'static [&'static str] {
    match kind {
        Kind::Paged => &["pdf"],
        Kind::FlowText => &["msword", "wordprocessingml", "rtf", "opendocument.text"],
        Kind::Presentation => &["presentation", "powerpoint"],
        Kind::Tabular => &["spreadsheet", "excel", "csv"],
        Kind::Image => &["image/"],
        Kind::PlainText => &["text/plain"],
        Kind::Unknown => &[],
    }
}

/// Lowercased extension of `name`, without the dot.
pub fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.contains(['/', '\\']) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Classify an input. Pure and total: absent or unrecognised inputs yield
/// `Kind::Unknown`.
pub fn classify(name: Option<&str>, media_type: Option<&str>) -> Kind {
    if let Some(ext) = name.and_then(extension_of) {
        if let Some(kind) = PRIORITY
            .into_iter()
            .find(|kind| extensions(*kind).contains(&ext.as_str()))
        {
            return kind;
        }
    }

    if let Some(media) = media_type.map(str::to_ascii_lowercase) {
        if let Some(kind) = PRIORITY.into_iter().find(|kind| {
            media_type_markers(*kind)
                .iter()
                .any(|marker| media.contains(marker))
        }) {
            return kind;
        }
    }

    Kind::Unknown
}
