// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Diagnostic paged documents — the terminal fallback of every paged stage.
//
// `diagnostic_pdf` is total: the styled page is tried first and, should it
// fail to verify, a hand-assembled minimal PDF is returned instead.

use chrono::Utc;
use docmerger_core::messages::Message;
use docmerger_core::{MergeConfig, PagedDocument};
use tracing::{error, warn};

use super::codec::{LopdfCodec, PagedCodec};
use super::layout::{LayoutBuilder, PageGeometry, split_paragraphs, wrap_words};
use super::writer::{PdfWriter, UnicodeFont};

/// Wrap width for diagnostic message text.
const MESSAGE_CHARS_PER_LINE: usize = 60;

/// Slots the styled page spends outside the message: two for the title,
/// the rule, a blank line, another blank line and the footer.
const STYLED_FIXED_SLOTS: usize = 6;

/// Message lines that fit between the top and bottom margins of the
/// minimal page (12pt text, 16pt leading).
const MINIMAL_MAX_LINES: usize = 43;

/// Label given to substituted diagnostic documents.
pub const DIAGNOSTIC_LABEL: &str = "diagnostic";

/// Build a one-page PDF explaining `message`. Never fails.
pub fn diagnostic_pdf(message: &str, config: &MergeConfig) -> PagedDocument {
    let styled = styled_page(message, config);
    match LopdfCodec.verify(&styled) {
        Ok(page_count) if page_count > 0 => {
            PagedDocument::new(DIAGNOSTIC_LABEL, styled, page_count).into_diagnostic()
        }
        Ok(_) => {
            warn!("Styled diagnostic page has no pages, using minimal PDF");
            PagedDocument::new(DIAGNOSTIC_LABEL, minimal_pdf(message), 1).into_diagnostic()
        }
        Err(err) => {
            error!(%err, "Styled diagnostic page failed verification, using minimal PDF");
            PagedDocument::new(DIAGNOSTIC_LABEL, minimal_pdf(message), 1).into_diagnostic()
        }
    }
}

/// Header, rule, wrapped message, and a dated footer line.
fn styled_page(message: &str, config: &MergeConfig) -> Vec<u8> {
    let geometry = PageGeometry::from_config(config);
    let mut builder = LayoutBuilder::new(geometry);

    let title = format!(
        "{} - {}",
        config.producer,
        Message::SystemMessageTitle.text(config.locale)
    );
    builder.push_title(&title);
    builder.push_line(&"_".repeat(MESSAGE_CHARS_PER_LINE), false);
    builder.push_line("", false);

    let room = geometry
        .lines_per_page
        .saturating_sub(STYLED_FIXED_SLOTS)
        .max(1);
    for line in message_lines(message, room) {
        builder.push_line(&line, false);
    }

    builder.push_line("", false);
    let created = format!(
        "{} {}",
        Message::CreatedOn.text(config.locale),
        Utc::now().format("%Y-%m-%d")
    );
    builder.push_line(&created, false);

    PdfWriter::new(config.paper_size)
        .with_title(format!("{} Message", config.producer))
        .with_unicode_font(UnicodeFont::from_config(config))
        .write_layout(&builder.finish())
}

/// A single-page PDF assembled byte by byte with a correct xref table.
///
/// Non-ASCII characters are replaced with `?` because the built-in font has
/// no glyphs for them; PDF string delimiters are escaped.
pub fn minimal_pdf(message: &str) -> Vec<u8> {
    let mut content = String::from("BT /F1 12 Tf 16 TL 72 770 Td\n");
    for line in message_lines(message, MINIMAL_MAX_LINES) {
        content.push('(');
        content.push_str(&escape_pdf_string(&line));
        content.push_str(") Tj T*\n");
    }
    content.push_str("ET");

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] \
         /Resources << /Font << /F1 5 0 R >> >> /Contents 4 0 R >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];

    let mut out: Vec<u8> = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", index + 1, body).as_bytes());
    }

    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );
    out
}

/// The message wrapped at 60 characters, cut to `max_lines` with a final
/// "..." line so it never spills onto a second page.
fn message_lines(message: &str, max_lines: usize) -> Vec<String> {
    let mut lines: Vec<String> = split_paragraphs(message)
        .iter()
        .flat_map(|paragraph| wrap_words(paragraph, MESSAGE_CHARS_PER_LINE))
        .collect();
    if lines.len() > max_lines {
        lines.truncate(max_lines.saturating_sub(1));
        lines.push("...".to_string());
    }
    lines
}

fn escape_pdf_string(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            c if c.is_ascii() && !c.is_ascii_control() => escaped.push(c),
            _ => escaped.push('?'),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmerger_core::messages::Locale;

    #[test]
    fn diagnostic_pdf_is_one_loadable_page() {
        let doc = diagnostic_pdf("No files were provided for merging", &MergeConfig::default());
        assert!(doc.diagnostic);
        assert_eq!(doc.page_count, 1);
        assert_eq!(LopdfCodec.verify(&doc.bytes).unwrap(), 1);
    }

    #[test]
    fn hebrew_locale_still_produces_a_page() {
        let config = MergeConfig {
            locale: Locale::Hebrew,
            ..MergeConfig::default()
        };
        let doc = diagnostic_pdf(Message::NoPagesMerged.text(Locale::Hebrew), &config);
        assert!(LopdfCodec.verify(&doc.bytes).unwrap() >= 1);
    }

    #[test]
    fn minimal_pdf_loads_and_carries_the_message() {
        let bytes = minimal_pdf("Fatal error (code 7) in C:\\tmp");
        let codec = LopdfCodec;
        let doc = codec.load(&bytes).unwrap();
        assert_eq!(codec.page_count(&doc), 1);
        let text = codec.extract_text(&doc).unwrap();
        assert!(text.contains("Fatal error"), "{text}");
    }

    #[test]
    fn minimal_pdf_survives_non_ascii() {
        let bytes = minimal_pdf("שגיאה");
        assert_eq!(LopdfCodec.verify(&bytes).unwrap(), 1);
    }

    #[test]
    fn long_messages_stay_on_one_page() {
        let detail = "conversion of report.docx failed: zip header missing. ".repeat(200);
        let message = format!("Error occurred during file processing\n\n{detail}");

        let doc = diagnostic_pdf(&message, &MergeConfig::default());
        assert_eq!(doc.page_count, 1);
        assert_eq!(LopdfCodec.verify(&doc.bytes).unwrap(), 1);

        let codec = LopdfCodec;
        let text = codec.extract_text(&codec.load(&doc.bytes).unwrap()).unwrap();
        assert!(text.contains("Error occurred during file processing"), "{text}");
        assert!(text.contains("..."), "{text}");
    }

    #[test]
    fn message_lines_are_capped() {
        let lines = message_lines(&"word ".repeat(500), 5);
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[4], "...");
        assert_eq!(message_lines("short", 5), vec!["short".to_string()]);
    }

    #[test]
    fn escaping() {
        assert_eq!(escape_pdf_string("a(b)c\\"), "a\\(b\\)c\\\\");
        assert_eq!(escape_pdf_string("é\t"), "??");
    }
}
