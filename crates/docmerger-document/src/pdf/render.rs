// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Paginated renderer — plain text to a verified paged document.

use docmerger_core::error::{DocMergerError, Result};
use docmerger_core::{MergeConfig, PagedDocument};
use tracing::{info, instrument, warn};

use super::codec::{LopdfCodec, PagedCodec};
use super::diagnostic::diagnostic_pdf;
use super::layout::{PageGeometry, layout_text};
use super::writer::{PdfWriter, UnicodeFont};

/// Turns text into PDF pages: wrap, paginate, anchor, stamp footers, verify.
pub struct PaginatedRenderer {
    config: MergeConfig,
    codec: LopdfCodec,
    unicode_font: Option<UnicodeFont>,
}

impl PaginatedRenderer {
    pub fn new(config: MergeConfig) -> Self {
        let unicode_font = UnicodeFont::from_config(&config);
        Self {
            config,
            codec: LopdfCodec,
            unicode_font,
        }
    }

    /// Render `text` under `page_title`. On any failure a single diagnostic
    /// page naming the title is returned instead.
    pub fn render(&self, text: &str, page_title: &str) -> PagedDocument {
        match self.try_render(text, page_title) {
            Ok(doc) => doc,
            Err(err) => {
                warn!(title = page_title, %err, "Rendering failed, substituting diagnostic page");
                let message = format!("Could not create a valid PDF from: {page_title}\n\n{err}");
                let mut doc = diagnostic_pdf(&message, &self.config);
                doc.label = page_title.to_string();
                doc
            }
        }
    }

    /// Render without substitution; errors are returned to the caller.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub fn try_render(&self, text: &str, page_title: &str) -> Result<PagedDocument> {
        let geometry = PageGeometry::from_config(&self.config);
        let pages = layout_text(text, page_title, geometry);
        let expected = pages.len();

        let bytes = PdfWriter::new(self.config.paper_size)
            .with_title(page_title)
            .with_unicode_font(self.unicode_font.clone())
            .write_layout(&pages);

        let page_count = self.codec.verify(&bytes)?;
        if page_count != expected {
            return Err(DocMergerError::StructuralVerificationFailed(format!(
                "rendered {expected} pages but {page_count} loaded back"
            )));
        }

        info!(pages = page_count, "Text rendered");
        Ok(PagedDocument::new(page_title, bytes, page_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_renders_one_page() {
        let renderer = PaginatedRenderer::new(MergeConfig::default());
        let doc = renderer.render("Hello\n\nWorld", "b.docx");
        assert!(!doc.diagnostic);
        assert_eq!(doc.page_count, 1);
        assert_eq!(doc.label, "b.docx");
    }

    #[test]
    fn long_text_paginates() {
        let renderer = PaginatedRenderer::new(MergeConfig::default());
        let text = "A sentence that keeps going on and on. ".repeat(400);
        let doc = renderer.try_render(&text, "long.txt").unwrap();
        assert!(doc.page_count > 1);
        assert_eq!(LopdfCodec.verify(&doc.bytes).unwrap(), doc.page_count);
    }

    #[test]
    fn mixed_direction_text_renders() {
        let renderer = PaginatedRenderer::new(MergeConfig::default());
        let doc = renderer.render("Summary\n\nסיכום הדוח\n\nمرحبا", "mixed.docx");
        assert!(LopdfCodec.verify(&doc.bytes).unwrap() >= 1);
    }

    fn extracted(doc: &PagedDocument) -> String {
        let codec = LopdfCodec;
        codec.extract_text(&codec.load(&doc.bytes).unwrap()).unwrap()
    }

    #[test]
    fn hebrew_is_never_written_as_raw_utf8() {
        let renderer = PaginatedRenderer::new(MergeConfig::default());
        let text = extracted(&renderer.render("שלום עולם", "he.txt"));
        assert!(text.contains("???? ????"), "{text}");
        assert!(!text.contains('\u{D7}'), "{text}");
    }

    #[test]
    fn configured_font_renders_hebrew_readably() {
        let font = std::path::PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf");
        if !font.exists() {
            return;
        }
        let config = MergeConfig {
            unicode_font: Some(font),
            ..MergeConfig::default()
        };
        let doc = PaginatedRenderer::new(config).render("שלום עולם", "he.txt");
        assert!(!doc.diagnostic);
        let text = extracted(&doc);
        assert!(text.contains("םולש") && text.contains("םלוע"), "{text}");
        assert!(text.contains("Page 1 of 1"), "{text}");
    }
}
