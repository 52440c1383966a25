// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Structural merger — concatenate paged documents page by page.
//
// Two tiers of fallback: a failed bulk copy degrades to per-page copies
// (one bad page never aborts the rest), and the assembled result is saved
// and re-loaded; an empty or unloadable result is replaced by a diagnostic
// page.

use docmerger_core::messages::Message;
use docmerger_core::{Diagnostic, DiagnosticKind, MergeConfig, MergeResult, PagedDocument};
use tracing::{debug, error, info, instrument, warn};

use super::codec::{LopdfCodec, PagedCodec};
use super::diagnostic::diagnostic_pdf;

/// Merges an ordered list of paged documents into one.
pub struct StructuralMerger<C: PagedCodec = LopdfCodec> {
    codec: C,
    config: MergeConfig,
}

impl StructuralMerger<LopdfCodec> {
    pub fn with_config(config: MergeConfig) -> Self {
        Self::new(LopdfCodec, config)
    }
}

impl<C: PagedCodec> StructuralMerger<C> {
    pub fn new(codec: C, config: MergeConfig) -> Self {
        Self { codec, config }
    }

    /// Merge `documents` in order. Always returns loadable, non-empty bytes.
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub fn merge(&self, documents: &[PagedDocument]) -> MergeResult {
        let mut tally = Tally::default();

        let mut merged = match self.codec.new_document() {
            Ok(doc) => doc,
            Err(err) => {
                error!(%err, "Cannot create merge target");
                tally.note(DiagnosticKind::StructuralVerificationFailed, "merge", err.to_string());
                return self.substitute(tally, Message::ProcessingError);
            }
        };

        for document in documents {
            self.append_document(document, &mut merged, &mut tally);
        }

        if tally.merged == 0 {
            warn!("No pages were merged, substituting diagnostic page");
            return self.substitute(tally, Message::NoPagesMerged);
        }

        let bytes = match self.codec.save(&mut merged) {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => {
                tally.note(
                    DiagnosticKind::StructuralVerificationFailed,
                    "merge",
                    "serialised output is empty",
                );
                return self.substitute(tally, Message::MergeVerificationFailed);
            }
            Err(err) => {
                tally.note(DiagnosticKind::StructuralVerificationFailed, "merge", err.to_string());
                return self.substitute(tally, Message::MergeVerificationFailed);
            }
        };

        match self.codec.verify(&bytes) {
            Ok(pages) if pages == tally.merged => {
                info!(
                    pages,
                    failed = tally.failed,
                    skipped = tally.skipped,
                    "Merge complete"
                );
                tally.into_result(bytes, false)
            }
            Ok(pages) => {
                tally.note(
                    DiagnosticKind::StructuralVerificationFailed,
                    "merge",
                    format!("expected {} pages, reloaded {pages}", tally.merged),
                );
                self.substitute(tally, Message::MergeVerificationFailed)
            }
            Err(err) => {
                error!(%err, "Merged PDF failed validation");
                tally.note(DiagnosticKind::StructuralVerificationFailed, "merge", err.to_string());
                self.substitute(tally, Message::MergeVerificationFailed)
            }
        }
    }

    fn append_document(&self, document: &PagedDocument, merged: &mut C::Handle, tally: &mut Tally) {
        let source = match self.load(&document.bytes) {
            Ok(source) => source,
            Err(err) => {
                warn!(source = %document.label, %err, "Skipping unloadable document");
                tally.skipped += 1;
                tally.note(DiagnosticKind::ConversionFailed, &document.label, err.to_string());
                return;
            }
        };

        let page_count = self.codec.page_count(&source);
        if page_count == 0 {
            warn!(source = %document.label, "Document has no pages");
            tally.skipped += 1;
            tally.note(
                DiagnosticKind::ConversionFailed,
                &document.label,
                "document has no pages",
            );
            return;
        }

        let all_pages: Vec<u32> = (1..=page_count as u32).collect();
        match self.codec.copy_pages(&source, merged, &all_pages) {
            Ok(()) => {
                debug!(source = %document.label, pages = page_count, "Bulk copy succeeded");
                tally.merged += page_count;
            }
            Err(err) => {
                warn!(source = %document.label, %err, "Bulk copy failed, copying page by page");
                for page in all_pages {
                    match self.codec.copy_pages(&source, merged, &[page]) {
                        Ok(()) => tally.merged += 1,
                        Err(err) => {
                            warn!(source = %document.label, page, %err, "Page copy failed");
                            tally.failed += 1;
                            tally.note(
                                DiagnosticKind::PageCopyFailed,
                                &document.label,
                                format!("page {page}: {err}"),
                            );
                        }
                    }
                }
            }
        }
    }

    /// Strict load, then one retry with the relaxed budget.
    fn load(&self, bytes: &[u8]) -> docmerger_core::error::Result<C::Handle> {
        self.codec.load(bytes).or_else(|err| {
            debug!(%err, "Strict load failed, retrying relaxed");
            self.codec
                .load_relaxed(bytes, self.config.relaxed_header_scan_bytes)
        })
    }

    fn substitute(&self, tally: Tally, message: Message) -> MergeResult {
        let diagnostic = diagnostic_pdf(message.text(self.config.locale), &self.config);
        tally.into_result(diagnostic.bytes, true)
    }
}

#[derive(Default)]
struct Tally {
    merged: usize,
    failed: usize,
    skipped: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Tally {
    fn note(&mut self, kind: DiagnosticKind, source: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(kind, source, message));
    }

    fn into_result(self, output_bytes: Vec<u8>, substituted: bool) -> MergeResult {
        MergeResult {
            output_bytes,
            total_pages_merged: self.merged,
            failed_page_count: self.failed,
            skipped_documents: self.skipped,
            substituted,
            diagnostics: self.diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::test_support::sample_pdf;
    use docmerger_core::error::{DocMergerError, Result};
    use lopdf::Document;

    fn paged(label: &str, markers: &[&str]) -> PagedDocument {
        PagedDocument::new(label, sample_pdf(markers), markers.len())
    }

    /// Wraps the real codec and injects failures.
    struct FlakyCodec {
        fail_bulk: bool,
        /// 1-indexed page numbers whose single-page copy fails.
        bad_pages: Vec<u32>,
        corrupt_save: bool,
    }

    impl PagedCodec for FlakyCodec {
        type Handle = Document;

        fn load(&self, bytes: &[u8]) -> Result<Document> {
            LopdfCodec.load(bytes)
        }
        fn load_relaxed(&self, bytes: &[u8], budget: usize) -> Result<Document> {
            LopdfCodec.load_relaxed(bytes, budget)
        }
        fn new_document(&self) -> Result<Document> {
            LopdfCodec.new_document()
        }
        fn page_count(&self, handle: &Document) -> usize {
            LopdfCodec.page_count(handle)
        }
        fn copy_pages(&self, source: &Document, target: &mut Document, pages: &[u32]) -> Result<()> {
            if self.fail_bulk && pages.len() > 1 {
                return Err(DocMergerError::PdfError("bulk copy refused".into()));
            }
            if let Some(page) = pages.iter().find(|p| self.bad_pages.contains(*p)) {
                return Err(DocMergerError::PageCopyFailed {
                    page: *page,
                    reason: "injected".into(),
                });
            }
            LopdfCodec.copy_pages(source, target, pages)
        }
        fn save(&self, handle: &mut Document) -> Result<Vec<u8>> {
            if self.corrupt_save {
                return Ok(b"%PDF-1.5 truncated".to_vec());
            }
            LopdfCodec.save(handle)
        }
        fn extract_text(&self, handle: &Document) -> Result<String> {
            LopdfCodec.extract_text(handle)
        }
    }

    fn page_texts(bytes: &[u8]) -> String {
        let codec = LopdfCodec;
        codec.extract_text(&codec.load(bytes).unwrap()).unwrap()
    }

    #[test]
    fn pages_keep_document_order() {
        let merger = StructuralMerger::with_config(MergeConfig::default());
        let result = merger.merge(&[paged("a.pdf", &["A1", "A2"]), paged("b.pdf", &["B1", "B2", "B3"])]);

        assert!(!result.substituted);
        assert_eq!(result.total_pages_merged, 5);
        assert_eq!(result.failed_page_count, 0);

        let text = page_texts(&result.output_bytes);
        let positions: Vec<usize> = ["A1", "A2", "B1", "B2", "B3"]
            .iter()
            .map(|m| text.find(m).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{text}");
    }

    #[test]
    fn bulk_failure_degrades_to_page_copies() {
        let codec = FlakyCodec {
            fail_bulk: true,
            bad_pages: vec![],
            corrupt_save: false,
        };
        let merger = StructuralMerger::new(codec, MergeConfig::default());
        let result = merger.merge(&[paged("a.pdf", &["A1", "A2"]), paged("b.pdf", &["B1", "B2", "B3"])]);

        assert!(!result.substituted);
        assert_eq!(result.total_pages_merged, 5);
        assert_eq!(LopdfCodec.verify(&result.output_bytes).unwrap(), 5);
    }

    #[test]
    fn bad_page_is_counted_not_fatal() {
        let codec = FlakyCodec {
            fail_bulk: true,
            bad_pages: vec![2],
            corrupt_save: false,
        };
        let merger = StructuralMerger::new(codec, MergeConfig::default());
        let result = merger.merge(&[paged("a.pdf", &["A1", "A2"]), paged("b.pdf", &["B1", "B2", "B3"])]);

        assert_eq!(result.total_pages_merged, 3);
        assert_eq!(result.failed_page_count, 2);
        assert_eq!(result.total_pages_merged + result.failed_page_count, 5);
        assert_eq!(
            result
                .diagnostics
                .iter()
                .filter(|d| d.kind == DiagnosticKind::PageCopyFailed)
                .count(),
            2
        );
        let text = page_texts(&result.output_bytes);
        assert!(text.contains("A1") && text.contains("B3") && !text.contains("A2"));
    }

    #[test]
    fn unloadable_documents_are_skipped_without_touching_the_tally() {
        let merger = StructuralMerger::with_config(MergeConfig::default());
        let garbage = PagedDocument::new("corrupt.pdf", b"garbage bytes".to_vec(), 0);
        let result = merger.merge(&[garbage, paged("a.pdf", &["A1", "A2"])]);

        assert!(!result.substituted);
        assert_eq!(result.skipped_documents, 1);
        assert_eq!(result.total_pages_merged + result.failed_page_count, 2);
    }

    #[test]
    fn nothing_merged_yields_diagnostic_page() {
        let merger = StructuralMerger::with_config(MergeConfig::default());
        let garbage = PagedDocument::new("corrupt.pdf", b"garbage bytes".to_vec(), 0);
        let result = merger.merge(&[garbage]);

        assert!(result.substituted);
        assert_eq!(result.total_pages_merged, 0);
        assert_eq!(LopdfCodec.verify(&result.output_bytes).unwrap(), 1);
    }

    #[test]
    fn empty_input_yields_diagnostic_page() {
        let merger = StructuralMerger::with_config(MergeConfig::default());
        let result = merger.merge(&[]);
        assert!(result.substituted);
        assert_eq!(LopdfCodec.verify(&result.output_bytes).unwrap(), 1);
    }

    #[test]
    fn verification_failure_is_substituted() {
        let codec = FlakyCodec {
            fail_bulk: false,
            bad_pages: vec![],
            corrupt_save: true,
        };
        let merger = StructuralMerger::new(codec, MergeConfig::default());
        let result = merger.merge(&[paged("a.pdf", &["A1", "A2"])]);

        assert!(result.substituted);
        assert_eq!(result.total_pages_merged, 2);
        assert_eq!(result.failed_page_count, 0);
        assert!(
            result
                .diagnostics
                .iter()
                .any(|d| d.kind == DiagnosticKind::StructuralVerificationFailed)
        );
        assert_eq!(LopdfCodec.verify(&result.output_bytes).unwrap(), 1);
    }

    #[test]
    fn prefixed_junk_is_tolerated_by_the_relaxed_retry() {
        let mut bytes = b"\xEF\xBB\xBF junk ".to_vec();
        bytes.extend(sample_pdf(&["X1", "X2"]));
        let merger = StructuralMerger::with_config(MergeConfig::default());
        let result = merger.merge(&[PagedDocument::new("prefixed.pdf", bytes, 2)]);

        assert!(!result.substituted);
        assert_eq!(result.total_pages_merged, 2);
    }
}
