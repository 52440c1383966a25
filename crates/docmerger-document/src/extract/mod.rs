// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text extractor — best-effort plain text from any classified kind.
//
// Paged inputs are read through the paged codec, DOCX through docx-rs, and
// every other kind through a `GenericTextExtractor`. Public entry points
// never fail: errors become a bracketed placeholder naming the source.

pub mod generic;

use docmerger_core::error::{DocMergerError, Result};
use docmerger_core::{ExtractedText, Kind, MergeConfig, TargetKind};
use tracing::{debug, instrument, warn};

use crate::pdf::codec::{LopdfCodec, PagedCodec};
pub use generic::{ContainerTextExtractor, GenericTextExtractor};

/// Outcome of one extraction attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Non-blank text was found.
    Extracted(ExtractedText),
    /// The input was read but holds no text.
    Empty,
    /// The input could not be read; the reason is kept for diagnostics.
    Failed(String),
}

impl Extraction {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Placeholder for an input that was read but yielded no text.
pub fn empty_placeholder(source_label: &str, target: TargetKind) -> String {
    match target {
        TargetKind::Paged => format!("[Empty document: {source_label}]"),
        TargetKind::FlowDocument => "[No text could be extracted from this document]".to_string(),
    }
}

/// Placeholder for an input whose extraction failed.
pub fn error_placeholder(source_label: &str) -> String {
    format!("[Error extracting text from: {source_label}]")
}

/// Dispatches extraction by kind.
pub struct Extractor<G: GenericTextExtractor = ContainerTextExtractor> {
    generic: G,
    codec: LopdfCodec,
    relaxed_budget: usize,
}

impl Extractor<ContainerTextExtractor> {
    pub fn new(config: &MergeConfig) -> Self {
        Self::with_generic(ContainerTextExtractor, config)
    }
}

impl<G: GenericTextExtractor> Extractor<G> {
    pub fn with_generic(generic: G, config: &MergeConfig) -> Self {
        Self {
            generic,
            codec: LopdfCodec,
            relaxed_budget: config.relaxed_header_scan_bytes,
        }
    }

    /// Plain text of `bytes`; never fails. Empty input gives `""`, failures
    /// give the error placeholder.
    pub fn extract(&self, source_label: &str, bytes: &[u8], kind: Kind) -> ExtractedText {
        match self.attempt(source_label, bytes, kind) {
            Extraction::Extracted(text) => text,
            Extraction::Empty => ExtractedText::new(source_label, ""),
            Extraction::Failed(_) => ExtractedText::new(source_label, error_placeholder(source_label)),
        }
    }

    /// Extract and report whether the input was empty or unreadable.
    #[instrument(skip(self, bytes), fields(bytes_len = bytes.len()))]
    pub fn attempt(&self, source_label: &str, bytes: &[u8], kind: Kind) -> Extraction {
        let result = match kind {
            Kind::Paged => self.paged_text(bytes),
            Kind::FlowText => self.flow_text(bytes),
            Kind::Presentation | Kind::Tabular | Kind::Image | Kind::PlainText | Kind::Unknown => {
                self.generic.extract_text(bytes, kind)
            }
        };

        match result {
            Ok(text) if text.trim().is_empty() => {
                debug!(source = source_label, "No text found");
                Extraction::Empty
            }
            Ok(text) => {
                let text = text.trim_end().to_string();
                debug!(source = source_label, chars = text.chars().count(), "Text extracted");
                Extraction::Extracted(ExtractedText::new(source_label, text))
            }
            Err(err) => {
                warn!(source = source_label, %kind, %err, "Text extraction failed");
                Extraction::Failed(err.to_string())
            }
        }
    }

    fn paged_text(&self, bytes: &[u8]) -> Result<String> {
        let document = self
            .codec
            .load(bytes)
            .or_else(|_| self.codec.load_relaxed(bytes, self.relaxed_budget))?;
        self.codec.extract_text(&document)
    }

    /// DOCX through docx-rs; anything else (ODT, RTF) or a DOCX docx-rs
    /// cannot parse goes to the generic extractor.
    fn flow_text(&self, bytes: &[u8]) -> Result<String> {
        match docx_text(bytes) {
            Ok(text) => Ok(text),
            Err(err) => {
                debug!(%err, "Not a readable DOCX, trying generic extraction");
                self.generic.extract_text(bytes, Kind::FlowText)
            }
        }
    }
}

/// Paragraphs become lines; table rows become " | "-joined cell lines.
fn docx_text(bytes: &[u8]) -> Result<String> {
    let docx = docx_rs::read_docx(bytes)
        .map_err(|err| DocMergerError::Extraction(format!("failed to parse DOCX: {err}")))?;

    let mut lines: Vec<String> = Vec::new();
    for child in &docx.document.children {
        match child {
            docx_rs::DocumentChild::Paragraph(paragraph) => {
                lines.push(paragraph_text(paragraph));
            }
            docx_rs::DocumentChild::Table(table) => {
                for row in &table.rows {
                    let docx_rs::TableChild::TableRow(row) = row;
                    let cells: Vec<String> = row
                        .cells
                        .iter()
                        .map(|cell| {
                            let docx_rs::TableRowChild::TableCell(cell) = cell;
                            cell.children
                                .iter()
                                .filter_map(|content| match content {
                                    docx_rs::TableCellContent::Paragraph(p) => Some(paragraph_text(p)),
                                    _ => None,
                                })
                                .collect::<Vec<_>>()
                                .join(" ")
                        })
                        .collect();
                    lines.push(cells.join(" | "));
                }
            }
            _ => {}
        }
    }
    Ok(lines.join("\n"))
}

fn paragraph_text(paragraph: &docx_rs::Paragraph) -> String {
    let mut text = String::new();
    for child in &paragraph.children {
        match child {
            docx_rs::ParagraphChild::Run(run) => push_run_text(run, &mut text),
            docx_rs::ParagraphChild::Hyperlink(link) => {
                for inner in &link.children {
                    if let docx_rs::ParagraphChild::Run(run) = inner {
                        push_run_text(run, &mut text);
                    }
                }
            }
            _ => {}
        }
    }
    text
}

fn push_run_text(run: &docx_rs::Run, out: &mut String) {
    for child in &run.children {
        if let docx_rs::RunChild::Text(t) = child {
            out.push_str(&t.text);
        }
    }
}
