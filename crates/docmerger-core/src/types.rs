// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the DocMerger pipeline.

use serde::{Deserialize, Serialize};

use crate::bidi::contains_rtl;

/// Semantic kind of an input file, decided once by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    /// Already in the canonical paged format (PDF).
    Paged,
    /// Word-processor document (DOCX, DOC, RTF, ODT).
    FlowText,
    /// Slide deck (PPTX, PPT, ODP).
    Presentation,
    /// Spreadsheet or CSV.
    Tabular,
    /// Raster image.
    Image,
    /// Plain text.
    PlainText,
    /// Nothing matched.
    Unknown,
}

impl Kind {
    /// Short lowercase label for logs and diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Paged => "paged",
            Self::FlowText => "flow-text",
            Self::Presentation => "presentation",
            Self::Tabular => "tabular",
            Self::Image => "image",
            Self::PlainText => "plain-text",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The canonical output format a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    /// Paged binary document (PDF).
    Paged,
    /// Reflowable document (DOCX).
    FlowDocument,
}

impl TargetKind {
    /// MIME type of the produced bytes.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Paged => "application/pdf",
            Self::FlowDocument => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }

    /// File extension (without the dot) of the produced bytes.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Paged => "pdf",
            Self::FlowDocument => "docx",
        }
    }
}

impl std::str::FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pdf" | "paged" => Ok(Self::Paged),
            "docx" | "flow" | "flowdocument" => Ok(Self::FlowDocument),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// Standard paper sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperSize {
    A4,
    A5,
    Letter,
    Legal,
    Custom { width_mm: u32, height_mm: u32 },
}

impl PaperSize {
    /// Dimensions in millimetres (width, height).
    pub fn dimensions_mm(&self) -> (u32, u32) {
        match self {
            Self::A4 => (210, 297),
            Self::A5 => (148, 210),
            Self::Letter => (216, 279),
            Self::Legal => (216, 356),
            Self::Custom {
                width_mm,
                height_mm,
            } => (*width_mm, *height_mm),
        }
    }

    /// Dimensions in PDF points (1pt = 1/72in).
    pub fn dimensions_pt(&self) -> (f32, f32) {
        let (w, h) = self.dimensions_mm();
        (w as f32 * 72.0 / 25.4, h as f32 * 72.0 / 25.4)
    }
}

/// A document in the canonical paged format, plus its page count.
///
/// Produced by the renderer or taken directly from an already-paged input;
/// `page_count` stays 0 for passthrough inputs until the merger loads them.
/// `diagnostic` is set when the bytes are a substituted explanation page
/// rather than the real content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedDocument {
    pub label: String,
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub diagnostic: bool,
}

impl PagedDocument {
    pub fn new(label: impl Into<String>, bytes: Vec<u8>, page_count: usize) -> Self {
        Self {
            label: label.into(),
            bytes,
            page_count,
            diagnostic: false,
        }
    }

    /// Mark this document as a substituted diagnostic page.
    pub fn into_diagnostic(mut self) -> Self {
        self.diagnostic = true;
        self
    }
}

/// Plain text pulled out of one (or several) inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub source_label: String,
    pub text: String,
    pub contains_bidi_script: bool,
}

impl ExtractedText {
    pub fn new(source_label: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let contains_bidi_script = contains_rtl(&text);
        Self {
            source_label: source_label.into(),
            text,
            contains_bidi_script,
        }
    }
}

/// Page tallies of one structural merge.
///
/// `total_pages_merged + failed_page_count` equals the summed page count of
/// every source that loaded; unloadable sources only bump
/// `skipped_documents`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    pub total_pages_merged: usize,
    pub failed_page_count: usize,
    pub skipped_documents: usize,
}

/// Output of the structural merger.
#[derive(Debug, Clone)]
pub struct MergeResult {
    pub output_bytes: Vec<u8>,
    pub total_pages_merged: usize,
    pub failed_page_count: usize,
    pub skipped_documents: usize,
    /// True when `output_bytes` is a diagnostic page instead of the merge.
    /// The page tallies still describe what the merge copied.
    pub substituted: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl MergeResult {
    pub fn stats(&self) -> MergeStats {
        MergeStats {
            total_pages_merged: self.total_pages_merged,
            failed_page_count: self.failed_page_count,
            skipped_documents: self.skipped_documents,
        }
    }
}

/// Non-fatal error taxonomy recorded on the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// Missing or zero-length input; skipped.
    InputUnreadable,
    /// Classifier fell back to `Kind::Unknown`.
    ClassificationAmbiguous,
    /// One file could not be converted; excluded.
    ConversionFailed,
    /// One page could not be copied during merge.
    PageCopyFailed,
    /// The assembled output did not re-load; substituted.
    StructuralVerificationFailed,
}

/// A single absorbed failure, kept for the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Name of the input (or stage) the failure belongs to.
    pub source: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            message: message.into(),
        }
    }

    /// Whether this diagnostic means some content is missing from the output.
    pub fn loses_content(&self) -> bool {
        !matches!(self.kind, DiagnosticKind::ClassificationAmbiguous)
    }
}

/// Overall result tag of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// Every input made it into the output.
    Success,
    /// Output is real content but something was skipped or failed.
    PartialSuccess,
    /// A diagnostic document was substituted for the whole output.
    Fallback,
}

/// Pipeline state machine positions. `Done` is the only terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Init,
    Classified,
    Extracted,
    Converted,
    /// Pages merged (paged target) or paragraphs composed (flow target).
    Merged,
    Verified,
    Fallback,
    Done,
}

/// What a run hands back to the caller.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub status: Status,
    pub target: TargetKind,
    /// Never empty; always loadable as `target`.
    pub output_bytes: Vec<u8>,
    pub diagnostics: Vec<Diagnostic>,
    pub merge: Option<MergeStats>,
    /// Last stage reached before `Done`; `Fallback` when the whole output
    /// is a diagnostic document.
    pub last_stage: Stage,
}
