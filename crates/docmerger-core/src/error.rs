// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for DocMerger.
//
// Every variant except `OutputConstructionFailed` is absorbed inside the
// pipeline and turned into a `Diagnostic` plus degraded output.

use thiserror::Error;

use crate::types::DiagnosticKind;

/// Top-level error type for all DocMerger operations.
#[derive(Debug, Error)]
pub enum DocMergerError {
    // -- Input errors --
    #[error("input unreadable: {0}")]
    InputUnreadable(String),

    #[error("unsupported document type: {0}")]
    UnsupportedDocument(String),

    // -- Stage errors --
    #[error("conversion of {source_name} failed: {reason}")]
    ConversionFailed { source_name: String, reason: String },

    #[error("copying page {page} failed: {reason}")]
    PageCopyFailed { page: u32, reason: String },

    #[error("structural verification failed: {0}")]
    StructuralVerificationFailed(String),

    #[error("could not construct any output document: {0}")]
    OutputConstructionFailed(String),

    // -- Codec errors --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("flow document operation failed: {0}")]
    FlowDocument(String),

    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error("background task failed: {0}")]
    Task(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DocMergerError {
    /// The diagnostic bucket this error is reported under when it is absorbed.
    pub fn diagnostic_kind(&self) -> DiagnosticKind {
        match self {
            Self::InputUnreadable(_) | Self::Io(_) => DiagnosticKind::InputUnreadable,
            Self::PageCopyFailed { .. } => DiagnosticKind::PageCopyFailed,
            Self::StructuralVerificationFailed(_) | Self::OutputConstructionFailed(_) => {
                DiagnosticKind::StructuralVerificationFailed
            }
            Self::UnsupportedDocument(_)
            | Self::ConversionFailed { .. }
            | Self::PdfError(_)
            | Self::ImageError(_)
            | Self::FlowDocument(_)
            | Self::Extraction(_)
            | Self::Task(_)
            | Self::Serialization(_) => DiagnosticKind::ConversionFailed,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocMergerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_count_as_unreadable_input() {
        let err = DocMergerError::from(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "gone",
        ));
        assert_eq!(err.diagnostic_kind(), DiagnosticKind::InputUnreadable);
    }

    #[test]
    fn codec_errors_count_as_conversion_failures() {
        let err = DocMergerError::PdfError("bad xref".into());
        assert_eq!(err.diagnostic_kind(), DiagnosticKind::ConversionFailed);
    }

    #[test]
    fn conversion_message_names_the_source() {
        let err = DocMergerError::ConversionFailed {
            source_name: "report.docx".into(),
            reason: "zip header missing".into(),
        };
        assert_eq!(
            err.to_string(),
            "conversion of report.docx failed: zip header missing"
        );
    }
}
