// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docmerger-document — Document processing for the DocMerger pipeline.
//
// Provides format classification, text extraction, PDF rendering, merging and
// diagnostic pages, flow-document (DOCX) composition, and direct any-to-PDF
// conversion for images.

pub mod classify;
pub mod convert;
pub mod extract;
pub mod flow;
pub mod pdf;

// Re-export the primary entry points so callers can use `docmerger_document::StructuralMerger` etc.
pub use classify::classify;
pub use convert::{ImagePageConverter, PagedConverter};
pub use extract::{ContainerTextExtractor, Extraction, Extractor, GenericTextExtractor};
pub use flow::{DocxCodec, FlowCodec, FlowComposer, FlowDocument};
pub use pdf::{LopdfCodec, PagedCodec, PaginatedRenderer, PdfWriter, StructuralMerger};
