// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — codec, layout, rendering, merging, and diagnostic pages.

pub mod codec;
pub mod diagnostic;
pub mod layout;
pub mod merge;
pub mod render;
pub mod writer;

#[cfg(test)]
pub(crate) mod test_support;

pub use codec::{LopdfCodec, PagedCodec};
pub use diagnostic::diagnostic_pdf;
pub use merge::StructuralMerger;
pub use render::PaginatedRenderer;
pub use writer::{PdfWriter, UnicodeFont};
