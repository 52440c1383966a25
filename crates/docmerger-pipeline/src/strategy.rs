// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ordered strategy chains for turning one input into a paged document.
//
// Each kind has a fixed list of strategies. The driver tries them in order
// and stops at the first success; a converter declining a kind is not a
// failure, anything else is recorded.

use std::fmt;
use std::sync::Arc;

use docmerger_core::error::{DocMergerError, Result};
use docmerger_core::{Diagnostic, DiagnosticKind, Kind, MergeConfig, PagedDocument, TargetKind};
use docmerger_document::extract::{Extraction, Extractor, GenericTextExtractor, empty_placeholder};
use docmerger_document::{LopdfCodec, PagedCodec, PagedConverter, PaginatedRenderer};
use tracing::{debug, warn};

/// One way of producing a paged document from an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagedStrategy {
    /// Already paged: handed to the merger unchanged.
    Passthrough,
    /// The any-to-paged converter.
    DirectConversion,
    /// Extract text, then paginate it.
    ExtractAndRender,
}

impl PagedStrategy {
    pub fn chain(kind: Kind) -> &'static [PagedStrategy] {
        match kind {
            Kind::Paged => &[Self::Passthrough],
            Kind::FlowText | Kind::PlainText | Kind::Unknown => &[Self::ExtractAndRender],
            Kind::Presentation | Kind::Tabular | Kind::Image => {
                &[Self::DirectConversion, Self::ExtractAndRender]
            }
        }
    }
}

impl fmt::Display for PagedStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Passthrough => "passthrough",
            Self::DirectConversion => "direct conversion",
            Self::ExtractAndRender => "extract and render",
        })
    }
}

/// Result of running a chain: the winning strategy and value, if any, plus
/// every failure met on the way.
pub struct ChainOutcome<S, T> {
    pub winner: Option<(S, T)>,
    pub failures: Vec<(S, DocMergerError)>,
}

/// Try `strategies` in order until one succeeds.
pub fn first_success<S: Copy, T>(
    strategies: &[S],
    mut attempt: impl FnMut(S) -> Result<T>,
) -> ChainOutcome<S, T> {
    let mut failures = Vec::new();
    for &strategy in strategies {
        match attempt(strategy) {
            Ok(value) => {
                return ChainOutcome {
                    winner: Some((strategy, value)),
                    failures,
                };
            }
            Err(err) => failures.push((strategy, err)),
        }
    }
    ChainOutcome {
        winner: None,
        failures,
    }
}

/// Converted input: the document to merge (if any) and what went wrong.
#[derive(Debug)]
pub struct ConversionOutcome {
    pub document: Option<PagedDocument>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs the paged strategy chain for single inputs.
pub struct PagedConversion {
    extractor: Extractor<Arc<dyn GenericTextExtractor>>,
    renderer: PaginatedRenderer,
    converter: Arc<dyn PagedConverter>,
}

impl PagedConversion {
    pub fn new(
        config: &MergeConfig,
        generic: Arc<dyn GenericTextExtractor>,
        converter: Arc<dyn PagedConverter>,
    ) -> Self {
        Self {
            extractor: Extractor::with_generic(generic, config),
            renderer: PaginatedRenderer::new(config.clone()),
            converter,
        }
    }

    pub fn convert(&self, label: &str, bytes: Vec<u8>, kind: Kind) -> ConversionOutcome {
        let mut bytes = Some(bytes);
        let outcome = first_success(PagedStrategy::chain(kind), |strategy| {
            debug!(source = label, %strategy, "Trying strategy");
            match strategy {
                PagedStrategy::Passthrough => Ok(PagedDocument::new(label, bytes.take().unwrap_or_default(), 0)),
                PagedStrategy::DirectConversion => {
                    self.direct(bytes.as_deref().unwrap_or_default(), kind, label)
                }
                PagedStrategy::ExtractAndRender => {
                    self.extract_and_render(bytes.as_deref().unwrap_or_default(), kind, label)
                }
            }
        });

        let mut diagnostics: Vec<Diagnostic> = outcome
            .failures
            .iter()
            .filter(|(_, err)| !matches!(err, DocMergerError::UnsupportedDocument(_)))
            .map(|(strategy, err)| {
                warn!(source = label, %strategy, %err, "Strategy failed");
                Diagnostic::new(err.diagnostic_kind(), label, format!("{strategy}: {err}"))
            })
            .collect();

        match outcome.winner {
            Some((strategy, document)) => {
                if document.diagnostic {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::ConversionFailed,
                        label,
                        format!("{strategy} produced a diagnostic page"),
                    ));
                }
                ConversionOutcome {
                    document: Some(document),
                    diagnostics,
                }
            }
            None => {
                if diagnostics.is_empty() {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::ConversionFailed,
                        label,
                        format!("no strategy could convert {kind} input"),
                    ));
                }
                ConversionOutcome {
                    document: None,
                    diagnostics,
                }
            }
        }
    }

    fn direct(&self, bytes: &[u8], kind: Kind, label: &str) -> Result<PagedDocument> {
        let converted = self.converter.convert_to_paged(bytes, kind)?;
        let page_count = LopdfCodec.verify(&converted)?;
        Ok(PagedDocument::new(label, converted, page_count))
    }

    fn extract_and_render(&self, bytes: &[u8], kind: Kind, label: &str) -> Result<PagedDocument> {
        let text = match self.extractor.attempt(label, bytes, kind) {
            Extraction::Extracted(extracted) => extracted.text,
            Extraction::Empty => empty_placeholder(label, TargetKind::Paged),
            Extraction::Failed(reason) => {
                return Err(DocMergerError::ConversionFailed {
                    source_name: label.to_string(),
                    reason,
                });
            }
        };
        Ok(self.renderer.render(&text, label))
    }
}
