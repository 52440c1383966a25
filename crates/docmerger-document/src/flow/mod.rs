// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Flow-document composer — extracted text to a reflowable document.
//
// `compose` is a pure builder over paragraph values; `FlowComposer` encodes
// the result through a `FlowCodec`, re-loads it, and falls back to a
// one-paragraph error document when either step fails.

pub mod docx;

use docmerger_core::bidi::contains_rtl;
use docmerger_core::error::{DocMergerError, Result};
use docmerger_core::messages::{Locale, Message};
use docmerger_core::{ExtractedText, MergeConfig};
use tracing::{error, info, instrument, warn};

pub use docx::{DocxCodec, FlowCodec};

/// Writing direction of a paragraph or a whole document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextDirection {
    #[default]
    LeftToRight,
    RightToLeft,
}

impl TextDirection {
    /// Right-to-left when `text` holds any Hebrew or Arabic letter.
    pub fn of(text: &str) -> Self {
        if contains_rtl(text) {
            Self::RightToLeft
        } else {
            Self::LeftToRight
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowParagraph {
    pub text: String,
    pub direction: TextDirection,
    pub bold: bool,
}

impl FlowParagraph {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            direction: TextDirection::of(&text),
            text,
            bold: false,
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }
}

/// Ordered paragraphs plus the document's base writing direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowDocument {
    pub paragraphs: Vec<FlowParagraph>,
    pub base_direction: TextDirection,
}

impl FlowDocument {
    /// The base direction is right-to-left if any paragraph is. An empty
    /// list becomes a single empty paragraph.
    pub fn from_paragraphs(mut paragraphs: Vec<FlowParagraph>) -> Self {
        if paragraphs.is_empty() {
            paragraphs.push(FlowParagraph::new(""));
        }
        let base_direction = if paragraphs
            .iter()
            .any(|p| p.direction == TextDirection::RightToLeft)
        {
            TextDirection::RightToLeft
        } else {
            TextDirection::LeftToRight
        };
        Self {
            paragraphs,
            base_direction,
        }
    }

    /// A bold message, optionally followed by a plain detail paragraph.
    pub fn diagnostic(message: &str, detail: Option<&str>) -> Self {
        let mut paragraphs = vec![FlowParagraph::new(message).bold()];
        if let Some(detail) = detail.filter(|d| !d.trim().is_empty()) {
            paragraphs.push(FlowParagraph::new(detail));
        }
        Self::from_paragraphs(paragraphs)
    }
}

/// One paragraph per non-blank line. With several sources, each source's
/// lines follow a bold "=== label ===" header.
pub fn compose(sources: &[ExtractedText]) -> FlowDocument {
    let with_headers = sources.len() > 1;
    let mut paragraphs = Vec::new();
    for source in sources {
        if with_headers {
            paragraphs.push(FlowParagraph::new(format!("=== {} ===", source.source_label)).bold());
        }
        paragraphs.extend(
            source
                .text
                .lines()
                .map(str::trim_end)
                .filter(|line| !line.trim().is_empty())
                .map(FlowParagraph::new),
        );
    }
    FlowDocument::from_paragraphs(paragraphs)
}

/// Encoded flow output.
#[derive(Debug, Clone)]
pub struct ComposedFlow {
    pub bytes: Vec<u8>,
    pub paragraphs: usize,
    /// The error document replaced the composed one.
    pub substituted: bool,
    /// Why the composed document was replaced.
    pub failure: Option<String>,
}

/// Composes, encodes and verifies flow documents.
pub struct FlowComposer<F: FlowCodec = DocxCodec> {
    codec: F,
    locale: Locale,
}

impl FlowComposer<DocxCodec> {
    pub fn new(config: &MergeConfig) -> Self {
        Self::with_codec(DocxCodec::new(config.paper_size), config)
    }
}

impl<F: FlowCodec> FlowComposer<F> {
    pub fn with_codec(codec: F, config: &MergeConfig) -> Self {
        Self {
            codec,
            locale: config.locale,
        }
    }

    /// Compose `sources` into verified document bytes. Falls back to a
    /// one-paragraph error document; only if that also fails is an
    /// `OutputConstructionFailed` error returned.
    #[instrument(skip_all, fields(sources = sources.len()))]
    pub fn compose(&self, sources: &[ExtractedText]) -> Result<ComposedFlow> {
        let document = compose(sources);
        match self.build(&document) {
            Ok(bytes) => {
                info!(paragraphs = document.paragraphs.len(), rtl = ?document.base_direction, "Flow document composed");
                Ok(ComposedFlow {
                    bytes,
                    paragraphs: document.paragraphs.len(),
                    substituted: false,
                    failure: None,
                })
            }
            Err(err) => {
                warn!(%err, "Flow document construction failed, using error document");
                let fallback =
                    FlowDocument::diagnostic(Message::DocumentCreationFailed.text(self.locale), None);
                let bytes = self.build(&fallback).map_err(|fallback_err| {
                    error!(%fallback_err, "Error document could not be built either");
                    DocMergerError::OutputConstructionFailed(format!(
                        "{err}; fallback: {fallback_err}"
                    ))
                })?;
                Ok(ComposedFlow {
                    bytes,
                    paragraphs: fallback.paragraphs.len(),
                    substituted: true,
                    failure: Some(err.to_string()),
                })
            }
        }
    }

    /// Verified bytes of a diagnostic document. Failure here is fatal.
    pub fn diagnostic(&self, message: Message, detail: Option<&str>) -> Result<Vec<u8>> {
        let document = FlowDocument::diagnostic(message.text(self.locale), detail);
        self.build(&document)
            .map_err(|err| DocMergerError::OutputConstructionFailed(err.to_string()))
    }

    fn build(&self, document: &FlowDocument) -> Result<Vec<u8>> {
        let bytes = self.codec.encode(document)?;
        let reloaded = self.codec.verify(&bytes)?;
        if reloaded < document.paragraphs.len() {
            return Err(DocMergerError::StructuralVerificationFailed(format!(
                "wrote {} paragraphs, reloaded {reloaded}",
                document.paragraphs.len()
            )));
        }
        Ok(bytes)
    }
}
