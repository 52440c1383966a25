// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Any-to-paged conversion for kinds without a dedicated renderer.
//
// The pipeline tries this converter before falling back to extract + render
// for presentations, spreadsheets and images. The built-in converter places
// raster images on a page and declines everything else, which sends those
// kinds down the text path.

use std::sync::Arc;

use docmerger_core::error::{DocMergerError, Result};
use docmerger_core::{Kind, PaperSize};
use tracing::{debug, info};

use crate::pdf::writer::PdfWriter;

/// Converts native bytes of a given kind straight into PDF bytes.
pub trait PagedConverter: Send + Sync {
    fn convert_to_paged(&self, bytes: &[u8], kind: Kind) -> Result<Vec<u8>>;
}

impl<T: PagedConverter + ?Sized> PagedConverter for Arc<T> {
    fn convert_to_paged(&self, bytes: &[u8], kind: Kind) -> Result<Vec<u8>> {
        (**self).convert_to_paged(bytes, kind)
    }
}

/// `PagedConverter` that embeds images and declines other kinds.
#[derive(Debug, Clone, Copy)]
pub struct ImagePageConverter {
    paper_size: PaperSize,
}

impl Default for ImagePageConverter {
    fn default() -> Self {
        Self::new(PaperSize::A4)
    }
}

impl ImagePageConverter {
    pub fn new(paper_size: PaperSize) -> Self {
        Self { paper_size }
    }
}

impl PagedConverter for ImagePageConverter {
    fn convert_to_paged(&self, bytes: &[u8], kind: Kind) -> Result<Vec<u8>> {
        match kind {
            Kind::Image => {
                info!(bytes_len = bytes.len(), "Embedding image on a page");
                PdfWriter::new(self.paper_size).create_from_image(bytes)
            }
            Kind::Paged
            | Kind::FlowText
            | Kind::Presentation
            | Kind::Tabular
            | Kind::PlainText
            | Kind::Unknown => {
                debug!(%kind, "No direct paged conversion");
                Err(DocMergerError::UnsupportedDocument(format!(
                    "no direct conversion from {kind} to PDF"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::codec::{LopdfCodec, PagedCodec};

    #[test]
    fn images_become_one_page() {
        let img = ::image::RgbImage::from_pixel(8, 8, ::image::Rgb([0, 0, 255]));
        let mut png = Vec::new();
        ::image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), ::image::ImageFormat::Png)
            .unwrap();

        let bytes = ImagePageConverter::default()
            .convert_to_paged(&png, Kind::Image)
            .unwrap();
        assert_eq!(LopdfCodec.verify(&bytes).unwrap(), 1);
    }

    #[test]
    fn other_kinds_are_declined() {
        let err = ImagePageConverter::default()
            .convert_to_paged(b"a,b", Kind::Tabular)
            .unwrap_err();
        assert!(matches!(err, DocMergerError::UnsupportedDocument(_)));
    }
}
