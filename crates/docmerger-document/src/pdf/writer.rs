// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer — serialise laid-out pages or raster images using `printpdf` 0.8.
//
// Text goes out in built-in Helvetica (WinAnsi) unless a line holds
// characters WinAnsi cannot encode and a Unicode font is configured; such
// lines are written with the embedded font in display order. Without a font
// those characters become `?`.

use std::path::Path;
use std::sync::Arc;

use docmerger_core::bidi::{is_bidi_mark, visual_order};
use docmerger_core::error::{DocMergerError, Result};
use docmerger_core::{MergeConfig, PaperSize};
use printpdf::{
    BuiltinFont, FontId, Mm, Op, ParsedFont, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg,
    Point, Pt, RawImage, RawImageData, RawImageFormat, TextItem, XObjectTransform,
};
use tracing::{debug, info, instrument, warn};

use super::layout::{PageLayout, PlacedLine};

/// Windows-1252 characters outside Latin-1 that WinAnsi still encodes.
const CP1252_EXTRAS: [char; 27] = [
    '\u{20AC}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{017D}', '\u{2018}',
    '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}', '\u{02DC}',
    '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{017E}', '\u{0178}',
];

/// TrueType/OpenType font data for text outside WinAnsi. Holds the raw
/// bytes, checked once, and parses them per document written.
#[derive(Debug, Clone)]
pub struct UnicodeFont(Arc<[u8]>);

impl UnicodeFont {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let font = Self(Arc::from(bytes));
        font.parse()?;
        Ok(font)
    }

    fn parse(&self) -> Result<ParsedFont> {
        let mut warnings = Vec::new();
        ParsedFont::from_bytes(&self.0, 0, &mut warnings)
            .ok_or_else(|| DocMergerError::PdfError("font data could not be parsed".into()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// The font named by `config`, if any. A font that fails to load is
    /// logged and ignored.
    pub fn from_config(config: &MergeConfig) -> Option<Self> {
        let path = config.unicode_font.as_deref()?;
        match Self::load(path) {
            Ok(font) => Some(font),
            Err(err) => {
                warn!(path = %path.display(), %err, "Unicode font unavailable, non-WinAnsi text prints as ?");
                None
            }
        }
    }
}

/// Creates new PDF documents from page layouts or raster images.
pub struct PdfWriter {
    /// Paper size for page creation.
    paper_size: PaperSize,
    /// Title metadata embedded in the PDF /Info dictionary.
    title: Option<String>,
    unicode_font: Option<UnicodeFont>,
}

impl PdfWriter {
    pub fn new(paper_size: PaperSize) -> Self {
        Self {
            paper_size,
            title: None,
            unicode_font: None,
        }
    }

    pub fn a4() -> Self {
        Self::new(PaperSize::A4)
    }

    /// Set a title for the PDF metadata.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Embed `font` for lines Helvetica cannot encode.
    pub fn with_unicode_font(mut self, font: Option<UnicodeFont>) -> Self {
        self.unicode_font = font;
        self
    }

    /// Paper dimensions in printpdf's Mm units.
    fn page_dimensions(&self) -> (Mm, Mm) {
        let (w_mm, h_mm) = self.paper_size.dimensions_mm();
        (Mm(w_mm as f32), Mm(h_mm as f32))
    }

    // -- Layout to PDF --------------------------------------------------------

    /// Serialise laid-out pages, one PDF page per `PageLayout`, footers
    /// included. An empty slice still produces one blank page.
    #[instrument(skip_all, fields(pages = pages.len()))]
    pub fn write_layout(&self, pages: &[PageLayout]) -> Vec<u8> {
        let (page_w, page_h) = self.page_dimensions();
        let title = self.title.as_deref().unwrap_or("DocMerger Document");

        let mut doc = PdfDocument::new(title);
        let needs_font = pages
            .iter()
            .flat_map(|page| page.lines.iter())
            .any(|line| !is_win_ansi(&line.text));
        let font_id = match &self.unicode_font {
            Some(font) if needs_font => match font.parse() {
                Ok(parsed) => Some(doc.add_font(&parsed)),
                Err(err) => {
                    warn!(%err, "Unicode font not embedded");
                    None
                }
            },
            _ => None,
        };

        let mut pdf_pages: Vec<PdfPage> = pages
            .iter()
            .map(|page| {
                let mut ops: Vec<Op> = Vec::new();
                for line in page.lines.iter().chain(page.footer.iter()) {
                    push_text_ops(&mut ops, line, font_id.as_ref());
                }
                PdfPage::new(page_w, page_h, ops)
            })
            .collect();

        if pdf_pages.is_empty() {
            pdf_pages.push(PdfPage::new(page_w, page_h, Vec::new()));
        }

        doc.with_pages(pdf_pages);
        debug!(pages = doc.pages.len(), "Layout serialised");

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        doc.save(&PdfSaveOptions::default(), &mut warnings)
    }

    // -- Image to PDF ---------------------------------------------------------

    /// Create a single-page PDF containing the given image.
    ///
    /// The image is scaled to fit within the page margins while preserving its
    /// aspect ratio.
    #[instrument(skip(self, image_bytes), fields(bytes_len = image_bytes.len()))]
    pub fn create_from_image(&self, image_bytes: &[u8]) -> Result<Vec<u8>> {
        let (page_w, page_h) = self.page_dimensions();
        let title = self.title.as_deref().unwrap_or("DocMerger Image");

        info!(paper = ?self.paper_size, title, "Creating image PDF");

        let dynamic_image = ::image::load_from_memory(image_bytes).map_err(|err| {
            DocMergerError::ImageError(format!("failed to decode image for PDF: {err}"))
        })?;

        let img_width = dynamic_image.width() as usize;
        let img_height = dynamic_image.height() as usize;
        if img_width == 0 || img_height == 0 {
            return Err(DocMergerError::ImageError("image has no pixels".into()));
        }

        let rgb_image = dynamic_image.to_rgb8();
        let raw = RawImage {
            pixels: RawImageData::U8(rgb_image.into_raw()),
            width: img_width,
            height: img_height,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };

        let mut doc = PdfDocument::new(title);
        let xobject_id = doc.add_image(&raw);

        let margin_mm: f32 = 15.0;
        let usable_w_pt = Mm(page_w.0 - 2.0 * margin_mm).into_pt().0;
        let usable_h_pt = Mm(page_h.0 - 2.0 * margin_mm).into_pt().0;

        // Native size at 150 DPI; scale down to fit, never up.
        let dpi: f32 = 150.0;
        let img_w_pt = img_width as f32 / dpi * 72.0;
        let img_h_pt = img_height as f32 / dpi * 72.0;
        let scale = (usable_w_pt / img_w_pt).min(usable_h_pt / img_h_pt).min(1.0);

        let rendered_w_pt = img_w_pt * scale;
        let rendered_h_pt = img_h_pt * scale;

        let margin_pt = Mm(margin_mm).into_pt().0;
        let x_offset = margin_pt + (usable_w_pt - rendered_w_pt) / 2.0;
        let y_offset = margin_pt + (usable_h_pt - rendered_h_pt) / 2.0;

        let ops = vec![Op::UseXobject {
            id: xobject_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(x_offset)),
                translate_y: Some(Pt(y_offset)),
                scale_x: Some(scale),
                scale_y: Some(scale),
                dpi: Some(dpi),
                rotate: None,
            },
        }];

        doc.with_pages(vec![PdfPage::new(page_w, page_h, ops)]);
        debug!(rendered_w_pt, rendered_h_pt, scale, "Image placed on page");

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        Ok(doc.save(&PdfSaveOptions::default(), &mut warnings))
    }
}

fn push_text_ops(ops: &mut Vec<Op>, line: &PlacedLine, unicode_font: Option<&FontId>) {
    let text: String = line.text.chars().filter(|c| !is_bidi_mark(*c)).collect();
    if text.trim().is_empty() {
        return;
    }
    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextCursor {
        pos: Point {
            x: Pt(line.x_pt),
            y: Pt(line.y_pt),
        },
    });
    match unicode_font {
        Some(font) if !is_win_ansi(&text) => {
            ops.push(Op::SetFontSize {
                size: Pt(line.size_pt),
                font: font.clone(),
            });
            ops.push(Op::WriteText {
                items: vec![TextItem::Text(visual_order(&text))],
                font: font.clone(),
            });
        }
        _ => {
            ops.push(Op::SetFontSizeBuiltinFont {
                size: Pt(line.size_pt),
                font: builtin_font(line.bold),
            });
            ops.push(Op::WriteTextBuiltinFont {
                items: vec![TextItem::Text(win_ansi_lossy(&text))],
                font: builtin_font(line.bold),
            });
        }
    }
    ops.push(Op::EndTextSection);
}

fn is_win_ansi_char(c: char) -> bool {
    matches!(c, ' '..='~' | '\u{A0}'..='\u{FF}') || CP1252_EXTRAS.contains(&c) || is_bidi_mark(c)
}

fn is_win_ansi(text: &str) -> bool {
    text.chars().all(is_win_ansi_char)
}

/// `text` with every character WinAnsi cannot encode replaced by `?`.
fn win_ansi_lossy(text: &str) -> String {
    text.chars()
        .map(|c| if is_win_ansi_char(c) { c } else { '?' })
        .collect()
}

fn builtin_font(bold: bool) -> BuiltinFont {
    if bold {
        BuiltinFont::HelveticaBold
    } else {
        BuiltinFont::Helvetica
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::codec::{LopdfCodec, PagedCodec};
    use crate::pdf::layout::{PageGeometry, layout_text};

    #[test]
    fn layout_pages_become_pdf_pages() {
        let text = "Paragraph one.\n\n".repeat(40);
        let pages = layout_text(&text, "sample.txt", PageGeometry::default());
        let bytes = PdfWriter::a4().with_title("sample").write_layout(&pages);

        assert_eq!(LopdfCodec.verify(&bytes).unwrap(), pages.len());
    }

    #[test]
    fn empty_layout_is_one_blank_page() {
        let bytes = PdfWriter::a4().write_layout(&[]);
        assert_eq!(LopdfCodec.verify(&bytes).unwrap(), 1);
    }

    #[test]
    fn image_becomes_single_page() {
        let img = ::image::RgbImage::from_pixel(40, 20, ::image::Rgb([200, 10, 10]));
        let mut png = Vec::new();
        ::image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), ::image::ImageFormat::Png)
            .unwrap();

        let bytes = PdfWriter::a4().create_from_image(&png).unwrap();
        assert_eq!(LopdfCodec.verify(&bytes).unwrap(), 1);
    }

    fn text_of(bytes: &[u8]) -> String {
        let codec = LopdfCodec;
        codec.extract_text(&codec.load(bytes).unwrap()).unwrap()
    }

    #[test]
    fn hebrew_without_a_font_prints_placeholders() {
        let pages = layout_text("שלום עולם", "he.txt", PageGeometry::default());
        let text = text_of(&PdfWriter::a4().write_layout(&pages));

        assert!(text.contains("he.txt"), "{text}");
        assert!(text.contains("???? ????"), "{text}");
        assert!(!text.contains('\u{D7}'), "{text}");
    }

    #[test]
    fn latin_accents_stay_in_win_ansi() {
        assert!(is_win_ansi("caf\u{E9} \u{2013} na\u{EF}ve \u{20AC}5"));
        assert!(!is_win_ansi("שלום"));
        assert_eq!(win_ansi_lossy("ok שלום"), "ok ????");
    }

    #[test]
    fn embedded_font_carries_hebrew() {
        let path = Path::new("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf");
        if !path.exists() {
            return;
        }
        let font = UnicodeFont::load(path).unwrap();
        let pages = layout_text("Title line\n\nשלום עולם", "he.txt", PageGeometry::default());
        let bytes = PdfWriter::a4().with_unicode_font(Some(font)).write_layout(&pages);

        assert_eq!(LopdfCodec.verify(&bytes).unwrap(), 1);
        let text = text_of(&bytes);
        // Glyphs are stored in display order.
        assert!(text.contains("םולש"), "{text}");
        assert!(text.contains("Title line"), "{text}");
    }

    #[test]
    fn unparsable_font_is_an_error() {
        assert!(UnicodeFont::from_bytes(b"not a font").is_err());
        let config = MergeConfig {
            unicode_font: Some("/nonexistent/font.ttf".into()),
            ..MergeConfig::default()
        };
        assert!(UnicodeFont::from_config(&config).is_none());
    }

    #[test]
    fn undecodable_image_is_an_error() {
        let err = PdfWriter::a4().create_from_image(b"not an image").unwrap_err();
        assert!(matches!(err, DocMergerError::ImageError(_)));
    }
}
