// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Generic best-effort text extraction for kinds without a dedicated reader.
//
// Office containers are ZIP archives of XML parts; their text is the
// concatenation of XML text nodes with a line break after every paragraph
// element. Spreadsheets go through calamine, CSV and plain text are decoded
// as lossy UTF-8, and images carry no text.

use std::io::{Cursor, Read};
use std::sync::Arc;

use calamine::{Reader, open_workbook_auto_from_rs};
use docmerger_core::Kind;
use docmerger_core::error::{DocMergerError, Result};
use quick_xml::Reader as XmlReader;
use quick_xml::events::Event;
use tracing::{debug, instrument};
use zip::ZipArchive;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

/// Text extraction for kinds with no dedicated extractor.
pub trait GenericTextExtractor: Send + Sync {
    fn extract_text(&self, bytes: &[u8], kind: Kind) -> Result<String>;
}

impl<T: GenericTextExtractor + ?Sized> GenericTextExtractor for Arc<T> {
    fn extract_text(&self, bytes: &[u8], kind: Kind) -> Result<String> {
        (**self).extract_text(bytes, kind)
    }
}

/// `GenericTextExtractor` over ZIP/XML containers, workbooks and plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerTextExtractor;

impl GenericTextExtractor for ContainerTextExtractor {
    #[instrument(skip(self, bytes), fields(bytes_len = bytes.len()))]
    fn extract_text(&self, bytes: &[u8], kind: Kind) -> Result<String> {
        match kind {
            Kind::Image => Ok(String::new()),
            Kind::PlainText => Ok(String::from_utf8_lossy(bytes).into_owned()),
            Kind::Tabular => {
                if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC) {
                    workbook_text(bytes)
                } else {
                    Ok(String::from_utf8_lossy(bytes).into_owned())
                }
            }
            Kind::Presentation => container_text(bytes, is_slide_part),
            Kind::FlowText => {
                if bytes.starts_with(ZIP_MAGIC) {
                    container_text(bytes, is_body_part)
                } else if bytes.starts_with(b"{\\rtf") {
                    Ok(strip_rtf(&String::from_utf8_lossy(bytes)))
                } else if let Some(text) = readable_text(bytes) {
                    Ok(text)
                } else {
                    Err(DocMergerError::Extraction(
                        "binary word-processor format is not readable".into(),
                    ))
                }
            }
            Kind::Unknown => {
                if bytes.starts_with(ZIP_MAGIC) {
                    container_text(bytes, |name| is_body_part(name) || is_slide_part(name))
                } else {
                    readable_text(bytes)
                        .ok_or_else(|| DocMergerError::Extraction("content is not text".into()))
                }
            }
            Kind::Paged => Err(DocMergerError::Extraction(
                "paged documents are read by the paged codec".into(),
            )),
        }
    }
}

/// `bytes` as text when they are UTF-8 with no control characters besides
/// line breaks and tabs.
fn readable_text(bytes: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(bytes).ok()?;
    let binary = text
        .chars()
        .any(|c| c.is_control() && !c.is_whitespace());
    (!binary).then(|| text.to_string())
}

/// Every sheet as a "=== Sheet: name ===" block of " | "-joined rows.
fn workbook_text(bytes: &[u8]) -> Result<String> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|err| DocMergerError::Extraction(format!("failed to open workbook: {err}")))?;

    let mut text = String::new();
    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    for sheet_name in &sheet_names {
        let Ok(range) = workbook.worksheet_range(sheet_name) else {
            continue;
        };
        text.push_str(&format!("=== Sheet: {sheet_name} ===\n"));
        for row in range.rows() {
            let cells: Vec<String> = row
                .iter()
                .map(|cell| cell.to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !cells.is_empty() {
                text.push_str(&cells.join(" | "));
                text.push('\n');
            }
        }
        text.push('\n');
    }

    debug!(sheets = sheet_names.len(), "Workbook text extracted");
    Ok(text)
}

fn is_slide_part(name: &str) -> bool {
    (name.starts_with("ppt/slides/slide") && name.ends_with(".xml")) || name == "content.xml"
}

fn is_body_part(name: &str) -> bool {
    name == "word/document.xml" || name == "content.xml"
}

/// Slide number in `ppt/slides/slideN.xml`, so slide10 sorts after slide9.
fn part_order(name: &str) -> (u32, String) {
    let number = name
        .strip_prefix("ppt/slides/slide")
        .and_then(|rest| rest.strip_suffix(".xml"))
        .and_then(|n| n.parse().ok())
        .unwrap_or(0);
    (number, name.to_string())
}

/// Concatenated text of the archive parts selected by `wanted`.
fn container_text(bytes: &[u8], wanted: impl Fn(&str) -> bool) -> Result<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|err| DocMergerError::Extraction(format!("not a readable container: {err}")))?;

    let mut parts: Vec<String> = archive
        .file_names()
        .filter(|name| wanted(name))
        .map(str::to_string)
        .collect();
    parts.sort_by_key(|name| part_order(name));

    if parts.is_empty() {
        return Err(DocMergerError::Extraction(
            "container has no text parts".into(),
        ));
    }

    let mut text = String::new();
    for name in &parts {
        let mut xml = String::new();
        archive
            .by_name(name)
            .map_err(|err| DocMergerError::Extraction(format!("{name}: {err}")))?
            .read_to_string(&mut xml)?;
        text.push_str(&xml_text(&xml)?);
        text.push('\n');
    }

    debug!(parts = parts.len(), "Container text extracted");
    Ok(text)
}

/// Text nodes of an XML part; paragraph (`p`) and heading (`h`) elements
/// end a line, whatever their namespace prefix.
fn xml_text(xml: &str) -> Result<String> {
    let mut reader = XmlReader::from_str(xml);
    reader.trim_text(false);

    let mut out = String::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Text(text)) => {
                let unescaped = text
                    .unescape()
                    .map_err(|err| DocMergerError::Extraction(format!("XML unescape error: {err}")))?;
                out.push_str(&unescaped);
            }
            Ok(Event::End(end)) => {
                if matches!(end.local_name().as_ref(), b"p" | b"h") {
                    out.push('\n');
                }
            }
            Ok(Event::Empty(empty)) => match empty.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"line-break" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(DocMergerError::Extraction(format!(
                    "XML error at {}: {err}",
                    reader.buffer_position()
                )));
            }
        }
        buf.clear();
    }
    Ok(out)
}

/// Groups whose content is metadata rather than document text.
const RTF_SKIPPED_GROUPS: [&str; 5] = ["\\fonttbl", "\\colortbl", "\\stylesheet", "\\info", "\\*"];

/// Drop RTF control words and metadata groups, keeping literal text.
fn strip_rtf(rtf: &str) -> String {
    let chars: Vec<char> = rtf.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '{' => {
                let rest: String = chars[i + 1..].iter().take(12).collect();
                if RTF_SKIPPED_GROUPS.iter().any(|g| rest.starts_with(g)) {
                    i = skip_group(&chars, i);
                    continue;
                }
                i += 1;
            }
            '}' | '\r' | '\n' => i += 1,
            '\\' => match chars.get(i + 1).copied() {
                Some(escaped @ ('\\' | '{' | '}')) => {
                    out.push(escaped);
                    i += 2;
                }
                Some(_) => {
                    let word_start = i + 1;
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_alphabetic() {
                        i += 1;
                    }
                    let word: String = chars[word_start..i].iter().collect();
                    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '-') {
                        i += 1;
                    }
                    if chars.get(i) == Some(&' ') {
                        i += 1;
                    }
                    if word == "par" || word == "line" {
                        out.push('\n');
                    }
                }
                None => i += 1,
            },
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
    out
}

/// Index just past the group opening at `open`.
fn skip_group(chars: &[char], open: usize) -> usize {
    let mut depth = 0usize;
    let mut i = open;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    chars.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn zip_of(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            for (name, body) in parts {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(body.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    const SLIDE: &str = r#"<p:sld xmlns:p="p" xmlns:a="a"><p:txBody><a:p><a:r><a:t>Slide {N}</a:t></a:r></a:p><a:p><a:r><a:t>Point &amp; more</a:t></a:r></a:p></p:txBody></p:sld>"#;

    #[test]
    fn presentation_slides_in_numeric_order() {
        let slide = |n: &str| SLIDE.replace("{N}", n);
        let (s1, s2, s10) = (slide("one"), slide("two"), slide("ten"));
        let bytes = zip_of(&[
            ("ppt/slides/slide10.xml", &s10),
            ("ppt/slides/slide1.xml", &s1),
            ("ppt/slides/slide2.xml", &s2),
            ("ppt/presentation.xml", "<p:presentation/>"),
        ]);

        let text = ContainerTextExtractor
            .extract_text(&bytes, Kind::Presentation)
            .unwrap();
        let one = text.find("Slide one").unwrap();
        let two = text.find("Slide two").unwrap();
        let ten = text.find("Slide ten").unwrap();
        assert!(one < two && two < ten, "{text}");
        assert!(text.contains("Point & more\n"));
    }

    #[test]
    fn odf_content_is_read() {
        let content = r#"<office:document-content xmlns:office="o" xmlns:text="t"><office:body><text:h>Title</text:h><text:p>Body<text:tab/>text</text:p></office:body></office:document-content>"#;
        let bytes = zip_of(&[("content.xml", content), ("mimetype", "x")]);
        let text = ContainerTextExtractor
            .extract_text(&bytes, Kind::FlowText)
            .unwrap();
        assert_eq!(text.trim(), "Title\nBody\ttext");
    }

    #[test]
    fn csv_is_plain_text() {
        let text = ContainerTextExtractor
            .extract_text(b"name,qty\nbolts,4\n", Kind::Tabular)
            .unwrap();
        assert_eq!(text, "name,qty\nbolts,4\n");
    }

    #[test]
    fn broken_workbook_is_an_error() {
        let err = ContainerTextExtractor
            .extract_text(b"PK\x03\x04 not really a workbook", Kind::Tabular)
            .unwrap_err();
        assert!(matches!(err, DocMergerError::Extraction(_)));
    }

    #[test]
    fn images_have_no_text() {
        assert_eq!(
            ContainerTextExtractor
                .extract_text(&[0x89, b'P', b'N', b'G'], Kind::Image)
                .unwrap(),
            ""
        );
    }

    #[test]
    fn rtf_control_words_are_dropped() {
        let rtf = r"{\rtf1\ansi{\fonttbl\f0 Arial;}\f0\fs24 Hello \b bold\b0\par World \{x\}}";
        let text = ContainerTextExtractor
            .extract_text(rtf.as_bytes(), Kind::FlowText)
            .unwrap();
        assert_eq!(text, "Hello bold\nWorld {x}");
    }

    #[test]
    fn text_saved_with_a_word_extension_is_read() {
        let text = ContainerTextExtractor
            .extract_text(b"Hello\n\nWorld", Kind::FlowText)
            .unwrap();
        assert_eq!(text, "Hello\n\nWorld");
    }

    #[test]
    fn legacy_binary_word_files_are_an_error() {
        let doc = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, 0x00, 0x00];
        assert!(ContainerTextExtractor.extract_text(&doc, Kind::FlowText).is_err());
        assert!(ContainerTextExtractor.extract_text(b"\x00\x01\x02", Kind::FlowText).is_err());
    }

    #[test]
    fn unknown_binary_is_an_error() {
        assert!(
            ContainerTextExtractor
                .extract_text(&[0xFF, 0xFE, 0x00, 0xC3], Kind::Unknown)
                .is_err()
        );
    }
}
