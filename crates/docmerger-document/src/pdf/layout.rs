// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text layout — word wrap, pagination, anchoring, and page footers.
//
// Layout is pure: it produces page value objects with absolute positions in
// points. Serialising them to PDF is the writer's job.

use docmerger_core::MergeConfig;
use docmerger_core::bidi::{RLM, contains_rtl};

/// Average Helvetica glyph width as a fraction of the font size.
const AVG_GLYPH_WIDTH: f32 = 0.5;
const TITLE_SIZE_PT: f32 = 14.0;
const FOOTER_SIZE_PT: f32 = 10.0;
const FOOTER_Y_PT: f32 = 30.0;

/// Fixed page geometry and budgets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width_pt: f32,
    pub height_pt: f32,
    pub margin_pt: f32,
    pub font_size_pt: f32,
    pub line_height_pt: f32,
    pub chars_per_line: usize,
    pub lines_per_page: usize,
}

impl PageGeometry {
    pub fn from_config(config: &MergeConfig) -> Self {
        let (width_pt, height_pt) = config.paper_size.dimensions_pt();
        Self {
            width_pt,
            height_pt,
            margin_pt: config.margin_pt,
            font_size_pt: config.font_size_pt,
            line_height_pt: config.line_height_pt,
            chars_per_line: config.chars_per_line.max(1),
            lines_per_page: config.lines_per_page.max(1),
        }
    }

    /// Estimated rendered width of `text` at `size_pt`.
    pub fn text_width_pt(&self, text: &str, size_pt: f32) -> f32 {
        text.chars().count() as f32 * AVG_GLYPH_WIDTH * size_pt
    }

    /// Baseline of the `slot`-th line on a page (0 = top).
    fn baseline(&self, slot: usize) -> f32 {
        self.height_pt - self.margin_pt - slot as f32 * self.line_height_pt
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::from_config(&MergeConfig::default())
    }
}

/// Which page edge a line hangs from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Left,
    Right,
    Centre,
}

/// One positioned line of text.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub x_pt: f32,
    pub y_pt: f32,
    pub size_pt: f32,
    pub bold: bool,
    pub anchor: Anchor,
}

/// A finished page: body lines plus the footer stamped after pagination.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub lines: Vec<PlacedLine>,
    pub footer: Option<PlacedLine>,
}

/// Accumulates lines into pages; `finish` stamps "Page i of N" footers.
pub struct LayoutBuilder {
    geometry: PageGeometry,
    pages: Vec<PageLayout>,
    current: Vec<PlacedLine>,
    /// Line slots used on the current page.
    used: usize,
}

impl LayoutBuilder {
    pub fn new(geometry: PageGeometry) -> Self {
        Self {
            geometry,
            pages: Vec::new(),
            current: Vec::new(),
            used: 0,
        }
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    /// Bold title on the current page; occupies two line slots.
    pub fn push_title(&mut self, title: &str) {
        self.ensure_room(2);
        let line = self.place(title, TITLE_SIZE_PT, true);
        self.current.push(line);
        self.used += 2;
    }

    /// Word-wrap a paragraph and append its lines, breaking pages as needed.
    /// Paragraphs after the first on a page are separated by one empty slot.
    pub fn push_paragraph(&mut self, paragraph: &str) {
        let lines = wrap_words(paragraph, self.geometry.chars_per_line);
        if lines.is_empty() {
            return;
        }
        if self.used > 0 && self.used < self.geometry.lines_per_page {
            self.used += 1;
        }
        for line in lines {
            self.push_line(&line, false);
        }
    }

    /// Append one already-wrapped physical line.
    pub fn push_line(&mut self, text: &str, bold: bool) {
        self.ensure_room(1);
        let line = self.place(text, self.geometry.font_size_pt, bold);
        self.current.push(line);
        self.used += 1;
    }

    /// Close pagination and stamp footers. Always yields at least one page.
    pub fn finish(mut self) -> Vec<PageLayout> {
        if !self.current.is_empty() || self.pages.is_empty() {
            self.break_page();
        }

        let total = self.pages.len();
        let geometry = self.geometry;
        for (index, page) in self.pages.iter_mut().enumerate() {
            let text = format!("Page {} of {}", index + 1, total);
            let width = geometry.text_width_pt(&text, FOOTER_SIZE_PT);
            page.footer = Some(PlacedLine {
                x_pt: (geometry.width_pt - width) / 2.0,
                y_pt: FOOTER_Y_PT,
                size_pt: FOOTER_SIZE_PT,
                bold: false,
                anchor: Anchor::Centre,
                text,
            });
        }
        self.pages
    }

    fn ensure_room(&mut self, slots: usize) {
        if self.used > 0 && self.used + slots > self.geometry.lines_per_page {
            self.break_page();
        }
    }

    fn break_page(&mut self) {
        self.pages.push(PageLayout {
            lines: std::mem::take(&mut self.current),
            footer: None,
        });
        self.used = 0;
    }

    /// Position a line in the next free slot. Lines containing right-to-left
    /// script hang from the right margin and carry a leading RLM.
    fn place(&self, text: &str, size_pt: f32, bold: bool) -> PlacedLine {
        let y_pt = self.geometry.baseline(self.used);
        if contains_rtl(text) {
            let marked = format!("{RLM}{text}");
            let width = self.geometry.text_width_pt(text, size_pt);
            let x_pt = (self.geometry.width_pt - self.geometry.margin_pt - width)
                .max(self.geometry.margin_pt);
            PlacedLine {
                text: marked,
                x_pt,
                y_pt,
                size_pt,
                bold,
                anchor: Anchor::Right,
            }
        } else {
            PlacedLine {
                text: text.to_string(),
                x_pt: self.geometry.margin_pt,
                y_pt,
                size_pt,
                bold,
                anchor: Anchor::Left,
            }
        }
    }
}

/// Split text into paragraphs on blank (whitespace-only) lines.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }
    paragraphs
}

/// Greedy word wrap: words accumulate until the next one would push the line
/// past `max_chars` characters. Words longer than the budget are force-broken.
pub fn wrap_words(paragraph: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in paragraph.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            let mut chunks = chars.chunks(max_chars).peekable();
            while let Some(chunk) = chunks.next() {
                if chunks.peek().is_some() {
                    lines.push(chunk.iter().collect());
                } else {
                    current = chunk.iter().collect();
                    current_len = chunk.len();
                }
            }
        } else if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= max_chars {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
            current_len = word_len;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Lay out `text` under `title` with the given geometry.
pub fn layout_text(text: &str, title: &str, geometry: PageGeometry) -> Vec<PageLayout> {
    let mut builder = LayoutBuilder::new(geometry);
    if !title.trim().is_empty() {
        builder.push_title(title);
    }
    for paragraph in split_paragraphs(text) {
        builder.push_paragraph(&paragraph);
    }
    builder.finish()
}
