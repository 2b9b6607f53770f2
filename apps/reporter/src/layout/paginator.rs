//! Paginator — flows a story onto fixed-size pages.
//!
//! # Flow rules
//! - Elements stack top-to-bottom inside the content frame (page minus margins).
//! - Paragraphs are word-wrapped with static Helvetica metrics and may split
//!   between lines across a page break.
//! - `space_before` and spacers are dropped at the top of a page.
//! - Tables are atomic: a table that does not fit the remaining space starts a
//!   fresh page. Only a table taller than a whole frame is split, between rows,
//!   with the header band repeated. A row that cannot fit a frame together with
//!   the header is an `Overflow` error.
//! - Every page gets a centered footer at `PageConfig::footer_offset` from the
//!   bottom edge. The footer band is outside the frame and never consumes flow
//!   height.
//!
//! Output is a list of positioned draw operations per page; `render::pdf`
//! serializes them.

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::layout::font_metrics::{get_metrics, FontFace};
use crate::layout::markup::{parse_runs, Run};
use crate::layout::story::{Element, Story, TableGrid};
use crate::layout::styles::{Alignment, PageConfig, ParagraphStyle, Rgb, StyleRegistry, TableStyle};
use crate::markdown::HeadingLevel;
use crate::render::RenderError;

/// Tolerance for floating-point fit checks.
const EPSILON: f32 = 0.01;
/// Baseline offset above the bottom of a line box, as a fraction of font size.
const DESCENT_RATIO: f32 = 0.22;

// ────────────────────────────────────────────────────────────────────────────
// Output types
// ────────────────────────────────────────────────────────────────────────────

/// A positioned drawing primitive in PDF user space (points, origin bottom-left).
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text {
        x: f32,
        /// Baseline.
        y: f32,
        face: FontFace,
        size: f32,
        color: Rgb,
        text: String,
    },
    FillRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Rgb,
    },
    StrokeRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Rgb,
        line_width: f32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// 1-based.
    pub number: usize,
    pub ops: Vec<DrawOp>,
    /// Always a `DrawOp::Text`.
    pub footer: DrawOp,
}

// ────────────────────────────────────────────────────────────────────────────
// Line breaking
// ────────────────────────────────────────────────────────────────────────────

/// A word may span several faces (`<b>bo</b>ld`), so it is a list of pieces.
#[derive(Debug, Default)]
struct Word {
    pieces: Vec<(String, FontFace)>,
    space_before: bool,
}

impl Word {
    fn width(&self, size: f32) -> f32 {
        self.pieces
            .iter()
            .map(|(text, face)| get_metrics(*face).width_pt(text, size))
            .sum()
    }

    fn first_face(&self) -> FontFace {
        self.pieces
            .first()
            .map(|(_, face)| *face)
            .unwrap_or(FontFace::Regular)
    }

    fn push_char(&mut self, c: char, face: FontFace) {
        match self.pieces.last_mut() {
            Some((text, last)) if *last == face => text.push(c),
            _ => self.pieces.push((c.to_string(), face)),
        }
    }
}

fn split_words(runs: &[Run]) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current = Word::default();
    let mut pending_space = false;

    for run in runs {
        for c in run.text.chars() {
            if c.is_whitespace() {
                if !current.pieces.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
                pending_space = true;
            } else {
                if current.pieces.is_empty() {
                    current.space_before = pending_space && !words.is_empty();
                    pending_space = false;
                }
                current.push_char(c, run.face);
            }
        }
    }
    if !current.pieces.is_empty() {
        words.push(current);
    }
    words
}

/// Hard-breaks a word wider than `max_width` into chunks that fit.
fn break_long_word(word: Word, size: f32, max_width: f32) -> Vec<Word> {
    let mut chunks = Vec::new();
    let mut chunk = Word {
        pieces: Vec::new(),
        space_before: word.space_before,
    };
    let mut width = 0.0_f32;

    for (text, face) in word.pieces {
        let metrics = get_metrics(face);
        for c in text.chars() {
            let w = metrics.width_pt(c.encode_utf8(&mut [0u8; 4]), size);
            if width + w > max_width && !chunk.pieces.is_empty() {
                chunks.push(std::mem::take(&mut chunk));
                width = 0.0;
            }
            chunk.push_char(c, face);
            width += w;
        }
    }
    if !chunk.pieces.is_empty() {
        chunks.push(chunk);
    }
    chunks
}

/// One laid-out line: fragments of uniform face, measured.
#[derive(Debug, Clone, PartialEq)]
struct Line {
    fragments: Vec<(String, FontFace)>,
    width: f32,
}

impl Line {
    fn empty() -> Self {
        Self {
            fragments: Vec::new(),
            width: 0.0,
        }
    }

    fn push(&mut self, text: &str, face: FontFace, width: f32) {
        match self.fragments.last_mut() {
            Some((last, last_face)) if *last_face == face => last.push_str(text),
            _ => self.fragments.push((text.to_string(), face)),
        }
        self.width += width;
    }
}

/// Greedy word wrap. Returns no lines for empty text.
fn wrap_runs(runs: &[Run], size: f32, max_width: f32) -> Vec<Line> {
    let words: Vec<Word> = split_words(runs)
        .into_iter()
        .flat_map(|w| {
            if w.width(size) > max_width {
                break_long_word(w, size, max_width)
            } else {
                vec![w]
            }
        })
        .collect();

    let mut lines = Vec::new();
    let mut line = Line::empty();

    for word in words {
        let word_width = word.width(size);
        let space_face = word.first_face();
        let space_width = if line.fragments.is_empty() || !word.space_before {
            0.0
        } else {
            get_metrics(space_face).space_width * size
        };

        if !line.fragments.is_empty() && line.width + space_width + word_width > max_width {
            lines.push(std::mem::replace(&mut line, Line::empty()));
        } else if space_width > 0.0 {
            line.push(" ", space_face, space_width);
        }
        for (text, face) in &word.pieces {
            let w = get_metrics(*face).width_pt(text, size);
            line.push(text, *face, w);
        }
    }
    if !line.fragments.is_empty() {
        lines.push(line);
    }
    lines
}

// ────────────────────────────────────────────────────────────────────────────
// Table geometry
// ────────────────────────────────────────────────────────────────────────────

struct TableLayout {
    column_widths: Vec<f32>,
    /// Per row, per cell: wrapped lines.
    cells: Vec<Vec<Vec<Line>>>,
    row_heights: Vec<f32>,
}

fn cell_face(row: usize) -> FontFace {
    if row == 0 {
        FontFace::Bold
    } else {
        FontFace::Regular
    }
}

fn layout_table(grid: &TableGrid, style: &TableStyle, available_width: f32) -> TableLayout {
    let padding_x = style.padding_left + style.padding_right;
    let min_width = padding_x + style.font_size;

    let natural: Vec<f32> = (0..grid.columns())
        .map(|col| {
            grid.rows()
                .iter()
                .enumerate()
                .map(|(r, row)| get_metrics(cell_face(r)).width_pt(&row[col], style.font_size))
                .fold(0.0_f32, f32::max)
                + padding_x
        })
        .map(|w| w.max(min_width))
        .collect();

    let total: f32 = natural.iter().sum();
    let column_widths: Vec<f32> = if total <= available_width || total <= 0.0 {
        natural
    } else {
        natural
            .iter()
            .map(|w| available_width * w / total)
            .collect()
    };

    let cells: Vec<Vec<Vec<Line>>> = grid
        .rows()
        .iter()
        .enumerate()
        .map(|(r, row)| {
            row.iter()
                .zip(&column_widths)
                .map(|(text, width)| {
                    let runs = [Run {
                        text: text.clone(),
                        face: cell_face(r),
                    }];
                    wrap_runs(&runs, style.font_size, (width - padding_x).max(1.0))
                })
                .collect()
        })
        .collect();

    let row_heights = cells
        .iter()
        .map(|row| {
            let lines = row.iter().map(Vec::len).max().unwrap_or(0).max(1);
            lines as f32 * style.leading + style.padding_top + style.padding_bottom
        })
        .collect();

    TableLayout {
        column_widths,
        cells,
        row_heights,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Paginator
// ────────────────────────────────────────────────────────────────────────────

struct Paginator<'a> {
    styles: &'a StyleRegistry,
    page: &'a PageConfig,
    pages: Vec<Vec<DrawOp>>,
    ops: Vec<DrawOp>,
    /// Top of the remaining free space on the current page.
    y: f32,
}

impl<'a> Paginator<'a> {
    fn new(styles: &'a StyleRegistry, page: &'a PageConfig) -> Self {
        Self {
            styles,
            page,
            pages: Vec::new(),
            ops: Vec::new(),
            y: page.frame_top(),
        }
    }

    fn page_is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    fn remaining(&self) -> f32 {
        self.y - self.page.frame_bottom()
    }

    fn fits(&self, height: f32) -> bool {
        height <= self.remaining() + EPSILON
    }

    fn new_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.ops));
        self.y = self.page.frame_top();
    }

    fn style_for(&self, element: &Element) -> Option<&'a ParagraphStyle> {
        let styles = self.styles;
        match element {
            Element::Title(_) => Some(&styles.title),
            Element::Heading {
                level: HeadingLevel::H1,
                ..
            } => Some(&styles.h1),
            Element::Heading { .. } => Some(&styles.h2),
            Element::Body(_) => Some(&styles.body),
            Element::Bullet(_) | Element::Numbered(_) => Some(&styles.list_item),
            Element::Table(_) | Element::Spacer(_) => None,
        }
    }

    fn place(&mut self, element: &Element) -> Result<(), RenderError> {
        match element {
            Element::Title(text)
            | Element::Heading { text, .. }
            | Element::Body(text)
            | Element::Bullet(text)
            | Element::Numbered(text) => {
                if let Some(style) = self.style_for(element) {
                    self.place_paragraph(text, style);
                }
            }
            Element::Table(grid) => self.place_table(grid)?,
            Element::Spacer(height) => {
                if !self.page_is_empty() {
                    self.y -= height;
                }
            }
        }
        Ok(())
    }

    fn place_paragraph(&mut self, text: &str, style: &ParagraphStyle) {
        let runs = parse_runs(text, style.bold);
        let max_width = (self.page.content_width() - style.left_indent).max(1.0);
        let lines = wrap_runs(&runs, style.font_size, max_width);
        if lines.is_empty() {
            return;
        }

        let mut gap = if self.page_is_empty() {
            0.0
        } else {
            style.space_before
        };
        if !self.fits(gap + style.leading) && !self.page_is_empty() {
            self.new_page();
            gap = 0.0;
        }
        self.y -= gap;

        for line in &lines {
            if !self.fits(style.leading) && !self.page_is_empty() {
                self.new_page();
            }
            let x_start = self.page.margin_left
                + style.left_indent
                + match style.alignment {
                    Alignment::Left => 0.0,
                    Alignment::Center => ((max_width - line.width) / 2.0).max(0.0),
                };
            let baseline = self.y - style.leading + DESCENT_RATIO * style.font_size;
            self.draw_line(line, x_start, baseline, style.font_size, style.color);
            self.y -= style.leading;
        }

        self.y -= style.space_after;
    }

    fn draw_line(&mut self, line: &Line, x: f32, baseline: f32, size: f32, color: Rgb) {
        let mut x = x;
        for (text, face) in &line.fragments {
            self.ops.push(DrawOp::Text {
                x,
                y: baseline,
                face: *face,
                size,
                color,
                text: text.clone(),
            });
            x += get_metrics(*face).width_pt(text, size);
        }
    }

    fn place_table(&mut self, grid: &TableGrid) -> Result<(), RenderError> {
        if grid.rows().is_empty() || grid.columns() == 0 {
            return Ok(());
        }
        let styles = self.styles;
        let style = &styles.table;
        let layout = layout_table(grid, style, self.page.content_width());
        let total: f32 = layout.row_heights.iter().sum();

        if !self.fits(total) && !self.page_is_empty() {
            debug!(
                table_height = total,
                remaining = self.remaining(),
                "Table does not fit; moving to a fresh page"
            );
            self.new_page();
        }

        if self.fits(total) {
            for row in 0..layout.row_heights.len() {
                self.draw_table_row(&layout, row, style);
            }
            return Ok(());
        }

        // Taller than a whole frame: split between rows, repeating the header.
        // Every row must fit a fresh frame below the header band.
        let frame = self.page.content_height();
        let header = layout.row_heights[0];
        let tallest = layout.row_heights[1..]
            .iter()
            .copied()
            .fold(0.0_f32, f32::max);
        if header + tallest > frame + EPSILON {
            return Err(RenderError::Overflow(format!(
                "table row of {tallest:.1}pt plus {header:.1}pt header exceeds the {frame:.1}pt frame"
            )));
        }

        warn!(
            table_height = total,
            frame_height = self.page.content_height(),
            "Table exceeds page height; splitting between rows"
        );
        self.draw_table_row(&layout, 0, style);
        for row in 1..layout.row_heights.len() {
            if !self.fits(layout.row_heights[row]) {
                self.new_page();
                self.draw_table_row(&layout, 0, style);
            }
            self.draw_table_row(&layout, row, style);
        }
        Ok(())
    }

    fn draw_table_row(&mut self, layout: &TableLayout, row: usize, style: &TableStyle) {
        let height = layout.row_heights[row];
        let top = self.y;
        let bottom = top - height;
        let mut x = self.page.margin_left;

        for (col, width) in layout.column_widths.iter().enumerate() {
            if row == 0 {
                self.ops.push(DrawOp::FillRect {
                    x,
                    y: bottom,
                    width: *width,
                    height,
                    color: style.header_background,
                });
            }
            self.ops.push(DrawOp::StrokeRect {
                x,
                y: bottom,
                width: *width,
                height,
                color: style.grid_color,
                line_width: style.grid_width,
            });

            // Top-aligned cell text.
            let mut line_top = top - style.padding_top;
            for line in &layout.cells[row][col] {
                let baseline = line_top - style.leading + DESCENT_RATIO * style.font_size;
                self.draw_line(
                    line,
                    x + style.padding_left,
                    baseline,
                    style.font_size,
                    style.text_color,
                );
                line_top -= style.leading;
            }
            x += width;
        }
        self.y = bottom;
    }

    fn finish(mut self, footer_date: NaiveDate) -> Vec<Page> {
        if !self.ops.is_empty() || self.pages.is_empty() {
            self.pages.push(std::mem::take(&mut self.ops));
        }
        let page = self.page;
        let footer_style = &self.styles.footer;
        self.pages
            .into_iter()
            .enumerate()
            .map(|(idx, ops)| {
                let number = idx + 1;
                let text = footer_text(&page.footer_label, number, footer_date);
                let width = get_metrics(FontFace::Regular).width_pt(&text, footer_style.font_size);
                Page {
                    number,
                    ops,
                    footer: DrawOp::Text {
                        x: (page.width - width) / 2.0,
                        y: page.footer_offset,
                        face: FontFace::Regular,
                        size: footer_style.font_size,
                        color: footer_style.color,
                        text,
                    },
                }
            })
            .collect()
    }
}

/// `"{label} — Page {n} — {YYYY-MM-DD}"`
pub fn footer_text(label: &str, page_number: usize, date: NaiveDate) -> String {
    format!("{label} — Page {page_number} — {}", date.format("%Y-%m-%d"))
}

/// Lays out `story` onto pages. Always yields at least one page.
pub fn paginate(
    story: &Story,
    styles: &StyleRegistry,
    page: &PageConfig,
    footer_date: NaiveDate,
) -> Result<Vec<Page>, RenderError> {
    if !page.is_valid() {
        return Err(RenderError::InvalidPage(format!(
            "{}x{}pt with margins t={} b={} l={} r={}",
            page.width,
            page.height,
            page.margin_top,
            page.margin_bottom,
            page.margin_left,
            page.margin_right
        )));
    }

    let mut paginator = Paginator::new(styles, page);
    for element in story {
        paginator.place(element)?;
    }
    let pages = paginator.finish(footer_date);
    debug!(pages = pages.len(), elements = story.len(), "Story paginated");
    Ok(pages)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
