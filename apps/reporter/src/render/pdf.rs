//! PDF serialization of paginated draw operations via `pdf-writer`.
//!
//! Uses the four standard Helvetica faces (no embedding) with WinAnsiEncoding.
//! Characters outside that encoding are written as `?`.

use chrono::{Datelike, NaiveDate};
use miniz_oxide::deflate::compress_to_vec_zlib;
use pdf_writer::{Content, Date, Filter, Finish, Name, Pdf, Rect, Ref, Str, TextStr};
use tracing::{debug, trace};

use crate::layout::font_metrics::FontFace;
use crate::layout::{paginate, DrawOp, Page, PageConfig, Story, StyleRegistry};
use crate::render::RenderError;

const PRODUCER: &str = concat!("reporter ", env!("CARGO_PKG_VERSION"));

/// Per-document settings that are not part of page geometry.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Printed in every footer and stored as the creation date.
    pub generated_on: NaiveDate,
    pub title: Option<String>,
}

/// Paginates and serializes a story in one call.
pub fn render(
    story: &Story,
    styles: &StyleRegistry,
    page: &PageConfig,
    options: &RenderOptions,
) -> Result<Vec<u8>, RenderError> {
    let pages = paginate(story, styles, page, options.generated_on)?;
    let bytes = write_pdf(&pages, page, options);
    debug!(pages = pages.len(), bytes = bytes.len(), "PDF serialized");
    Ok(bytes)
}

/// Serializes already-paginated pages.
pub fn write_pdf(pages: &[Page], page: &PageConfig, options: &RenderOptions) -> Vec<u8> {
    let mut pdf = Pdf::new();
    let mut next_id = 1i32;
    let mut alloc = || {
        let r = Ref::new(next_id);
        next_id += 1;
        r
    };

    let catalog_id = alloc();
    let pages_id = alloc();
    let info_id = alloc();
    let font_ids: Vec<(FontFace, Ref)> = FontFace::ALL.iter().map(|f| (*f, alloc())).collect();
    let page_ids: Vec<(Ref, Ref)> = pages.iter().map(|_| (alloc(), alloc())).collect();

    pdf.catalog(catalog_id).pages(pages_id);
    pdf.pages(pages_id)
        .kids(page_ids.iter().map(|(page_id, _)| *page_id))
        .count(pages.len() as i32);

    for (face, font_id) in &font_ids {
        pdf.type1_font(*font_id)
            .base_font(Name(face.base_font().as_bytes()))
            .encoding_predefined(Name(b"WinAnsiEncoding"));
    }

    for (p, (page_id, content_id)) in pages.iter().zip(&page_ids) {
        let mut page_writer = pdf.page(*page_id);
        page_writer
            .media_box(Rect::new(0.0, 0.0, page.width, page.height))
            .parent(pages_id)
            .contents(*content_id);
        {
            let mut resources = page_writer.resources();
            let mut fonts = resources.fonts();
            for (face, font_id) in &font_ids {
                fonts.pair(Name(face.resource_name().as_bytes()), *font_id);
            }
        }
        page_writer.finish();

        let raw = page_content(p).finish();
        let compressed = compress_to_vec_zlib(&raw, 6);
        trace!(
            page = p.number,
            ops = p.ops.len(),
            raw = raw.len(),
            compressed = compressed.len(),
            "Page content stream"
        );
        pdf.stream(*content_id, &compressed).filter(Filter::FlateDecode);
    }

    let date = options.generated_on;
    let mut info = pdf.document_info(info_id);
    info.producer(TextStr(PRODUCER)).creation_date(
        Date::new(date.year().clamp(0, 9999) as u16)
            .month(date.month() as u8)
            .day(date.day() as u8),
    );
    if let Some(title) = &options.title {
        info.title(TextStr(title.as_str()));
    }
    info.finish();

    pdf.finish()
}

fn page_content(page: &Page) -> Content {
    let mut content = Content::new();
    for op in page.ops.iter().chain(std::iter::once(&page.footer)) {
        write_op(&mut content, op);
    }
    content
}

fn write_op(content: &mut Content, op: &DrawOp) {
    match op {
        DrawOp::Text {
            x,
            y,
            face,
            size,
            color,
            text,
        } => {
            let encoded = encode_win_ansi(text);
            content
                .save_state()
                .set_fill_rgb(color.r, color.g, color.b)
                .begin_text()
                .set_font(Name(face.resource_name().as_bytes()), *size)
                .next_line(*x, *y)
                .show(Str(&encoded))
                .end_text()
                .restore_state();
        }
        DrawOp::FillRect {
            x,
            y,
            width,
            height,
            color,
        } => {
            content
                .save_state()
                .set_fill_rgb(color.r, color.g, color.b)
                .rect(*x, *y, *width, *height)
                .fill_nonzero()
                .restore_state();
        }
        DrawOp::StrokeRect {
            x,
            y,
            width,
            height,
            color,
            line_width,
        } => {
            content
                .save_state()
                .set_stroke_rgb(color.r, color.g, color.b)
                .set_line_width(*line_width)
                .rect(*x, *y, *width, *height)
                .stroke()
                .restore_state();
        }
    }
}

/// Maps text onto WinAnsiEncoding (Windows-1252) bytes.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c as u8,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            _ => b'?',
        })
        .collect()
}
