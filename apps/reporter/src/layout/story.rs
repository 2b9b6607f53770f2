//! Document Builder — maps parsed blocks onto an ordered story of render elements.
//!
//! The story is style-free: elements name their kind, and the paginator looks
//! the visual parameters up in the `StyleRegistry` at layout time.

use crate::markdown::{Block, HeadingLevel};

/// Spacer after the extracted title.
pub const TITLE_SPACER_PT: f32 = 8.0;
/// Spacer after a level-3 heading rendered as bold body text.
pub const H3_SPACER_PT: f32 = 4.0;
/// Spacer appended after every block's contribution.
pub const BLOCK_SPACER_PT: f32 = 6.0;

pub const BULLET_GLYPH: char = '•';

/// A table with every row padded to the same column count.
#[derive(Debug, Clone, PartialEq)]
pub struct TableGrid {
    rows: Vec<Vec<String>>,
    columns: usize,
}

impl TableGrid {
    /// Right-pads every row with empty cells up to the longest row's length.
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(columns, String::new());
                row
            })
            .collect();
        Self { rows, columns }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// Centered document title; at most one per story.
    Title(String),
    /// Level 1 or 2 heading. Level 3 never reaches the story as a heading.
    Heading { level: HeadingLevel, text: String },
    /// Body text, may carry inline `<b>`/`<i>` markup.
    Body(String),
    /// A bullet line, glyph prefix included.
    Bullet(String),
    /// A numbered line, sequential `N. ` prefix included.
    Numbered(String),
    /// Atomic group: never split mid-row, moved whole to a fresh page when possible.
    Table(TableGrid),
    /// Fixed vertical gap in points.
    Spacer(f32),
}

pub type Story = Vec<Element>;

/// Builds the story for a block sequence. Infallible.
pub fn build(blocks: Vec<Block>) -> Story {
    let mut story = Story::new();
    let mut blocks = blocks.into_iter().peekable();

    let starts_with_title = matches!(
        blocks.peek(),
        Some(Block::Heading {
            level: HeadingLevel::H1,
            ..
        })
    );
    if starts_with_title {
        if let Some(Block::Heading { text, .. }) = blocks.next() {
            story.push(Element::Title(text));
            story.push(Element::Spacer(TITLE_SPACER_PT));
        }
    }

    for block in blocks {
        match block {
            Block::Heading {
                level: HeadingLevel::H3,
                text,
            } => {
                story.push(Element::Body(format!("<b>{text}</b>")));
                story.push(Element::Spacer(H3_SPACER_PT));
            }
            Block::Heading { level, text } => {
                story.push(Element::Heading { level, text });
            }
            Block::Paragraph { text } => story.push(Element::Body(text)),
            Block::BulletList { items } => story.extend(
                items
                    .into_iter()
                    .map(|item| Element::Bullet(format!("{BULLET_GLYPH} {item}"))),
            ),
            Block::NumberedList { items } => story.extend(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(idx, item)| Element::Numbered(format!("{}. {item}", idx + 1))),
            ),
            Block::Table { rows } => story.push(Element::Table(TableGrid::from_rows(rows))),
        }
        story.push(Element::Spacer(BLOCK_SPACER_PT));
    }

    story
}
