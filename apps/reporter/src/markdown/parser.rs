//! Block Parser — turns free-form markdown into an ordered list of typed blocks.
//!
//! # Algorithm
//! A single forward pass over the indexed line array with an explicit cursor.
//! Structural lines are classified in a fixed order:
//! heading → bullet list → numbered list → table → plain text.
//! Lists and tables greedily consume every contiguous line that matches the
//! same pattern. Plain lines accumulate in a paragraph buffer that is flushed
//! on blank lines, structural markers and end of input.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Block model
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeadingLevel {
    H1,
    H2,
    H3,
}

/// One structurally recognized unit of markdown.
///
/// Lists always carry at least one item and tables at least one row;
/// the parser never emits empty ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Block {
    Heading { level: HeadingLevel, text: String },
    Paragraph { text: String },
    BulletList { items: Vec<String> },
    NumberedList { items: Vec<String> },
    Table { rows: Vec<Vec<String>> },
}

// ────────────────────────────────────────────────────────────────────────────
// Line patterns
// ────────────────────────────────────────────────────────────────────────────

static BULLET_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[-*]\s+").unwrap());
static NUMBER_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d+\.\s+").unwrap());
/// `| --- | :---: |` style header separators. Requires at least two hyphen runs.
static SEPARATOR_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\|?\s*:?-{2,}:?\s*(\|\s*:?-{2,}:?\s*)+\|?$").unwrap());

/// Longest prefix first so `### ` is never read as `# `.
const HEADING_PREFIXES: [(&str, HeadingLevel); 3] = [
    ("### ", HeadingLevel::H3),
    ("## ", HeadingLevel::H2),
    ("# ", HeadingLevel::H1),
];

fn match_heading(line: &str) -> Option<(HeadingLevel, &str)> {
    HEADING_PREFIXES.iter().find_map(|(prefix, level)| {
        line.strip_prefix(*prefix)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(|text| (*level, text))
    })
}

fn is_bullet(line: &str) -> bool {
    BULLET_MARKER.is_match(line)
}

fn is_numbered(line: &str) -> bool {
    NUMBER_MARKER.is_match(line)
}

fn is_table_line(line: &str) -> bool {
    line.contains('|')
}

fn strip_marker(marker: &Regex, line: &str) -> String {
    marker.replace(line, "").trim().to_string()
}

/// Splits a pipe-delimited row into trimmed cells, dropping the empty edge
/// cells produced by leading/trailing pipes.
fn split_row(line: &str) -> Vec<String> {
    let mut cells: Vec<String> = line.split('|').map(|c| c.trim().to_string()).collect();
    if cells.first().is_some_and(|c| c.is_empty()) {
        cells.remove(0);
    }
    if cells.last().is_some_and(|c| c.is_empty()) {
        cells.pop();
    }
    cells
}

// ────────────────────────────────────────────────────────────────────────────
// Parser
// ────────────────────────────────────────────────────────────────────────────

struct BlockParser<'a> {
    lines: Vec<&'a str>,
    cursor: usize,
    paragraph: Vec<&'a str>,
    blocks: Vec<Block>,
}

impl<'a> BlockParser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().collect(),
            cursor: 0,
            paragraph: Vec::new(),
            blocks: Vec::new(),
        }
    }

    fn flush_paragraph(&mut self) {
        if self.paragraph.is_empty() {
            return;
        }
        let text = self
            .paragraph
            .drain(..)
            .map(str::trim)
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string();
        if !text.is_empty() {
            self.blocks.push(Block::Paragraph { text });
        }
    }

    /// Consumes lines from the cursor while `matches` holds, returning them.
    fn take_while(&mut self, matches: impl Fn(&str) -> bool) -> Vec<&'a str> {
        let start = self.cursor;
        while self.cursor < self.lines.len() && matches(self.lines[self.cursor]) {
            self.cursor += 1;
        }
        self.lines[start..self.cursor].to_vec()
    }

    fn run(mut self) -> Vec<Block> {
        while self.cursor < self.lines.len() {
            let line = self.lines[self.cursor].trim_end();

            if line.trim().is_empty() {
                self.flush_paragraph();
                self.cursor += 1;
                continue;
            }

            if let Some((level, text)) = match_heading(line) {
                self.flush_paragraph();
                self.blocks.push(Block::Heading {
                    level,
                    text: text.to_string(),
                });
                self.cursor += 1;
                continue;
            }

            if is_bullet(line) {
                self.flush_paragraph();
                let items = self
                    .take_while(is_bullet)
                    .into_iter()
                    .map(|l| strip_marker(&BULLET_MARKER, l))
                    .collect();
                self.blocks.push(Block::BulletList { items });
                continue;
            }

            if is_numbered(line) {
                self.flush_paragraph();
                let items = self
                    .take_while(is_numbered)
                    .into_iter()
                    .map(|l| strip_marker(&NUMBER_MARKER, l))
                    .collect();
                self.blocks.push(Block::NumberedList { items });
                continue;
            }

            if is_table_line(line) {
                self.flush_paragraph();
                let rows: Vec<Vec<String>> = self
                    .take_while(is_table_line)
                    .into_iter()
                    .map(str::trim)
                    .filter(|l| !SEPARATOR_ROW.is_match(l))
                    .map(split_row)
                    .filter(|cells| !cells.is_empty())
                    .collect();
                if !rows.is_empty() {
                    self.blocks.push(Block::Table { rows });
                }
                continue;
            }

            self.paragraph.push(line);
            self.cursor += 1;
        }

        self.flush_paragraph();
        self.blocks
    }
}

/// Parses markdown text into blocks. Pure function of its input; never fails.
pub fn parse(text: &str) -> Vec<Block> {
    BlockParser::new(text).run()
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
