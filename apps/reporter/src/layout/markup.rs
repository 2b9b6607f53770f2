//! Inline markup passthrough for paragraph text.
//!
//! Only `<b>`, `<strong>`, `<i>`, `<em>` and their closing tags are honored.
//! Any other `<...>` sequence, unbalanced closer or stray `<` is kept as literal
//! text, so malformed input never fails to render.

use crate::layout::font_metrics::FontFace;

/// A contiguous piece of text in a single face.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub text: String,
    pub face: FontFace,
}

enum Tag {
    Bold(bool),
    Italic(bool),
}

fn recognize(tag: &str) -> Option<Tag> {
    match tag.to_ascii_lowercase().as_str() {
        "b" | "strong" => Some(Tag::Bold(true)),
        "/b" | "/strong" => Some(Tag::Bold(false)),
        "i" | "em" => Some(Tag::Italic(true)),
        "/i" | "/em" => Some(Tag::Italic(false)),
        _ => None,
    }
}

/// Splits `text` into runs. `base_bold` comes from the paragraph style.
/// Nesting is tracked with depth counters so `<b><b>x</b>y</b>` stays bold for `y`.
pub fn parse_runs(text: &str, base_bold: bool) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    let mut bold_depth = 0u32;
    let mut italic_depth = 0u32;
    let mut current = String::new();
    let mut rest = text;

    let face = |bold: u32, italic: u32| FontFace::from_flags(base_bold || bold > 0, italic > 0);

    while let Some(open) = rest.find('<') {
        current.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let tag = after
            .find('>')
            .and_then(|close| recognize(&after[..close]).map(|t| (t, close)));

        match tag {
            Some((tag, close)) => {
                let before = face(bold_depth, italic_depth);
                match tag {
                    Tag::Bold(true) => bold_depth += 1,
                    Tag::Bold(false) => bold_depth = bold_depth.saturating_sub(1),
                    Tag::Italic(true) => italic_depth += 1,
                    Tag::Italic(false) => italic_depth = italic_depth.saturating_sub(1),
                }
                if face(bold_depth, italic_depth) != before && !current.is_empty() {
                    runs.push(Run {
                        text: std::mem::take(&mut current),
                        face: before,
                    });
                }
                rest = &after[close + 1..];
            }
            None => {
                current.push('<');
                rest = after;
            }
        }
    }
    current.push_str(rest);

    if !current.is_empty() {
        runs.push(Run {
            text: current,
            face: face(bold_depth, italic_depth),
        });
    }
    runs
}
