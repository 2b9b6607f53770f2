// Markdown intake: a forgiving line-oriented parser for model-generated text.
// Recognizes headings, bullet/numbered lists, pipe tables and paragraphs only.
// Anything it cannot classify degrades to a paragraph; parsing never fails.

pub mod parser;

pub use parser::{parse, Block, HeadingLevel};
