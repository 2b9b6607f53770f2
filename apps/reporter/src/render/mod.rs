// Artifact rendering: paginated pages → PDF bytes.

pub mod pdf;

use thiserror::Error;

pub use pdf::{render, RenderOptions};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Invalid page geometry: {0}")]
    InvalidPage(String),

    #[error("Content does not fit on a page: {0}")]
    Overflow(String),

    #[error("Render worker failed: {0}")]
    Worker(String),
}
