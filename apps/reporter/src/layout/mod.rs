// Layout: story building, styles, metrics and pagination.
// Everything here is pure and CPU-bound; callers on the async runtime must
// run it inside tokio::task::spawn_blocking.

pub mod font_metrics;
pub mod markup;
pub mod paginator;
pub mod story;
pub mod styles;

// Re-export the public API consumed by render and report.
pub use paginator::{paginate, DrawOp, Page};
pub use story::{build, Element, Story};
pub use styles::{default_page_config, PageConfig, StyleRegistry};
