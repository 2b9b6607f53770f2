// Report API: orchestration, artifact naming and storage, HTTP handlers.

pub mod handlers;
pub mod naming;
pub mod orchestrator;
pub mod store;

pub use orchestrator::{ErrorKind, ReportService};
pub use store::ArtifactStore;
