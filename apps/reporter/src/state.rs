use std::sync::Arc;

use crate::config::Config;
use crate::report::ReportService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Generation pipeline plus the artifact store it writes to.
    pub reports: Arc<ReportService>,
}
