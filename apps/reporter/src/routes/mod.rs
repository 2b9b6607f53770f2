pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::report::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::handle_index))
        .route("/health", get(health::health_handler))
        // Report API
        .route("/generate_report", post(handlers::handle_generate_report))
        .route("/download/:filename", get(handlers::handle_download))
        .route("/list", get(handlers::handle_list))
        .with_state(state)
}
