mod config;
mod errors;
mod layout;
mod llm_client;
mod markdown;
mod render;
mod report;
mod routes;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::layout::{default_page_config, StyleRegistry};
use crate::llm_client::OllamaClient;
use crate::report::{ArtifactStore, ReportService};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting reporter v{}", env!("CARGO_PKG_VERSION"));

    // Output directory is created here if missing
    let store = ArtifactStore::open(config.output_dir.clone())
        .await
        .with_context(|| format!("Cannot open output directory {}", config.output_dir.display()))?;

    // Initialize generation backend client
    let generator = OllamaClient::new(config.ollama_api_url.clone(), config.request_timeout)?;
    info!(
        "Generation backend: {} (default model: {}, timeout: {}s)",
        generator.api_url(),
        config.default_model,
        config.request_timeout.as_secs()
    );

    // Styles and page geometry are process-wide and read-only
    let page_config = default_page_config();
    info!(
        "Page: {:.2}x{:.2}pt, frame {:.2}x{:.2}pt",
        page_config.width,
        page_config.height,
        page_config.content_width(),
        page_config.content_height()
    );

    let reports = ReportService::new(
        Arc::new(generator),
        Arc::new(store),
        Arc::new(StyleRegistry::default()),
        page_config,
        config.default_model.clone(),
        config.request_timeout,
    );

    // Build app state
    let state = AppState {
        reports: Arc::new(reports),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.bind_addr, config.port)
        .parse()
        .context("BIND_ADDR and PORT must form a valid socket address")?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
