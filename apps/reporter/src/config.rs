use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bind_addr: String,
    pub output_dir: PathBuf,
    pub ollama_api_url: String,
    pub default_model: String,
    pub request_timeout: Duration,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: env_or("PORT", "5000")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            bind_addr: env_or("BIND_ADDR", "127.0.0.1"),
            output_dir: PathBuf::from(env_or("OUTPUT_DIR", "./generated_reports")),
            ollama_api_url: env_or("OLLAMA_API_URL", "http://localhost:11434/api/generate"),
            default_model: env_or("DEFAULT_MODEL", "deepseek-v2:latest"),
            request_timeout: Duration::from_secs(
                env_or("REQUEST_TIMEOUT_SECS", "120")
                    .parse::<u64>()
                    .context("REQUEST_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
