//! Report generation pipeline.
//!
//! prompt → backend → fenced-block extraction → parse → build → paginate/render
//! → artifact store. Every failure is classified into a `ReportError` and folded
//! into the returned `GenerationResult`; `generate` itself never fails.
//!
//! # spawn_blocking pattern
//! Parsing, layout and PDF serialization are CPU-bound and run together on a
//! blocking worker so the async executor only waits on the backend and the disk.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Local;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::layout::{build, Element, PageConfig, StyleRegistry};
use crate::llm_client::{extract_markdown, LlmError, TextGenerator};
use crate::markdown::parse;
use crate::render::{render, RenderError, RenderOptions};
use crate::report::naming::{self, NameError, NameOrigin};
use crate::report::store::{ArtifactStore, StoreError, WritePolicy};

pub const SUCCESS_MESSAGE: &str = "PDF report generated successfully";

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    BackendTimeout,
    BackendUnreachable,
    BackendRejected,
    BackendMalformedResponse,
    EmptyContent,
    InvalidFilename,
    RenderFailure,
    FilesystemFailure,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::BackendTimeout => "BACKEND_TIMEOUT",
            ErrorKind::BackendUnreachable => "BACKEND_UNREACHABLE",
            ErrorKind::BackendRejected => "BACKEND_REJECTED",
            ErrorKind::BackendMalformedResponse => "BACKEND_MALFORMED_RESPONSE",
            ErrorKind::EmptyContent => "EMPTY_CONTENT",
            ErrorKind::InvalidFilename => "INVALID_FILENAME",
            ErrorKind::RenderFailure => "RENDER_FAILURE",
            ErrorKind::FilesystemFailure => "FILESYSTEM_FAILURE",
        }
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Generation backend timed out after {0}s")]
    BackendTimeout(u64),

    #[error("Generation backend unreachable: {0}")]
    BackendUnreachable(String),

    #[error("Generation backend rejected the request (status {status}): {message}")]
    BackendRejected { status: u16, message: String },

    #[error("Generation backend returned a malformed response: {0}")]
    BackendMalformedResponse(String),

    #[error("Generation backend returned no content")]
    EmptyContent,

    #[error("Invalid filename: {0}")]
    InvalidFilename(#[from] NameError),

    #[error("Rendering failed: {0}")]
    RenderFailure(String),

    #[error("Could not save report: {0}")]
    FilesystemFailure(String),
}

impl ReportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReportError::BackendTimeout(_) => ErrorKind::BackendTimeout,
            ReportError::BackendUnreachable(_) => ErrorKind::BackendUnreachable,
            ReportError::BackendRejected { .. } => ErrorKind::BackendRejected,
            ReportError::BackendMalformedResponse(_) => ErrorKind::BackendMalformedResponse,
            ReportError::EmptyContent => ErrorKind::EmptyContent,
            ReportError::InvalidFilename(_) => ErrorKind::InvalidFilename,
            ReportError::RenderFailure(_) => ErrorKind::RenderFailure,
            ReportError::FilesystemFailure(_) => ErrorKind::FilesystemFailure,
        }
    }
}

impl From<LlmError> for ReportError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Timeout { secs } => ReportError::BackendTimeout(secs),
            LlmError::Unreachable(msg) | LlmError::Client(msg) => {
                ReportError::BackendUnreachable(msg)
            }
            LlmError::Api { status, message } => ReportError::BackendRejected { status, message },
            LlmError::Malformed(msg) => ReportError::BackendMalformedResponse(msg),
        }
    }
}

impl From<RenderError> for ReportError {
    fn from(e: RenderError) -> Self {
        ReportError::RenderFailure(e.to_string())
    }
}

impl From<StoreError> for ReportError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidName(name) => ReportError::InvalidFilename(name),
            other => ReportError::FilesystemFailure(other.to_string()),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Request / Result types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub status: ResultStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// The rendered artifact, handed to callers that stream it back.
    #[serde(skip)]
    pub pdf: Option<Bytes>,
}

impl GenerationResult {
    fn success(artifact: Artifact) -> Self {
        GenerationResult {
            status: ResultStatus::Success,
            message: SUCCESS_MESSAGE.to_string(),
            filename: Some(artifact.filename),
            path: Some(artifact.path),
            size_bytes: Some(artifact.size_bytes),
            error_kind: None,
            pdf: Some(artifact.bytes),
        }
    }

    fn failure(error: &ReportError) -> Self {
        GenerationResult {
            status: ResultStatus::Error,
            message: error.to_string(),
            filename: None,
            path: None,
            size_bytes: None,
            error_kind: Some(error.kind()),
            pdf: None,
        }
    }
}

struct Artifact {
    filename: String,
    path: String,
    size_bytes: u64,
    bytes: Bytes,
}

// ────────────────────────────────────────────────────────────────────────────
// Service
// ────────────────────────────────────────────────────────────────────────────

pub struct ReportService {
    generator: Arc<dyn TextGenerator>,
    store: Arc<ArtifactStore>,
    styles: Arc<StyleRegistry>,
    page: PageConfig,
    default_model: String,
    timeout: Duration,
}

impl ReportService {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        store: Arc<ArtifactStore>,
        styles: Arc<StyleRegistry>,
        page: PageConfig,
        default_model: String,
        timeout: Duration,
    ) -> Self {
        Self {
            generator,
            store,
            styles,
            page,
            default_model,
            timeout,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub async fn generate(&self, request: GenerateRequest) -> GenerationResult {
        let request_id = Uuid::new_v4();
        let span = info_span!("generate_report", %request_id);

        match self.run(request).instrument(span.clone()).await {
            Ok(artifact) => {
                span.in_scope(|| {
                    info!(
                        filename = %artifact.filename,
                        size_bytes = artifact.size_bytes,
                        "Report generated"
                    )
                });
                GenerationResult::success(artifact)
            }
            Err(e) => {
                span.in_scope(|| warn!(kind = e.kind().code(), "Report generation failed: {e}"));
                GenerationResult::failure(&e)
            }
        }
    }

    async fn run(&self, request: GenerateRequest) -> Result<Artifact, ReportError> {
        let now = Local::now();
        let resolved = naming::resolve(request.filename.as_deref(), now)?;
        let model = request
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.default_model.as_str());

        info!(model, filename = %resolved.filename, "Requesting report content");

        let raw = tokio::time::timeout(self.timeout, self.generator.generate(model, &request.prompt))
            .await
            .map_err(|_| ReportError::BackendTimeout(self.timeout.as_secs()))??;

        let markdown = extract_markdown(&raw).to_string();
        if markdown.is_empty() {
            return Err(ReportError::EmptyContent);
        }

        let styles = self.styles.clone();
        let page = self.page.clone();
        let generated_on = now.date_naive();

        // CPU-bound pass, kept off the async executor.
        let pdf = tokio::task::spawn_blocking(move || {
            let story = build(parse(&markdown));
            let title = story.iter().find_map(|element| match element {
                Element::Title(text) => Some(text.clone()),
                _ => None,
            });
            let options = RenderOptions {
                generated_on,
                title,
            };
            render(&story, &styles, &page, &options)
        })
        .await
        .map_err(|e| RenderError::Worker(format!("spawn_blocking failed in render: {e}")))??;

        let policy = match resolved.origin {
            NameOrigin::Caller => WritePolicy::Overwrite,
            NameOrigin::Timestamp => WritePolicy::Unique,
        };
        let bytes = Bytes::from(pdf);
        let stored = self
            .store
            .write(&resolved.filename, bytes.clone(), policy)
            .await?;

        Ok(Artifact {
            filename: stored.filename,
            path: stored.path.display().to_string(),
            size_bytes: stored.size_bytes,
            bytes,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::layout::default_page_config;

    impl GenerationResult {
        pub(crate) fn is_success(&self) -> bool {
            self.status == ResultStatus::Success
        }
    }

    /// Canned backend that records the model it was asked for.
    pub(crate) struct StubGenerator {
        reply: Result<String, fn() -> LlmError>,
        delay: Option<Duration>,
        pub(crate) seen_models: Mutex<Vec<String>>,
    }

    impl StubGenerator {
        pub(crate) fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                delay: None,
                seen_models: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing(make: fn() -> LlmError) -> Self {
            Self {
                reply: Err(make),
                delay: None,
                seen_models: Mutex::new(Vec::new()),
            }
        }

        fn delayed(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    #[async_trait]
    impl TextGenerator for StubGenerator {
        async fn generate(&self, model: &str, _prompt: &str) -> Result<String, LlmError> {
            self.seen_models.lock().unwrap().push(model.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    pub(crate) async fn service_with(
        generator: Arc<dyn TextGenerator>,
        dir: &std::path::Path,
    ) -> ReportService {
        let store = ArtifactStore::open(dir.join("generated_reports"))
            .await
            .unwrap();
        ReportService::new(
            generator,
            Arc::new(store),
            Arc::new(StyleRegistry::default()),
            default_page_config(),
            "deepseek-v2:latest".to_string(),
            Duration::from_secs(120),
        )
    }

    fn request(prompt: &str) -> GenerateRequest {
        GenerateRequest {
            prompt: prompt.to_string(),
            ..Default::default()
        }
    }

    const FENCED_REPLY: &str = "Sure! Here is your report:\n```markdown\n# Sales Summary\n\n## Overview\nRevenue grew 12%.\n\n- North\n- South\n\n| Region | Revenue |\n|---|---|\n| North | 10 |\n```\nLet me know!";

    #[tokio::test]
    async fn test_generate_success_writes_pdf() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service_with(Arc::new(StubGenerator::replying(FENCED_REPLY)), tmp.path()).await;

        let mut req = request("sales summary");
        req.filename = Some("sales".to_string());
        let result = service.generate(req).await;

        assert!(result.is_success(), "{result:?}");
        assert_eq!(result.message, SUCCESS_MESSAGE);
        assert_eq!(result.filename.as_deref(), Some("sales.pdf"));
        let on_disk = std::fs::read(tmp.path().join("generated_reports/sales.pdf")).unwrap();
        assert_eq!(result.size_bytes, Some(on_disk.len() as u64));
        assert!(on_disk.starts_with(b"%PDF-"));
        assert_eq!(result.pdf.as_deref(), Some(on_disk.as_slice()));
    }

    #[tokio::test]
    async fn test_generate_without_filename_uses_timestamp_and_default_model() {
        let tmp = tempfile::tempdir().unwrap();
        let generator = Arc::new(StubGenerator::replying("# Title\n\nBody"));
        let service = service_with(generator.clone(), tmp.path()).await;

        let result = service.generate(request("anything")).await;

        assert!(result.is_success());
        let name = result.filename.unwrap();
        assert!(name.starts_with("AI_Report_") && name.ends_with(".pdf"), "{name}");
        assert_eq!(
            generator.seen_models.lock().unwrap().as_slice(),
            ["deepseek-v2:latest".to_string()]
        );
    }

    #[tokio::test]
    async fn test_generate_uses_requested_model() {
        let tmp = tempfile::tempdir().unwrap();
        let generator = Arc::new(StubGenerator::replying("Body"));
        let service = service_with(generator.clone(), tmp.path()).await;

        let mut req = request("x");
        req.model = Some("llama3".to_string());
        service.generate(req).await;

        assert_eq!(
            generator.seen_models.lock().unwrap().as_slice(),
            ["llama3".to_string()]
        );
    }

    #[tokio::test]
    async fn test_same_second_default_names_do_not_collide() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service_with(Arc::new(StubGenerator::replying("Body")), tmp.path()).await;

        let (a, b) = tokio::join!(service.generate(request("a")), service.generate(request("b")));
        assert!(a.is_success() && b.is_success());
        assert_ne!(a.filename, b.filename);
    }

    // ── failure classification ──

    #[tokio::test]
    async fn test_empty_content_is_not_rendered() {
        let tmp = tempfile::tempdir().unwrap();
        let service =
            service_with(Arc::new(StubGenerator::replying("```markdown\n\n```")), tmp.path()).await;

        let result = service.generate(request("x")).await;

        assert_eq!(result.status, ResultStatus::Error);
        assert_eq!(result.error_kind, Some(ErrorKind::EmptyContent));
        assert!(service.store().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backend_errors_are_classified() {
        let cases: [(fn() -> LlmError, ErrorKind); 4] = [
            (|| LlmError::Timeout { secs: 120 }, ErrorKind::BackendTimeout),
            (
                || LlmError::Unreachable("connection refused".into()),
                ErrorKind::BackendUnreachable,
            ),
            (
                || LlmError::Api {
                    status: 404,
                    message: "model not found".into(),
                },
                ErrorKind::BackendRejected,
            ),
            (
                || LlmError::Malformed("expected value".into()),
                ErrorKind::BackendMalformedResponse,
            ),
        ];
        for (make, expected) in cases {
            let tmp = tempfile::tempdir().unwrap();
            let service = service_with(Arc::new(StubGenerator::failing(make)), tmp.path()).await;
            let result = service.generate(request("x")).await;
            assert_eq!(result.error_kind, Some(expected));
            assert!(result.filename.is_none());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_backend_times_out() {
        let tmp = tempfile::tempdir().unwrap();
        let generator =
            StubGenerator::replying("Body").delayed(Duration::from_secs(600));
        let mut service = service_with(Arc::new(generator), tmp.path()).await;
        service.timeout = Duration::from_secs(5);

        let result = service.generate(request("x")).await;

        assert_eq!(result.error_kind, Some(ErrorKind::BackendTimeout));
        assert!(result.message.contains("5s"));
    }

    #[tokio::test]
    async fn test_invalid_filename_rejected_before_backend_call() {
        let tmp = tempfile::tempdir().unwrap();
        let generator = Arc::new(StubGenerator::replying("Body"));
        let service = service_with(generator.clone(), tmp.path()).await;

        let mut req = request("x");
        req.filename = Some("../escape".to_string());
        let result = service.generate(req).await;

        assert_eq!(result.error_kind, Some(ErrorKind::InvalidFilename));
        assert!(generator.seen_models.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_page_is_render_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let mut service = service_with(Arc::new(StubGenerator::replying("Body")), tmp.path()).await;
        service.page.margin_left = service.page.width;

        let result = service.generate(request("x")).await;

        assert_eq!(result.error_kind, Some(ErrorKind::RenderFailure));
    }

    #[tokio::test]
    async fn test_oversized_table_row_is_render_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let reply = format!("| Head |\n| {} |", "word ".repeat(4000));
        let service = service_with(Arc::new(StubGenerator::replying(&reply)), tmp.path()).await;

        let result = service.generate(request("x")).await;

        assert_eq!(result.error_kind, Some(ErrorKind::RenderFailure));
        assert!(service.store().list().await.unwrap().is_empty());
    }

    #[test]
    fn test_result_serialization() {
        let failure = GenerationResult::failure(&ReportError::EmptyContent);
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error_kind"], "EMPTY_CONTENT");
        assert!(json.get("filename").is_none());
        assert!(json.get("pdf").is_none());
    }
}
