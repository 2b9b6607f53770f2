//! Axum route handlers for the Report API.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::report::orchestrator::GenerateRequest;
use crate::report::store::{download_url, ArtifactInfo};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GenerateReportBody {
    pub prompt: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    /// Stream the PDF back (default) or answer with JSON metadata.
    #[serde(default)]
    pub return_file: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct GenerateReportResponse {
    pub status: &'static str,
    pub message: String,
    pub filename: String,
    pub download_url: String,
    pub size_bytes: u64,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub status: &'static str,
    pub count: usize,
    pub reports: Vec<ArtifactInfo>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /
///
/// Capability descriptor plus the configured default model.
pub async fn handle_index(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": "AI Report Generator",
        "version": env!("CARGO_PKG_VERSION"),
        "default_model": state.config.default_model,
        "endpoints": {
            "/generate_report": {
                "method": "POST",
                "description": "Generate a PDF report from a prompt",
                "body": {
                    "prompt": "string (required)",
                    "model": "string (optional)",
                    "filename": "string (optional)",
                    "return_file": "boolean (optional, default true)"
                }
            },
            "/download/<filename>": {
                "method": "GET",
                "description": "Download a previously generated report"
            },
            "/list": {
                "method": "GET",
                "description": "List generated reports, newest first"
            },
            "/health": {
                "method": "GET",
                "description": "Service health"
            }
        }
    }))
}

/// POST /generate_report
///
/// Full pipeline: backend call → markdown → PDF → store. Answers with the PDF
/// as an attachment unless `return_file` is false.
pub async fn handle_generate_report(
    State(state): State<AppState>,
    payload: Result<Json<GenerateReportBody>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) =
        payload.map_err(|e| AppError::Validation(format!("Invalid JSON body: {}", e.body_text())))?;

    let prompt = match body.prompt {
        Some(prompt) if !prompt.trim().is_empty() => prompt,
        _ => {
            return Err(AppError::Validation(
                "Missing 'prompt' in request body, e.g. {\"prompt\": \"Quarterly sales summary\"}"
                    .to_string(),
            ))
        }
    };

    let result = state
        .reports
        .generate(GenerateRequest {
            prompt,
            model: body.model,
            filename: body.filename,
        })
        .await;

    if let Some(kind) = result.error_kind {
        return Err(AppError::Generation {
            kind,
            message: result.message,
        });
    }

    let filename = result.filename.unwrap_or_default();
    if body.return_file.unwrap_or(true) {
        let pdf = result.pdf.ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("generated report '{filename}' has no bytes"))
        })?;
        return Ok(attachment(&filename, pdf));
    }

    Ok(Json(GenerateReportResponse {
        status: "success",
        message: result.message,
        download_url: download_url(&filename),
        filename,
        size_bytes: result.size_bytes.unwrap_or_default(),
    })
    .into_response())
}

/// GET /download/:filename
pub async fn handle_download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let pdf = state.reports.store().read(&filename).await?;
    Ok(attachment(&filename, pdf))
}

/// GET /list
pub async fn handle_list(State(state): State<AppState>) -> Result<Json<ListResponse>, AppError> {
    let reports = state.reports.store().list().await?;
    Ok(Json(ListResponse {
        status: "success",
        count: reports.len(),
        reports,
    }))
}

fn attachment(filename: &str, pdf: Bytes) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", header_safe(filename)),
            ),
        ],
        pdf,
    )
        .into_response()
}

/// Header values must be visible ASCII; quotes would end the parameter.
fn header_safe(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::llm_client::{LlmError, TextGenerator};
    use crate::report::orchestrator::tests::{service_with, StubGenerator};
    use crate::routes::build_router;

    async fn app_with(generator: Arc<dyn TextGenerator>, dir: &std::path::Path) -> axum::Router {
        let service = service_with(generator, dir).await;
        let config = Config {
            port: 5000,
            bind_addr: "127.0.0.1".to_string(),
            output_dir: dir.join("generated_reports"),
            ollama_api_url: "http://localhost:11434/api/generate".to_string(),
            default_model: "deepseek-v2:latest".to_string(),
            request_timeout: Duration::from_secs(120),
            rust_log: "info".to_string(),
        };
        build_router(AppState {
            config,
            reports: Arc::new(service),
        })
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_header_safe() {
        assert_eq!(header_safe("q3 report.pdf"), "q3 report.pdf");
        assert_eq!(header_safe("bad\"name.pdf"), "bad_name.pdf");
        assert_eq!(header_safe("café.pdf"), "caf_.pdf");
    }

    // ── /generate_report ──

    #[tokio::test]
    async fn test_generate_returns_pdf_attachment_by_default() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app_with(Arc::new(StubGenerator::replying("# Title\n\nBody")), tmp.path()).await;

        let response = app
            .oneshot(post_json(
                "/generate_report",
                r#"{"prompt": "write it", "filename": "weekly"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"weekly.pdf\""
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[tokio::test]
    async fn test_generate_json_mode() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app_with(Arc::new(StubGenerator::replying("Body")), tmp.path()).await;

        let response = app
            .oneshot(post_json(
                "/generate_report",
                r#"{"prompt": "write it", "filename": "weekly.pdf", "return_file": false}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "success");
        assert_eq!(json["filename"], "weekly.pdf");
        assert_eq!(json["download_url"], "/download/weekly.pdf");
        assert!(json["size_bytes"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_generate_missing_prompt_is_400() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app_with(Arc::new(StubGenerator::replying("Body")), tmp.path()).await;

        let response = app
            .oneshot(post_json("/generate_report", r#"{"prompt": "   "}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_generate_invalid_json_is_400() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app_with(Arc::new(StubGenerator::replying("Body")), tmp.path()).await;

        let response = app
            .oneshot(post_json("/generate_report", "{not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_generate_backend_failures_map_to_gateway_statuses() {
        let cases: [(fn() -> LlmError, StatusCode, &str); 2] = [
            (
                || LlmError::Timeout { secs: 120 },
                StatusCode::GATEWAY_TIMEOUT,
                "BACKEND_TIMEOUT",
            ),
            (
                || LlmError::Unreachable("refused".into()),
                StatusCode::BAD_GATEWAY,
                "BACKEND_UNREACHABLE",
            ),
        ];
        for (make, status, code) in cases {
            let tmp = tempfile::tempdir().unwrap();
            let app = app_with(Arc::new(StubGenerator::failing(make)), tmp.path()).await;
            let response = app
                .oneshot(post_json("/generate_report", r#"{"prompt": "x"}"#))
                .await
                .unwrap();
            assert_eq!(response.status(), status);
            assert_eq!(json_body(response).await["error"]["code"], code);
        }
    }

    #[tokio::test]
    async fn test_generate_empty_content_is_502() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app_with(Arc::new(StubGenerator::replying("   ")), tmp.path()).await;

        let response = app
            .oneshot(post_json("/generate_report", r#"{"prompt": "x"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(json_body(response).await["error"]["code"], "EMPTY_CONTENT");
    }

    #[tokio::test]
    async fn test_generate_invalid_filename_is_400() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app_with(Arc::new(StubGenerator::replying("Body")), tmp.path()).await;

        let response = app
            .oneshot(post_json(
                "/generate_report",
                r#"{"prompt": "x", "filename": "../../etc/passwd"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "INVALID_FILENAME");
    }

    // ── /download, /list, / ──

    #[tokio::test]
    async fn test_download_missing_is_404() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app_with(Arc::new(StubGenerator::replying("Body")), tmp.path()).await;

        let response = app.oneshot(get("/download/nothing.pdf")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["status"], "error");
    }

    #[tokio::test]
    async fn test_download_invalid_name_is_400() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app_with(Arc::new(StubGenerator::replying("Body")), tmp.path()).await;

        let response = app.oneshot(get("/download/..%5Csecret.pdf")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_generate_then_download_and_list() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app_with(Arc::new(StubGenerator::replying("Body")), tmp.path()).await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/generate_report",
                r#"{"prompt": "x", "filename": "kept", "return_file": false}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.clone().oneshot(get("/download/kept.pdf")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");

        let response = app.oneshot(get("/list")).await.unwrap();
        let json = json_body(response).await;
        assert_eq!(json["status"], "success");
        assert_eq!(json["count"], 1);
        assert_eq!(json["reports"][0]["filename"], "kept.pdf");
        assert_eq!(json["reports"][0]["download_url"], "/download/kept.pdf");
        assert!(json["reports"][0]["created"].is_string());
    }

    #[tokio::test]
    async fn test_index_and_health() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app_with(Arc::new(StubGenerator::replying("Body")), tmp.path()).await;

        let json = json_body(app.clone().oneshot(get("/")).await.unwrap()).await;
        assert_eq!(json["service"], "AI Report Generator");
        assert_eq!(json["default_model"], "deepseek-v2:latest");
        assert!(json["endpoints"]["/generate_report"].is_object());

        let json = json_body(app.oneshot(get("/health")).await.unwrap()).await;
        assert_eq!(json["status"], "ok");
    }
}
