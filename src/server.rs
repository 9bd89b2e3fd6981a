//! Webhook HTTP server.
//!
//! A job posts a report record to `/generate-ppt` and gets the deck back as
//! an attachment; the same file is kept in the output directory for
//! `/download/{filename}`. Every request runs its own generation pass over a
//! fresh template copy, so requests never share a document.
//!
//! | Route | Method | Purpose |
//! |-------|--------|---------|
//! | `/health` | GET | liveness + whether the template is reachable |
//! | `/analyze-template` | GET | placeholder inventory |
//! | `/generate-ppt` | POST | record → `.pptx` |
//! | `/download/{filename}` | GET | a previously generated deck |
//! | `/list-reports` | GET | generated decks, newest first |
//! | `/fetch-company` | GET, POST | Screener.in metrics (feature `screener`) |

use crate::config::GenerationConfig;
use crate::error::DeckError;
use crate::generate::{generate_to_dir, inspect_template};
use crate::pipeline::input::template_exists;
use crate::record::ReportRecord;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// MIME type of a `.pptx` package.
pub const PPTX_MIME: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// Fields a `/generate-ppt` payload must carry.
const REQUIRED_FIELDS: &[&str] = &["report_id"];

#[derive(Clone)]
pub struct AppState {
    config: Arc<GenerationConfig>,
}

/// Errors a handler can return; each maps to a JSON body
/// `{"success": false, "error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Deck(#[from] DeckError),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Deck(DeckError::InvalidRecord(_)) => StatusCode::BAD_REQUEST,
            ApiError::Deck(_) | ApiError::Internal(_) => {
                error!("Request failed: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "success": false, "error": self.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Build the router over a shared config.
pub fn router(config: GenerationConfig) -> Router {
    let state = AppState {
        config: Arc::new(config),
    };
    let router = Router::new()
        .route("/health", get(health))
        .route("/analyze-template", get(analyze_template))
        .route("/generate-ppt", post(generate_ppt))
        .route("/download/{filename}", get(download))
        .route("/list-reports", get(list_reports));
    #[cfg(feature = "screener")]
    let router = router.route(
        "/fetch-company",
        get(company::fetch_get).post(company::fetch_post),
    );
    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: &str, config: GenerationConfig) -> Result<(), DeckError> {
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|source| DeckError::OutputWriteFailed {
            path: config.output_dir.clone(),
            source,
        })?;
    info!("Template: {} (exists: {})", config.template, template_exists(&config.template));
    info!("Output directory: {}", config.output_dir.display());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| DeckError::Internal(format!("binding {addr}: {e}")))?;
    info!("Listening on http://{addr}");
    axum::serve(listener, router(config))
        .await
        .map_err(|e| DeckError::Internal(format!("server: {e}")))
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Local::now().to_rfc3339(),
        "template_exists": template_exists(&state.config.template),
    }))
}

async fn analyze_template(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let report = inspect_template(&state.config).await?;
    Ok(Json(json!({
        "success": true,
        "template_path": report.template,
        "slide_count": report.slide_count,
        "placeholders": report.placeholders,
    })))
}

async fn generate_ppt(State(state): State<AppState>, Json(payload): Json<Value>) -> ApiResult<Response> {
    let record = ReportRecord::from_value(payload)?;
    let missing = missing_fields(&record);
    if !missing.is_empty() {
        return Err(ApiError::BadRequest(format!("Missing required fields: {missing:?}")));
    }
    info!(
        "Received request for report: {}",
        record.text("report_id").unwrap_or_default()
    );

    let (path, output) = generate_to_dir(&record, &state.config).await?;
    info!(
        "Sending {} ({}/{} fields applied)",
        path.display(),
        output.stats.applied,
        output.results.len()
    );
    Ok(attachment(&output.file_name, output.bytes))
}

async fn download(State(state): State<AppState>, Path(filename): Path<String>) -> ApiResult<Response> {
    if !is_plain_file_name(&filename) {
        return Err(ApiError::BadRequest(format!("Invalid file name: {filename}")));
    }
    let path = state.config.output_dir.join(&filename);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(attachment(&filename, bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ApiError::NotFound("File not found".into())),
        Err(e) => Err(ApiError::Internal(e.to_string())),
    }
}

#[derive(Debug, Serialize)]
struct ReportFile {
    filename: String,
    size_bytes: u64,
    created_at: String,
}

async fn list_reports(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let mut dir = match tokio::fs::read_dir(&state.config.output_dir).await {
        Ok(dir) => dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Json(json!({ "success": true, "count": 0, "files": [] })));
        }
        Err(e) => return Err(ApiError::Internal(e.to_string())),
    };

    let mut files: Vec<(DateTime<Local>, ReportFile)> = Vec::new();
    while let Some(entry) = dir
        .next_entry()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
    {
        let filename = entry.file_name().to_string_lossy().into_owned();
        if !filename.ends_with(".pptx") {
            continue;
        }
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        let created: DateTime<Local> = meta
            .created()
            .or_else(|_| meta.modified())
            .map(DateTime::from)
            .unwrap_or_else(|_| Local::now());
        files.push((
            created,
            ReportFile {
                filename,
                size_bytes: meta.len(),
                created_at: created.to_rfc3339(),
            },
        ));
    }
    files.sort_by(|a, b| b.0.cmp(&a.0));
    let files: Vec<ReportFile> = files.into_iter().map(|(_, f)| f).collect();

    Ok(Json(json!({ "success": true, "count": files.len(), "files": files })))
}

#[cfg(feature = "screener")]
mod company {
    use super::{ApiError, ApiResult, AppState};
    use axum::extract::{Query, State};
    use axum::Json;
    use serde::Deserialize;
    use serde_json::{json, Value};
    use screener_client::{ScreenerClient, ScreenerError};

    #[derive(Debug, Deserialize)]
    pub(super) struct CompanyQuery {
        code: String,
    }

    pub(super) async fn fetch_get(
        State(state): State<AppState>,
        Query(q): Query<CompanyQuery>,
    ) -> ApiResult<Json<Value>> {
        fetch(&state, &q.code).await
    }

    pub(super) async fn fetch_post(
        State(state): State<AppState>,
        Json(q): Json<CompanyQuery>,
    ) -> ApiResult<Json<Value>> {
        fetch(&state, &q.code).await
    }

    async fn fetch(state: &AppState, code: &str) -> ApiResult<Json<Value>> {
        let code = code.trim().to_ascii_uppercase();
        if code.is_empty() {
            return Err(ApiError::BadRequest("Missing company code".into()));
        }
        let client = ScreenerClient::new(state.config.download_timeout_secs)
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        let snapshot = client.fetch_company(&code).await.map_err(|e| match e {
            ScreenerError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            ScreenerError::InvalidCode(_) => ApiError::BadRequest(e.to_string()),
            _ => ApiError::Internal(e.to_string()),
        })?;
        Ok(Json(json!({ "success": true, "code": code, "data": snapshot })))
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn attachment(filename: &str, bytes: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, PPTX_MIME.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

fn missing_fields(record: &ReportRecord) -> Vec<&'static str> {
    REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|f| !record.has(f))
        .collect()
}

/// A bare file name: no separators, no parent references, not hidden.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && !name.contains("..")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn traversal_names_are_rejected() {
        assert!(is_plain_file_name("WIPRO_a1b2c3d4_20260207_090503.pptx"));
        assert!(!is_plain_file_name("../secret.pptx"));
        assert!(!is_plain_file_name("a/b.pptx"));
        assert!(!is_plain_file_name("a\\b.pptx"));
        assert!(!is_plain_file_name(".hidden"));
        assert!(!is_plain_file_name(""));
    }

    #[test]
    fn report_id_is_required() {
        let r = ReportRecord::from_value(json!({"company_name": "Acme"})).unwrap();
        assert_eq!(missing_fields(&r), vec!["report_id"]);
        let r = ReportRecord::from_value(json!({"report_id": "r-1"})).unwrap();
        assert!(missing_fields(&r).is_empty());
    }

    #[tokio::test]
    async fn list_reports_on_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = GenerationConfig::builder()
            .output_dir(dir.path().join("absent"))
            .build()
            .unwrap();
        let state = AppState {
            config: Arc::new(config),
        };
        let Json(body) = list_reports(State(state)).await.unwrap();
        assert_eq!(body["count"], 0);
    }
}
