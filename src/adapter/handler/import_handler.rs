use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use super::error::ImportApiError;
use super::AppState;
use crate::domain::entity::ImportRecord;
use crate::usecase::{ImportError, ImportHistoryEntry};

// --- Response DTOs ---

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ImportResponse {
    pub id: String,
    pub status: String,
    pub objects_added: i32,
    pub submitted_at: String,
    pub submitted_by: String,
    pub error_message: Option<String>,
}

impl From<ImportRecord> for ImportResponse {
    fn from(record: ImportRecord) -> Self {
        Self {
            id: record.id.to_string(),
            status: record.status.to_string(),
            objects_added: record.objects_added,
            submitted_at: record.submitted_at.to_rfc3339(),
            submitted_by: record.submitted_by,
            error_message: record.error_message,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ImportHistoryItemResponse {
    pub id: String,
    pub status: String,
    pub objects_added: i32,
    pub submitted_at: String,
    pub submitted_by: String,
    pub error_message: Option<String>,
    pub file_download_url: Option<String>,
}

impl From<ImportHistoryEntry> for ImportHistoryItemResponse {
    fn from(entry: ImportHistoryEntry) -> Self {
        Self {
            id: entry.record.id.to_string(),
            status: entry.record.status.to_string(),
            objects_added: entry.record.objects_added,
            submitted_at: entry.record.submitted_at.to_rfc3339(),
            submitted_by: entry.record.submitted_by,
            error_message: entry.record.error_message,
            file_download_url: entry.file_download_url,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ImportHistoryResponse {
    pub imports: Vec<ImportHistoryItemResponse>,
}

// --- Handlers ---

#[utoipa::path(get, path = "/healthz", responses((status = 200, description = "Health check OK")))]
pub async fn healthz() -> &'static str {
    "ok"
}

#[utoipa::path(get, path = "/readyz", responses((status = 200, description = "Ready")))]
pub async fn readyz() -> &'static str {
    "ok"
}

#[utoipa::path(
    post,
    path = "/api/v1/imports",
    request_body(content = String, description = "City descriptors as a JSON array", content_type = "application/json"),
    responses(
        (status = 200, description = "Import finished (SUCCESS or FAILURE)", body = ImportResponse),
        (status = 400, description = "Validation error"),
        (status = 500, description = "Commit inconsistency or internal error"),
    )
)]
pub async fn run_import(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ImportResponse>, ImportApiError> {
    let submitted_by = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ImportApiError::Validation("x-user-id header is required".to_string()))?
        .to_string();

    // 空ボディは参加者に触れる前に弾く
    if body.is_empty() {
        return Err(ImportApiError::Validation(
            "import document must not be empty".to_string(),
        ));
    }

    let record = state
        .import_batch_uc
        .execute(&submitted_by, body.to_vec())
        .await
        .map_err(|e| match e {
            ImportError::CommitInconsistent(msg) => ImportApiError::CommitInconsistent(msg),
            ImportError::Internal(e) => ImportApiError::Internal(e.to_string()),
        })?;

    Ok(Json(ImportResponse::from(record)))
}

#[utoipa::path(
    get,
    path = "/api/v1/imports/history",
    responses(
        (status = 200, description = "Import history, newest first", body = ImportHistoryResponse),
    )
)]
pub async fn get_import_history(
    State(state): State<AppState>,
) -> Result<Json<ImportHistoryResponse>, ImportApiError> {
    let entries = state
        .list_imports_uc
        .execute()
        .await
        .map_err(|e| ImportApiError::Internal(e.to_string()))?;

    Ok(Json(ImportHistoryResponse {
        imports: entries
            .into_iter()
            .map(ImportHistoryItemResponse::from)
            .collect(),
    }))
}
