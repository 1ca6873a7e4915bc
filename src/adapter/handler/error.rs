use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::ErrorResponse;

/// ImportApiError はインポートAPIのエラー型。
#[derive(Debug, thiserror::Error)]
pub enum ImportApiError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("commit inconsistent: {0}")]
    CommitInconsistent(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ImportApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ImportApiError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "IMPORT_VALIDATION_ERROR",
                msg.as_str(),
            ),
            ImportApiError::CommitInconsistent(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IMPORT_COMMIT_INCONSISTENT",
                msg.as_str(),
            ),
            ImportApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IMPORT_INTERNAL_ERROR",
                msg.as_str(),
            ),
        };

        let body = ErrorResponse::new(code, message);
        (status, Json(body)).into_response()
    }
}
