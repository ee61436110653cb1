use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConsultaError>;

/// Failures that abort a request. Upstream problems are never represented
/// here: they travel as data inside the aggregate.
#[derive(Error, Debug)]
pub enum ConsultaError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ConsultaError {
    pub fn storage(context: &str, err: impl std::fmt::Display) -> Self {
        ConsultaError::Storage(format!("{context}: {err}"))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ConsultaError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ConsultaError::NotFound(_) => StatusCode::NOT_FOUND,
            ConsultaError::Storage(_) | ConsultaError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ConsultaError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(
            ConsultaError::InvalidInput("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ConsultaError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ConsultaError::storage("write", "disk full").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn storage_helper_keeps_context() {
        let err = ConsultaError::storage("Failed to write record", "permission denied");
        assert_eq!(
            err.to_string(),
            "storage error: Failed to write record: permission denied"
        );
    }
}
