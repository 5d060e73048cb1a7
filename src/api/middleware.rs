use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// A required connection is absent, closed, or could not be opened
    #[error("Connection error: {0}")]
    Connection(String),

    /// Column discovery or CREATE generation produced nothing usable
    #[error("Schema error: {0}")]
    Schema(String),

    /// Row read or row write failed mid-transfer
    #[error("Transfer error: {0}")]
    Transfer(String),

    /// Ad hoc SQL against the local store failed
    #[error("Query error: {0}")]
    Query(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code used in error responses
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Connection(_) => "CONNECTION_ERROR",
            AppError::Schema(_) => "SCHEMA_ERROR",
            AppError::Transfer(_) => "TRANSFER_ERROR",
            AppError::Query(_) => "QUERY_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Connection(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Query(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Schema(_)
            | AppError::Transfer(_)
            | AppError::Database(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message without the variant prefix
    pub fn message(&self) -> &str {
        match self {
            AppError::Connection(msg)
            | AppError::Schema(msg)
            | AppError::Transfer(msg)
            | AppError::Query(msg)
            | AppError::Database(msg)
            | AppError::Validation(msg)
            | AppError::NotFound(msg)
            | AppError::Internal(msg) => msg,
        }
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = ErrorDetail::new(self.code(), self.message());

        let detail = match &self {
            AppError::Connection(_) => {
                detail.with_details("Open the remote connection with POST /api/remote/connect and retry.")
            }
            AppError::Query(msg) if msg.contains("no such table") => {
                detail.with_details("The table may not be mirrored yet. Run POST /api/mirror or list local tables.")
            }
            _ => detail,
        };

        (status, Json(ErrorResponse { error: detail })).into_response()
    }
}

/// Convert anyhow::Error to AppError
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Convert rusqlite::Error to AppError
impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_status() {
        let response = AppError::NotFound("table not found".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = AppError::Connection("remote closed".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = AppError::Query("syntax error".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_detail_creation() {
        let detail = ErrorDetail::new("TEST_CODE", "Test message");
        assert_eq!(detail.code, "TEST_CODE");
        assert_eq!(detail.message, "Test message");
        assert!(detail.details.is_none());
    }

    #[test]
    fn test_message_strips_prefix() {
        let err = AppError::Transfer("read failed".to_string());
        assert_eq!(err.message(), "read failed");
        assert_eq!(err.to_string(), "Transfer error: read failed");
        assert_eq!(err.code(), "TRANSFER_ERROR");
    }

    #[test]
    fn test_rusqlite_error_maps_to_database() {
        let err: AppError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, AppError::Database(_)));
    }
}
