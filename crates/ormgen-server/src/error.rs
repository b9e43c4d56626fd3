//! Error handling for the server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Internal server error.
    #[error("{0}")]
    Internal(String),
    /// Bad request.
    #[error("{0}")]
    BadRequest(String),
    /// Not found.
    #[error("{0}")]
    NotFound(String),
}

/// Error response body.
#[derive(Serialize)]
pub struct ErrorResponse {
    /// Error flag.
    pub error: bool,
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: true,
            code: code.to_string(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<ormgen_core::Error> for AppError {
    fn from(err: ormgen_core::Error) -> Self {
        use ormgen_core::Error;
        match err {
            Error::NotFound | Error::InvalidPage(_) | Error::UnknownEntity(_) => {
                AppError::NotFound(err.to_string())
            }
            Error::InvalidField { .. } | Error::InvalidLookup(_) | Error::InvalidValue { .. } => {
                AppError::BadRequest(err.to_string())
            }
            _ => AppError::Internal(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_mapping() {
        let not_found = AppError::from(ormgen_core::Error::InvalidPage("9".into()));
        assert_eq!(not_found.status_and_code().0, StatusCode::NOT_FOUND);

        let bad = AppError::from(ormgen_core::Error::InvalidLookup("x".into()));
        assert_eq!(bad.status_and_code().0, StatusCode::BAD_REQUEST);

        let internal = AppError::from(ormgen_core::Error::Config("broken".into()));
        assert_eq!(internal.status_and_code().1, "INTERNAL_ERROR");
    }
}
