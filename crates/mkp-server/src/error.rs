//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for [`mkp_core::Error`] so that route handlers
//! can return `Result<T, mkp_core::Error>` directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
pub struct AppError {
    inner: mkp_core::Error,
}

impl AppError {
    pub fn new(inner: mkp_core::Error) -> Self {
        Self { inner }
    }
}

impl From<mkp_core::Error> for AppError {
    fn from(e: mkp_core::Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                "Server error in API handler"
            );
        }

        let code = match &self.inner {
            mkp_core::Error::Config(_) => "config_error",
            mkp_core::Error::Extraction { .. } => "extraction_error",
            mkp_core::Error::Mutation { .. } => "mutation_error",
            mkp_core::Error::Remux { .. } => "remux_error",
            mkp_core::Error::Archive(_) => "archive_error",
            mkp_core::Error::LockBusy { .. } => "file_busy",
            mkp_core::Error::NotFound { .. } => "not_found",
            mkp_core::Error::Validation(_) => "validation_error",
            mkp_core::Error::Io { .. } => "io_error",
            mkp_core::Error::Internal(_) => "internal_error",
        };

        let body = json!({
            "error": self.inner.to_string(),
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
