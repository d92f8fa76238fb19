use axum::Json;
use axum::http::header::CONTENT_RANGE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::domain::file::CatalogError;

#[derive(Error, Debug)]
pub enum AppError {
    /// Bad input: missing field, disallowed type, oversized payload, malformed id.
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("requested range not satisfiable, total length is {total_length}")]
    RangeNotSatisfiable { total_length: u64 },

    #[error("storage write failed: {0}")]
    StorageWrite(String),

    #[error("chunk write conflict: {0}")]
    Conflict(String),

    #[error("upload source interrupted: {0}")]
    SourceInterrupted(String),

    /// Raised after a success status was already sent; the transport has to
    /// abort the connection.
    #[error("stream terminated: {0}")]
    StreamTerminated(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::SourceInterrupted(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::StorageWrite(_)
            | Self::Conflict(_)
            | Self::StreamTerminated(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::NotFound(_) => "NotFoundError",
            Self::RangeNotSatisfiable { .. } => "RangeNotSatisfiableError",
            Self::StorageWrite(_) => "StorageWriteError",
            Self::Conflict(_) => "ConflictError",
            Self::SourceInterrupted(_) => "SourceInterruptedError",
            Self::StreamTerminated(_) => "StreamTerminatedError",
            Self::Internal(_) => "ServerError",
        }
    }

    /// Message returned to the client. Server-side failures keep their
    /// details in the log only.
    fn public_message(&self) -> String {
        match self {
            Self::StorageWrite(_) | Self::Conflict(_) => "Failed to store file".to_string(),
            Self::StreamTerminated(_) | Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: ErrorDetail,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetail {
    message: String,
    #[serde(rename = "type")]
    kind: &'static str,
    status_code: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }

        let body = ErrorBody {
            success: false,
            error: ErrorDetail {
                message: self.public_message(),
                kind: self.kind(),
                status_code: status_code.as_u16(),
            },
        };
        let mut response = (status_code, Json(body)).into_response();

        if let Self::RangeNotSatisfiable { total_length } = self {
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{total_length}")) {
                response.headers_mut().insert(CONTENT_RANGE, value);
            }
        }
        response
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(id) => AppError::NotFound(format!("file {id}")),
            other => AppError::Internal(other.to_string()),
        }
    }
}
