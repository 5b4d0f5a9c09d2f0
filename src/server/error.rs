//! HTTP error mapping with structured JSON bodies.

use crate::error::DocFixError;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub code: &'static str,
}

/// Errors a handler can return.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] DocFixError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Invalid upload: {detail}")]
    Multipart { status: StatusCode, detail: String },
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Multipart {
            status: err.status(),
            detail: err.body_text(),
        }
    }
}

impl ApiError {
    /// HTTP status and stable machine-readable code.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Service(e) => match e {
                DocFixError::UnsupportedFormat { .. } => {
                    (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_FORMAT")
                }
                DocFixError::EmptyDocument { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "EMPTY_DOCUMENT")
                }
                DocFixError::ExtractionFailed { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "EXTRACTION_FAILED")
                }
                DocFixError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                DocFixError::DuplicateJob { .. } => (StatusCode::CONFLICT, "DUPLICATE_JOB"),
                DocFixError::InvalidState { .. } => (StatusCode::CONFLICT, "INVALID_STATE"),
                DocFixError::NotReady { .. } => (StatusCode::CONFLICT, "NOT_READY"),
                DocFixError::ServiceFailure { .. } => {
                    (StatusCode::BAD_GATEWAY, "SERVICE_FAILURE")
                }
                DocFixError::AssemblyFailure { .. } => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "ASSEMBLY_FAILURE")
                }
                DocFixError::ProviderNotConfigured { .. } => {
                    (StatusCode::SERVICE_UNAVAILABLE, "PROVIDER_NOT_CONFIGURED")
                }
                DocFixError::InvalidConfig(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INVALID_CONFIG")
                }
                DocFixError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
            },
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Multipart { status, .. } => {
                if *status == StatusCode::PAYLOAD_TOO_LARGE {
                    (*status, "PAYLOAD_TOO_LARGE")
                } else {
                    (*status, "BAD_REQUEST")
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            ApiError::Service(DocFixError::Internal(detail)) => {
                tracing::error!(detail, "API internal error");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            success: false,
            error: message,
            code,
        };
        (status, Json(body)).into_response()
    }
}
