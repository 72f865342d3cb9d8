//! HTTP-facing error mapping: wraps [`feature_core::Error`] so
//! handlers can return it directly and get the right status code.
//!
//! Validation failures use a literal `{"detail": <message>}` object
//! (not the `code`/`message` envelope the rest of this workspace's
//! APIs use) — `ErrorResponse` matches that contract exactly.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use feature_core::Error as CoreError;
use serde::Serialize;
use utoipa::ToSchema;

/// Body shape for every non-2xx response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub detail: String,
}

impl ErrorResponse {
    fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("invalid request body: {0}")]
    JsonRejection(String),

    #[error("invalid query parameters: {0}")]
    QueryRejection(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::JsonRejection(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::QueryRejection(rejection.body_text())
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Core(CoreError::BadEvent(_)) => StatusCode::BAD_REQUEST,
            ApiError::Core(CoreError::UserNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Core(CoreError::BackingStoreTransient(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::JsonRejection(_) | ApiError::QueryRejection(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "internal server error");
        }
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
