//! Error responses.
//!
//! # Design Decisions
//! - Handler failures stay local to one request and become a JSON body
//! - Store errors map to 500, a draining runtime to 503

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

/// Failure of a single request.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to create record: {0}")]
    CreateRecord(#[source] StoreError),

    #[error("service is shutting down")]
    Draining,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::CreateRecord(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Draining => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
