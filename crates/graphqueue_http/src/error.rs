//! `ApiError`: the one error type every handler returns, mapped to an HTTP
//! status + JSON body by `IntoResponse`. `From` impls translate each core
//! error kind into a default status; callers can still build an `ApiError`
//! directly when a route needs a specific status (e.g. 404 for an unknown
//! job id).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use graphqueue_store::StoreError;
use graphqueue_workflows::{MaterializeError, StageError, ValidationError};

#[derive(Debug, thiserror::Error, Serialize)]
#[error("{message}")]
pub struct ApiError {
    #[serde(skip)]
    pub status: u16,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<MaterializeError> for ApiError {
    fn from(err: MaterializeError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<StageError> for ApiError {
    fn from(err: StageError) -> Self {
        tracing::error!(error = %err, "input staging failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::JobNotFound(id) => Self::not_found(format!("job {id} not found")),
            StoreError::PromptNotFound(id) => Self::not_found(format!("prompt {id} not found")),
            other => {
                tracing::error!(error = %other, "store error");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        }
    }
}
