//! HTTP error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ixen_core::IxenError;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    /// An upstream service (the classifier) failed
    #[error("{0}")]
    BadGateway(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<IxenError> for ApiError {
    fn from(err: IxenError) -> Self {
        match err {
            IxenError::Validation(msg) => ApiError::BadRequest(msg),
            other => ApiError::BadGateway(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        match &self {
            ApiError::BadGateway(msg) => warn!(status = %status, message = %msg, "Upstream error"),
            _ => debug!(status = %status, message = %message, "Client error"),
        }

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
