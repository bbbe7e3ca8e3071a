//! Error responses.
//!
//! `BreakerError::InvalidArgument` is the caller's fault (400). A store
//! failure means nothing was committed and the caller may retry (503).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::breaker::BreakerError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError(pub BreakerError);

impl From<BreakerError> for ApiError {
    fn from(err: BreakerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self.0 {
            BreakerError::InvalidArgument(msg) => (StatusCode::BAD_REQUEST, msg),
            BreakerError::Store(e) => {
                tracing::error!(error = %e, "Request failed on state store");
                (StatusCode::SERVICE_UNAVAILABLE, "State store unavailable".to_string())
            }
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}
