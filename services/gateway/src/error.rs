//! Central error type for the gateway's HTTP surface

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("unknown currency pair: {0}")]
    UnknownPair(String),

    /// The ring could not be sampled in time; this endpoint contracts
    /// to 404 rather than 500.
    #[error("ring snapshot unavailable")]
    RingUnavailable,

    #[error("data unavailable")]
    Unavailable,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::UnknownPair(_) => (StatusCode::NOT_FOUND, "UNKNOWN_PAIR"),
            AppError::RingUnavailable => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Unavailable => (StatusCode::INTERNAL_SERVER_ERROR, "UNAVAILABLE"),
        };

        let body = Json(json!({
            "error": code,
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}
