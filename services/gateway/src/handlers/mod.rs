//! HTTP request handlers
//!
//! Every data handler follows the same shape: resolve the pair, race
//! the component query against a 3-second deadline, and encode the
//! result with the exact content type the original consumers expect.
//! A timeout maps to 404 for the ring endpoint and 500 everywhere
//! else.

pub mod market;
pub mod monitor;
pub mod stream;

use std::time::Duration;

use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::AppError;

/// Per-request sampling deadline.
pub const DEADLINE: Duration = Duration::from_secs(3);

/// The content type served by every data endpoint.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Encode a value as a JSON response with the fixed content type.
pub(crate) fn json_response<T: Serialize>(value: &T) -> Result<Response, AppError> {
    let body = serde_json::to_vec(value).map_err(|_| AppError::Unavailable)?;
    Ok(([(header::CONTENT_TYPE, JSON_CONTENT_TYPE)], body).into_response())
}
