//! Depth and daily-tick endpoints

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use tokio::time::timeout;

use super::{json_response, DEADLINE, JSON_CONTENT_TYPE};
use crate::error::AppError;
use crate::state::AppState;

/// GET `/api/zaif/1/depth/:pair`: the cached upstream payload,
/// forwarded byte-for-byte.
pub async fn depth(
    State(state): State<AppState>,
    Path(pair): Path<String>,
) -> Result<Response, AppError> {
    let handles = state
        .pair(&pair)
        .ok_or_else(|| AppError::UnknownPair(pair.clone()))?;

    match timeout(DEADLINE, handles.depth.snapshot()).await {
        Ok(Some(data)) => {
            Ok(([(header::CONTENT_TYPE, JSON_CONTENT_TYPE)], data).into_response())
        }
        _ => Err(AppError::Unavailable),
    }
}

/// GET `/api/zaif/1/ticks/:pair`
pub async fn ticks(
    State(state): State<AppState>,
    Path(pair): Path<String>,
) -> Result<Response, AppError> {
    let handles = state
        .pair(&pair)
        .ok_or_else(|| AppError::UnknownPair(pair.clone()))?;

    match timeout(DEADLINE, handles.ticks.ticks()).await {
        Ok(Some(list)) => json_response(&list),
        _ => Err(AppError::Unavailable),
    }
}
