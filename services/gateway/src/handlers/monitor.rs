//! Self-monitoring endpoint

use axum::extract::State;
use axum::response::Response;
use tokio::time::timeout;

use super::{json_response, DEADLINE};
use crate::error::AppError;
use crate::state::AppState;

/// GET `/api/unko.in/1/monitor`: statistics of the last completed
/// minute.
pub async fn summary(State(state): State<AppState>) -> Result<Response, AppError> {
    match timeout(DEADLINE, state.monitor.summary()).await {
        Ok(Some(summary)) => json_response(&summary),
        _ => Err(AppError::Unavailable),
    }
}
