//! Ring and last-price endpoints

use std::convert::Infallible;
use std::mem;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use market_data::Ring;
use tokio::time::timeout;

use super::{json_response, DEADLINE, JSON_CONTENT_TYPE};
use crate::error::AppError;
use crate::state::AppState;

const BUF_CAPACITY: usize = 32 * 1024;
const FLUSH_THRESHOLD: usize = 16 * 1024;

/// GET `/api/zaif/1/oldstream/:pair`: the full ring as a JSON array,
/// streamed in buffer-sized chunks so a 16k-record ring never sits in
/// one contiguous allocation on the response path.
pub async fn oldstream(
    State(state): State<AppState>,
    Path(pair): Path<String>,
) -> Result<Response, AppError> {
    let handles = state
        .pair(&pair)
        .ok_or_else(|| AppError::UnknownPair(pair.clone()))?;

    let ring = match timeout(DEADLINE, handles.state.ring()).await {
        Ok(Some(ring)) => ring,
        // Timed out or the actor is gone; this endpoint 404s.
        _ => return Err(AppError::RingUnavailable),
    };

    let chunks = encode_ring(&ring).map_err(|_| AppError::Unavailable)?;
    let body = Body::from_stream(futures_util::stream::iter(
        chunks.into_iter().map(Ok::<Bytes, Infallible>),
    ));
    Ok(([(header::CONTENT_TYPE, JSON_CONTENT_TYPE)], body).into_response())
}

/// GET `/api/zaif/1/lastprice/:pair`
pub async fn lastprice(
    State(state): State<AppState>,
    Path(pair): Path<String>,
) -> Result<Response, AppError> {
    let handles = state
        .pair(&pair)
        .ok_or_else(|| AppError::UnknownPair(pair.clone()))?;

    match timeout(DEADLINE, handles.state.last_price()).await {
        Ok(Some(lp)) => json_response(&lp),
        _ => Err(AppError::Unavailable),
    }
}

/// Serialize the ring into `[`-wrapped, comma-separated chunks, cutting
/// a chunk whenever the buffer passes the flush threshold.
fn encode_ring(ring: &Ring) -> Result<Vec<Bytes>, serde_json::Error> {
    let mut chunks = Vec::new();
    let mut buf: Vec<u8> = Vec::with_capacity(BUF_CAPACITY);
    buf.push(b'[');
    for (i, sd) in ring.iter().enumerate() {
        if i > 0 {
            buf.push(b',');
        }
        serde_json::to_writer(&mut buf, sd)?;
        if buf.len() > FLUSH_THRESHOLD {
            chunks.push(Bytes::from(mem::replace(
                &mut buf,
                Vec::with_capacity(BUF_CAPACITY),
            )));
        }
    }
    buf.push(b']');
    chunks.push(Bytes::from(buf));
    Ok(chunks)
}
