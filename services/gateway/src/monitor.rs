//! Response monitoring
//!
//! A middleware wraps the whole handler chain and emits one
//! `ResponseRecord` per response onto a small bounded channel; when the
//! monitor actor falls behind, producers wait rather than drop. The
//! actor accumulates per-minute statistics, emits one access-log line
//! per response under the `access` target, and serves the last fully
//! completed minute's summary to the operations endpoint.

use std::mem;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Capacity of the record channel; overflow blocks the handler chain.
pub const RECORD_QUEUE: usize = 32;

/// Accumulation window.
const WINDOW: Duration = Duration::from_secs(60);

/// Everything captured about one served response.
#[derive(Debug, Clone)]
pub struct ResponseRecord {
    pub uri: String,
    pub user_agent: String,
    pub status: u16,
    pub size: u64,
    pub start: SystemTime,
    pub end: SystemTime,
    pub method: String,
    pub host: String,
    pub protocol: String,
    pub remote_addr: String,
}

impl ResponseRecord {
    pub fn elapsed(&self) -> Duration {
        self.end.duration_since(self.start).unwrap_or_default()
    }
}

/// Aggregated statistics for one completed minute.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonitorSummary {
    /// Total handler time over the window, nanoseconds.
    pub response_time_sum: u64,
    pub response_count: u64,
    /// Responses with status < 400.
    pub response_code_ok_count: u64,
    /// Responses with status >= 400.
    pub response_code_ng_count: u64,
}

/// Cloneable client side of the monitor.
#[derive(Clone)]
pub struct MonitorHandle {
    records: mpsc::Sender<ResponseRecord>,
    queries: mpsc::Sender<oneshot::Sender<MonitorSummary>>,
}

impl MonitorHandle {
    /// Submit one record. Waits when the monitor is backlogged.
    pub async fn record(&self, record: ResponseRecord) {
        let _ = self.records.send(record).await;
    }

    /// Fetch the last completed minute. `None` when the monitor is gone.
    pub async fn summary(&self) -> Option<MonitorSummary> {
        let (reply, rx) = oneshot::channel();
        self.queries.send(reply).await.ok()?;
        rx.await.ok()
    }
}

/// Accumulator actor for response statistics.
pub struct Monitor {
    records: mpsc::Receiver<ResponseRecord>,
    queries: mpsc::Receiver<oneshot::Sender<MonitorSummary>>,
    current: MonitorSummary,
    published: MonitorSummary,
}

impl Monitor {
    pub fn new() -> (Self, MonitorHandle) {
        let (record_tx, records) = mpsc::channel(RECORD_QUEUE);
        let (query_tx, queries) = mpsc::channel(1);
        (
            Self {
                records,
                queries,
                current: MonitorSummary::default(),
                published: MonitorSummary::default(),
            },
            MonitorHandle {
                records: record_tx,
                queries: query_tx,
            },
        )
    }

    /// Run until shutdown.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut minute =
            tokio::time::interval_at(tokio::time::Instant::now() + WINDOW, WINDOW);
        let mut records_open = true;
        let mut queries_open = true;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("monitor stopped");
                    return;
                }

                maybe = self.records.recv(), if records_open => match maybe {
                    Some(record) => self.observe(&record),
                    None => records_open = false,
                },

                _ = minute.tick() => self.publish(),

                maybe = self.queries.recv(), if queries_open => match maybe {
                    Some(reply) => {
                        let _ = reply.send(self.published.clone());
                    }
                    None => queries_open = false,
                },
            }
        }
    }

    /// Fold one record into the running minute and log the access line.
    fn observe(&mut self, record: &ResponseRecord) {
        let elapsed = record.elapsed();
        self.current.response_count += 1;
        self.current.response_time_sum += elapsed.as_nanos() as u64;
        if record.status < 400 {
            self.current.response_code_ok_count += 1;
        } else {
            self.current.response_code_ng_count += 1;
        }

        info!(
            target: "access",
            addr = %record.remote_addr,
            host = %record.host,
            method = %record.method,
            uri = %record.uri,
            protocol = %record.protocol,
            status = record.status,
            size = record.size,
            ua = %record.user_agent,
            elapsed_us = elapsed.as_micros() as u64,
            "-"
        );
    }

    /// Close the window: expose the finished minute, start a new one.
    fn publish(&mut self) {
        self.published = mem::take(&mut self.current);
    }
}

/// Middleware capturing one `ResponseRecord` per response.
pub async fn track_responses(
    State(monitor): State<MonitorHandle>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let start = SystemTime::now();
    let uri = request.uri().to_string();
    let method = request.method().to_string();
    let protocol = format!("{:?}", request.version());
    let host = header_str(&request, header::HOST);
    let user_agent = header_str(&request, header::USER_AGENT);

    let response = next.run(request).await;

    let size = http_body::Body::size_hint(response.body())
        .exact()
        .unwrap_or(0);
    let record = ResponseRecord {
        uri,
        user_agent,
        status: response.status().as_u16(),
        size,
        start,
        end: SystemTime::now(),
        method,
        host,
        protocol,
        remote_addr: addr.to_string(),
    };
    monitor.record(record).await;

    response
}

fn header_str(request: &Request, name: header::HeaderName) -> String {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
