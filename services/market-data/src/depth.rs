//! Depth snapshot poller
//!
//! Fetches the full order-book snapshot for one pair every 30 seconds
//! and holds the last successful payload as opaque bytes. Handlers
//! sample it through oneshot queries and always receive an independent
//! copy. Before the first successful fetch the cache holds `{}`.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use types::CurrencyPair;

/// Poll cadence.
pub const POLL_INTERVAL: Duration = Duration::from_secs(30);
/// Per-request deadline.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Cloneable client side of a depth poller.
#[derive(Clone)]
pub struct DepthHandle {
    tx: mpsc::Sender<oneshot::Sender<Vec<u8>>>,
}

impl DepthHandle {
    /// Sample the cached depth payload. `None` when the poller is gone.
    pub async fn snapshot(&self) -> Option<Vec<u8>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(reply).await.ok()?;
        rx.await.ok()
    }
}

/// Poller owning one pair's depth cache.
pub struct DepthPoller {
    pair: CurrencyPair,
    url: String,
    client: reqwest::Client,
    cache: Vec<u8>,
    queries: mpsc::Receiver<oneshot::Sender<Vec<u8>>>,
}

impl DepthPoller {
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        pair: CurrencyPair,
    ) -> (Self, DepthHandle) {
        let (tx, queries) = mpsc::channel(1);
        (
            Self {
                pair,
                url: url.into(),
                client,
                cache: Vec::new(),
                queries,
            },
            DepthHandle { tx },
        )
    }

    /// Run until shutdown.
    pub async fn run(mut self, shutdown: CancellationToken) {
        // Initial fill; an unreachable upstream leaves a valid empty
        // JSON object in the cache.
        self.cache = match self.fetch().await {
            Ok(data) => data,
            Err(e) => {
                warn!(pair = %self.pair, error = %e, "initial depth fetch failed");
                b"{}".to_vec()
            }
        };

        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + POLL_INTERVAL,
            POLL_INTERVAL,
        );
        let mut queries_open = true;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!(pair = %self.pair, "depth poller stopped");
                    return;
                }

                _ = ticker.tick() => {
                    match self.fetch().await {
                        Ok(data) => self.cache = data,
                        // Stale cache is better than no cache.
                        Err(e) => debug!(pair = %self.pair, error = %e, "depth fetch failed"),
                    }
                }

                maybe = self.queries.recv(), if queries_open => match maybe {
                    Some(reply) => {
                        let _ = reply.send(self.cache.clone());
                    }
                    None => queries_open = false,
                },
            }
        }
    }

    async fn fetch(&self) -> Result<Vec<u8>, reqwest::Error> {
        let resp = self
            .client
            .get(&self.url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        Ok(resp.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_poller() -> (DepthPoller, DepthHandle) {
        DepthPoller::new(
            reqwest::Client::new(),
            // Nothing listens on port 9; connection is refused fast.
            "http://127.0.0.1:9/api/1/depth/btc_jpy",
            CurrencyPair::new("btc_jpy"),
        )
    }

    #[tokio::test]
    async fn test_initial_failure_serves_empty_object() {
        let (poller, handle) = unreachable_poller();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(poller.run(shutdown.clone()));

        let data = handle.snapshot().await.unwrap();
        assert_eq!(data, b"{}");

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_snapshot_copies_are_independent() {
        let (poller, handle) = unreachable_poller();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(poller.run(shutdown.clone()));

        let mut first = handle.snapshot().await.unwrap();
        first.extend_from_slice(b"garbage");

        let second = handle.snapshot().await.unwrap();
        assert_eq!(second, b"{}");

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_handle_reports_dead_poller() {
        let (poller, handle) = unreachable_poller();
        drop(poller);
        assert!(handle.snapshot().await.is_none());
    }
}
