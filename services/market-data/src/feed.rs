//! Upstream WebSocket feed loop
//!
//! Maintains an endless connection to one pair's stream URL. Every
//! decoded message is pushed onto the bounded actor channel, so a slow
//! consumer backpressures the socket read instead of dropping data.
//! Dial failures, read failures, and undecodable messages all tear the
//! connection down and retry with capped, jittered exponential
//! backoff; only shutdown ends the loop.

use std::time::Duration;

use futures_util::StreamExt;
use rand::Rng;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use types::{CurrencyPair, Stream};

/// Upper bound on the reconnect delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(180);
/// Deadline for establishing one connection.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(7);

/// Uniform random delay in `[0, 5s)`.
fn jitter() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(0..5000))
}

/// Next reconnect delay: doubled, jittered, capped.
pub fn next_backoff(wait: Duration, jitter: Duration) -> Duration {
    MAX_BACKOFF.min(wait * 2 + jitter)
}

/// Endless reader for one pair's upstream stream.
pub struct StreamReader {
    url: String,
    pair: CurrencyPair,
    initial_delay: Duration,
}

impl StreamReader {
    /// Create a reader for `url`. The first dial is delayed by a
    /// random 0–5 s so a fleet of pairs does not reconnect in step.
    pub fn new(url: impl Into<String>, pair: CurrencyPair) -> Self {
        Self {
            url: url.into(),
            pair,
            initial_delay: jitter(),
        }
    }

    /// Override the initial delay (tests).
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Run until shutdown. Decoded messages are sent to `out`; if the
    /// receiver goes away the loop ends as on shutdown.
    pub async fn run(self, out: mpsc::Sender<Stream>, shutdown: CancellationToken) {
        let mut wait = self.initial_delay;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!(pair = %self.pair, "stream reader stopped");
                    return;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            info!(pair = %self.pair, url = %self.url, "connecting to upstream stream");
            match tokio::time::timeout(DIAL_TIMEOUT, connect_async(self.url.as_str())).await {
                Err(_) => {
                    warn!(pair = %self.pair, url = %self.url, "dial timed out");
                }
                Ok(Err(e)) => {
                    warn!(pair = %self.pair, url = %self.url, error = %e, "dial failed");
                }
                Ok(Ok((ws, _response))) => {
                    if self.read_until_error(ws, &out, &shutdown).await {
                        info!(pair = %self.pair, "stream reader stopped");
                        return;
                    }
                }
            }

            wait = next_backoff(wait, jitter());
        }
    }

    /// Pump messages until the connection fails or shutdown fires.
    /// Returns true when the loop should terminate for good.
    async fn read_until_error(
        &self,
        ws: tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
        out: &mpsc::Sender<Stream>,
        shutdown: &CancellationToken,
    ) -> bool {
        let (_write, mut read) = ws.split();
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return true,
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<Stream>(&text) {
                            Ok(s) => {
                                // Backpressure: a full channel suspends
                                // the socket read here.
                                if out.send(s).await.is_err() {
                                    return true;
                                }
                            }
                            Err(e) => {
                                warn!(
                                    pair = %self.pair,
                                    error = %e,
                                    "undecodable stream message, reconnecting"
                                );
                                return false;
                            }
                        }
                    }
                    // Pings are answered by the protocol layer; other
                    // non-text frames carry nothing for us.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(pair = %self.pair, error = %e, "stream read failed");
                        return false;
                    }
                    None => {
                        warn!(pair = %self.pair, "upstream closed the connection");
                        return false;
                    }
                }
            }
        }
    }
}
