//! Per-pair state actor
//!
//! Sole owner of the delta ring and the last seen stream message.
//! Everything else talks to it through channels: the feed pushes
//! decoded messages in, the writer receives records on a bounded
//! persist channel (non-blocking send; on overflow the record is
//! dropped and the ring stays authoritative), and HTTP handlers
//! sample state with oneshot-reply
//! queries. The actor keeps a scratch copy of the ring pre-built so a
//! ring query is answered by handing the copy over and rebuilding it
//! afterwards, off the requester's path.
//!
//! On startup the ring is seeded from the restart buffer if one is
//! present and intact; on shutdown the buffer is rewritten best-effort.

use std::io;
use std::mem;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use types::{CurrencyPair, LastPrice, Stream, StoreData};

use crate::buffer::{self, BufferError};
use crate::delta::diff_stream;
use crate::ring::Ring;

/// Capacity of the feed → actor channel.
pub const STREAM_QUEUE: usize = 8;
/// Capacity of the actor → writer channel.
pub const PERSIST_QUEUE: usize = 256;

/// A sampling request answered by the actor.
pub enum StateQuery {
    /// Reply with an independent copy of the ring.
    Ring(oneshot::Sender<Ring>),
    /// Reply with the most recent last-price.
    LastPrice(oneshot::Sender<LastPrice>),
}

/// Cloneable client side of a state actor.
#[derive(Clone)]
pub struct StateHandle {
    tx: mpsc::Sender<StateQuery>,
}

impl StateHandle {
    /// Sample the ring. `None` when the actor is gone.
    pub async fn ring(&self) -> Option<Ring> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(StateQuery::Ring(reply)).await.ok()?;
        rx.await.ok()
    }

    /// Sample the last price. `None` when the actor is gone.
    pub async fn last_price(&self) -> Option<LastPrice> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(StateQuery::LastPrice(reply)).await.ok()?;
        rx.await.ok()
    }
}

/// Single-writer owner of one pair's ring.
pub struct StateActor {
    pair: CurrencyPair,
    live: Ring,
    scratch: Ring,
    prev: Option<Stream>,
    buffer_file: PathBuf,
    queries: mpsc::Receiver<StateQuery>,
}

impl StateActor {
    /// Create an actor, seeding the ring from the restart buffer when
    /// one exists. Returns the actor and the handle used to query it.
    pub fn new(
        data_root: &Path,
        pair: CurrencyPair,
        capacity: usize,
    ) -> (Self, StateHandle) {
        let buffer_file = buffer::buffer_path(data_root, &pair);
        let live = match buffer::read_buffer(&buffer_file, capacity) {
            Ok(ring) => {
                info!(pair = %pair, records = ring.len(), "restored ring from restart buffer");
                ring
            }
            Err(BufferError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                Ring::with_capacity(capacity)
            }
            Err(e) => {
                warn!(pair = %pair, error = %e, "restart buffer unusable, starting empty");
                Ring::with_capacity(capacity)
            }
        };

        let (tx, queries) = mpsc::channel(1);
        let scratch = live.clone();
        (
            Self {
                pair,
                live,
                scratch,
                prev: None,
                buffer_file,
                queries,
            },
            StateHandle { tx },
        )
    }

    /// Run until shutdown, consuming stream messages and answering
    /// queries. Emitted records go to `persist` with a non-blocking
    /// send; when the writer lags the record is dropped and the ring
    /// remains the recovery source.
    pub async fn run(
        mut self,
        mut streams: mpsc::Receiver<Stream>,
        persist: mpsc::Sender<StoreData>,
        shutdown: CancellationToken,
    ) {
        let mut queries_open = true;
        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    self.persist_buffer();
                    info!(pair = %self.pair, "state actor stopped");
                    return;
                }

                maybe = streams.recv() => match maybe {
                    Some(s) => self.ingest(s, &persist),
                    None => {
                        // Feed gone for good; keep the ring durable.
                        self.persist_buffer();
                        info!(pair = %self.pair, "stream channel closed, state actor stopped");
                        return;
                    }
                },

                maybe = self.queries.recv(), if queries_open => match maybe {
                    Some(StateQuery::Ring(reply)) => {
                        // Hand over the pre-built copy, then refresh it
                        // from the live ring for the next requester.
                        let snapshot = mem::replace(&mut self.scratch, self.live.clone());
                        let _ = reply.send(snapshot);
                    }
                    Some(StateQuery::LastPrice(reply)) => {
                        let lp = self
                            .prev
                            .as_ref()
                            .map(|s| s.last_price.clone())
                            .unwrap_or_default();
                        let _ = reply.send(lp);
                    }
                    None => queries_open = false,
                },
            }
        }
    }

    fn ingest(&mut self, s: Stream, persist: &mpsc::Sender<StoreData>) {
        if let Some(sd) = diff_stream(&s, self.prev.as_ref()) {
            self.live.push(sd.clone());
            self.scratch.push(sd.clone());
            match persist.try_send(sd) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    debug!(pair = %self.pair, "persist queue full, dropping record");
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }
        self.prev = Some(s);
    }

    fn persist_buffer(&self) {
        if let Err(e) = buffer::write_buffer(&self.buffer_file, &self.live) {
            warn!(pair = %self.pair, error = %e, "failed to write restart buffer");
        }
    }
}
