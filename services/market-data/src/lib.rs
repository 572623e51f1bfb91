//! Per-pair market-data pipeline
//!
//! Everything between the upstream exchange and the HTTP handlers for
//! one currency pair:
//! - Resilient WebSocket feed with jittered exponential reconnect
//! - Change detection reducing full messages to field-level deltas
//! - A bounded ring of recent deltas, owned by a single state actor
//! - Daily rotated, gzip-compressed JSON archives of every delta
//! - A durable ring snapshot written at shutdown and reloaded at start
//! - Pollers for the depth snapshot and the daily ticker history
//!
//! # Architecture
//!
//! ```text
//! Upstream WS ──► StreamReader ──► StateActor ──► StoreWriter ──► daily .json.gz
//!                                  ▲   │   ▲
//!                       (ring copy)│   │   │(last price)
//!                                  │   ▼   │
//!                              HTTP handler queries
//!
//! DepthPoller  ──► cached depth bytes ──► handler queries
//! TickerPoller ──► daily tick list    ──► handler queries
//! ```
//!
//! Each pair runs its pipeline independently; a failing pair never
//! degrades another. The only cross-task communication is bounded
//! channels, so no state is ever shared by reference.

pub mod actor;
pub mod buffer;
pub mod delta;
pub mod depth;
pub mod feed;
pub mod ring;
pub mod ticks;
pub mod writer;

pub use actor::{StateActor, StateHandle, StateQuery, PERSIST_QUEUE, STREAM_QUEUE};
pub use depth::{DepthHandle, DepthPoller};
pub use feed::StreamReader;
pub use ring::{Ring, STORE_MAX};
pub use ticks::{TickerPoller, TicksHandle};
pub use writer::{run_store_writer, StoreWriter};
