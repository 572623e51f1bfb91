//! Types library for the market-data collector
//!
//! Core wire and storage types shared by the per-pair pipeline and the
//! HTTP gateway. Field names follow the upstream exchange JSON exactly,
//! including its quirks, so recorded data stays byte-compatible with
//! what the exchange emits.
//!
//! # Modules
//! - `pair`: validated currency-pair names
//! - `stream`: upstream WebSocket message types and Tokyo timestamps
//! - `store`: the reduced delta record (`StoreData`) and its wire JSON
//! - `tick`: upstream 24h ticker and derived daily OHLC rows

pub mod pair;
pub mod store;
pub mod stream;
pub mod tick;

pub use pair::CurrencyPair;
pub use store::StoreData;
pub use stream::{LastPrice, PriceLevel, Stream, Trade};
pub use tick::{DailyTick, TickerQuote};
