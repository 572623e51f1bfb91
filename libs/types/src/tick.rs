//! Daily ticker types
//!
//! `TickerQuote` is the upstream 24-hour ticker payload, fetched once
//! per day and archived verbatim. `DailyTick` is the derived OHLC-style
//! row served to clients; its open price comes from the previous day's
//! close, so a day's row can only be built in sequence.

use serde::{Deserialize, Serialize};

/// The upstream 24-hour ticker for a pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickerQuote {
    /// Last traded price.
    pub last: f64,
    /// 24h high.
    pub high: f64,
    /// 24h low.
    pub low: f64,
    /// 24h volume-weighted average price.
    pub vwap: f64,
    /// 24h traded volume.
    pub volume: f64,
    /// Best bid.
    pub bid: f64,
    /// Best ask.
    pub ask: f64,
}

/// One per-day row of the served history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTick {
    /// Day stamp, `YYYYMMDD`.
    pub date: String,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub vwap: f64,
    pub volume: f64,
}

impl DailyTick {
    /// Build a day row from the quote fetched at that day's close.
    /// `open` is the previous day's close; a caller with no history
    /// passes the quote's own last price.
    pub fn from_quote(date: impl Into<String>, open: f64, quote: &TickerQuote) -> Self {
        Self {
            date: date.into(),
            open,
            close: quote.last,
            high: quote.high,
            low: quote.low,
            vwap: quote.vwap,
            volume: quote.volume,
        }
    }
}
