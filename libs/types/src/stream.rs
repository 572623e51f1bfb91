//! Upstream WebSocket message types
//!
//! One `Stream` is one full message from the exchange's per-pair feed.
//! Timestamps arrive as local Asia/Tokyo wall-clock strings with
//! microsecond precision and are parsed into timezone-aware values so
//! that day-boundary decisions downstream use the exchange's calendar.

use chrono::{DateTime, NaiveDateTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// One order-book level: `[price, amount]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel(pub f64, pub f64);

impl PriceLevel {
    pub fn price(&self) -> f64 {
        self.0
    }

    pub fn amount(&self) -> f64 {
        self.1
    }
}

/// A single executed trade as reported by the upstream feed.
///
/// The `currenty_pair` key is misspelled by the exchange; the rename
/// preserves the wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    #[serde(rename = "currenty_pair")]
    pub currency_pair: String,
    /// "ask" or "bid".
    pub trade_type: String,
    pub price: f64,
    pub tid: u64,
    pub amount: f64,
    /// Unix seconds.
    pub date: u64,
}

/// The most recent execution, embedded in every stream message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LastPrice {
    /// "ask" or "bid".
    pub action: String,
    pub price: f64,
}

/// One full upstream message for a pair.
#[derive(Debug, Clone, Deserialize)]
pub struct Stream {
    pub asks: Vec<PriceLevel>,
    pub bids: Vec<PriceLevel>,
    pub trades: Vec<Trade>,
    #[serde(with = "tokyo_timestamp")]
    pub timestamp: DateTime<Tz>,
    pub last_price: LastPrice,
    pub currency_pair: String,
}

/// Serde adapter for the upstream `"YYYY-MM-DD HH:MM:SS.ffffff"`
/// timestamp format, interpreted in Asia/Tokyo.
pub mod tokyo_timestamp {
    use super::*;
    use chrono::TimeZone;
    use serde::Deserializer;

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

    pub fn parse(s: &str) -> Option<DateTime<Tz>> {
        let naive = NaiveDateTime::parse_from_str(s, FORMAT).ok()?;
        chrono_tz::Asia::Tokyo.from_local_datetime(&naive).single()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Tz>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {s}")))
    }
}
