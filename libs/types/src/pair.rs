//! Currency pair identifiers
//!
//! A pair names one upstream market (e.g. "btc_jpy") and is the unit of
//! independence in the collector: every pipeline, file tree, and route
//! is keyed by one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The production set of collected pairs.
pub const DEFAULT_PAIRS: [&str; 5] = ["btc_jpy", "xem_jpy", "mona_jpy", "bch_jpy", "eth_jpy"];

/// A validated currency-pair name in `base_quote` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyPair(String);

impl CurrencyPair {
    /// Create a new pair name.
    ///
    /// # Panics
    /// Panics if the format is invalid (must be `base_quote`, lowercase).
    pub fn new(name: impl Into<String>) -> Self {
        let s = name.into();
        assert!(is_valid(&s), "currency pair must be in base_quote form");
        Self(s)
    }

    /// Try to create a pair name, returning None if invalid.
    pub fn try_new(name: impl Into<String>) -> Option<Self> {
        let s = name.into();
        if is_valid(&s) {
            Some(Self(s))
        } else {
            None
        }
    }

    /// The production pair set.
    pub fn defaults() -> Vec<CurrencyPair> {
        DEFAULT_PAIRS.iter().map(|p| CurrencyPair::new(*p)).collect()
    }

    /// Get the pair name string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into base and quote assets.
    pub fn split(&self) -> (&str, &str) {
        let mut parts = self.0.splitn(2, '_');
        (parts.next().unwrap_or(""), parts.next().unwrap_or(""))
    }
}

fn is_valid(s: &str) -> bool {
    let mut parts = s.split('_');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(base), Some(quote), None) => {
            !base.is_empty()
                && !quote.is_empty()
                && s.chars().all(|c| c.is_ascii_lowercase() || c == '_')
        }
        _ => false,
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
