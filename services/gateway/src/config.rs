//! Gateway configuration
//!
//! The defaults are the production values; there is no config file.
//! Tests and deployments override individual fields.

use std::net::SocketAddr;
use std::path::PathBuf;

use market_data::STORE_MAX;
use types::CurrencyPair;

#[derive(Debug, Clone)]
pub struct Config {
    /// Pairs to collect; each gets an independent pipeline.
    pub pairs: Vec<CurrencyPair>,
    /// HTTP listen address.
    pub listen_addr: SocketAddr,
    /// WebSocket stream URL prefix; the pair name is appended.
    pub stream_url_base: String,
    /// Depth endpoint URL prefix; the pair name is appended.
    pub depth_url_base: String,
    /// Ticker endpoint URL prefix; the pair name is appended.
    pub ticker_url_base: String,
    /// Root of the persisted data tree.
    pub data_root: PathBuf,
    /// Root of the static files served at `/`.
    pub static_root: PathBuf,
    /// Ring capacity per pair.
    pub ring_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pairs: CurrencyPair::defaults(),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            stream_url_base: "wss://ws.zaif.jp/stream?currency_pair=".to_string(),
            depth_url_base: "https://api.zaif.jp/api/1/depth/".to_string(),
            ticker_url_base: "https://api.zaif.jp/api/1/ticker/".to_string(),
            data_root: PathBuf::from("data"),
            static_root: PathBuf::from("public_html"),
            ring_capacity: STORE_MAX,
        }
    }
}

impl Config {
    pub fn stream_url(&self, pair: &CurrencyPair) -> String {
        format!("{}{}", self.stream_url_base, pair)
    }

    pub fn depth_url(&self, pair: &CurrencyPair) -> String {
        format!("{}{}", self.depth_url_base, pair)
    }

    pub fn ticker_url(&self, pair: &CurrencyPair) -> String {
        format!("{}{}", self.ticker_url_base, pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.pairs.len(), 5);
        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.ring_capacity, STORE_MAX);
    }

    #[test]
    fn test_url_construction() {
        let config = Config::default();
        let pair = CurrencyPair::new("btc_jpy");
        assert_eq!(
            config.stream_url(&pair),
            "wss://ws.zaif.jp/stream?currency_pair=btc_jpy"
        );
        assert_eq!(config.depth_url(&pair), "https://api.zaif.jp/api/1/depth/btc_jpy");
        assert_eq!(
            config.ticker_url(&pair),
            "https://api.zaif.jp/api/1/ticker/btc_jpy"
        );
    }
}
