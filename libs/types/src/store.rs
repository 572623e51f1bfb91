//! The reduced delta record
//!
//! A `StoreData` carries only the fields of an upstream message that
//! changed since the previous one, plus the message timestamp as unix
//! seconds. The JSON layout is fixed: keys in the order ask, bid,
//! trade, ts; absent options omitted entirely. serde_json renders the
//! floats in shortest round-trip decimal form.

use chrono::NaiveDate;
use chrono::TimeZone;
use serde::{Deserialize, Serialize};

use crate::stream::{PriceLevel, Trade};

/// One change-detected record: at least one of `ask`, `bid`, `trade`
/// is populated when the record is emitted by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ask: Option<PriceLevel>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bid: Option<PriceLevel>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub trade: Option<Trade>,
    /// Unix seconds of the originating stream message.
    #[serde(rename = "ts")]
    pub timestamp: i64,
}

impl StoreData {
    /// Whether no delta field is populated. Such a record must not be
    /// emitted by change detection.
    pub fn is_empty(&self) -> bool {
        self.ask.is_none() && self.bid.is_none() && self.trade.is_none()
    }

    /// The Asia/Tokyo calendar day of this record, used for daily file
    /// rotation.
    pub fn tokyo_day(&self) -> NaiveDate {
        chrono_tz::Asia::Tokyo
            .timestamp_opt(self.timestamp, 0)
            .single()
            .map(|dt| dt.date_naive())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trade() -> Trade {
        Trade {
            currency_pair: "btc_jpy".to_string(),
            trade_type: "bid".to_string(),
            price: 99.5,
            tid: 7,
            amount: 0.5,
            date: 1000,
        }
    }

    #[test]
    fn test_full_record_key_order() {
        let sd = StoreData {
            ask: Some(PriceLevel(100.0, 1.0)),
            bid: Some(PriceLevel(99.0, 2.0)),
            trade: Some(sample_trade()),
            timestamp: 1577804400,
        };
        let json = serde_json::to_string(&sd).unwrap();
        assert_eq!(
            json,
            r#"{"ask":[100.0,1.0],"bid":[99.0,2.0],"trade":{"currenty_pair":"btc_jpy","trade_type":"bid","price":99.5,"tid":7,"amount":0.5,"date":1000},"ts":1577804400}"#
        );
    }

    #[test]
    fn test_absent_options_omitted() {
        let sd = StoreData {
            bid: Some(PriceLevel(99.0, 3.0)),
            timestamp: 1577804401,
            ..StoreData::default()
        };
        let json = serde_json::to_string(&sd).unwrap();
        assert_eq!(json, r#"{"bid":[99.0,3.0],"ts":1577804401}"#);
    }

    #[test]
    fn test_json_roundtrip() {
        let sd = StoreData {
            ask: Some(PriceLevel(536260.0, 0.0255)),
            timestamp: 1562579976,
            ..StoreData::default()
        };
        let json = serde_json::to_string(&sd).unwrap();
        let back: StoreData = serde_json::from_str(&json).unwrap();
        assert_eq!(sd, back);
    }

    #[test]
    fn test_is_empty() {
        let mut sd = StoreData {
            timestamp: 1,
            ..StoreData::default()
        };
        assert!(sd.is_empty());
        sd.ask = Some(PriceLevel(1.0, 1.0));
        assert!(!sd.is_empty());
    }

    #[test]
    fn test_tokyo_day() {
        // 2020-01-01 00:00:00 JST == 2019-12-31 15:00:00 UTC
        let sd = StoreData {
            timestamp: 1577804400,
            ..StoreData::default()
        };
        assert_eq!(sd.tokyo_day(), NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());

        // One second before Tokyo midnight is still the previous day.
        let sd = StoreData {
            timestamp: 1577804399,
            ..StoreData::default()
        };
        assert_eq!(sd.tokyo_day(), NaiveDate::from_ymd_opt(2019, 12, 31).unwrap());
    }
}
