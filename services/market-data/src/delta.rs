//! Change detection between consecutive stream messages
//!
//! Reduces a full upstream `Stream` to a `StoreData` carrying only the
//! fields that differ from the previous message: best ask, best bid,
//! and first trade. Floats are compared bit-exact, never by tolerance,
//! to match the upstream's own equality semantics; the trade's `tid`
//! disambiguates equal-priced repeats.

use types::{PriceLevel, Stream, StoreData, Trade};

/// Compare a new message against the previous one and produce the
/// delta record, or `None` when nothing observed changed.
///
/// With no previous message, all present fields are emitted (the first
/// record seeds downstream consumers). An empty asks/bids/trades list
/// simply contributes no delta for that field.
pub fn diff_stream(cur: &Stream, prev: Option<&Stream>) -> Option<StoreData> {
    let mut sd = StoreData {
        timestamp: cur.timestamp.timestamp(),
        ..StoreData::default()
    };

    // A previous message with no asks carries nothing to diff against;
    // it counts as unseeded and the current message seeds everything.
    match prev.filter(|p| !p.asks.is_empty()) {
        None => {
            sd.ask = cur.asks.first().copied();
            sd.bid = cur.bids.first().copied();
            sd.trade = cur.trades.first().cloned();
        }
        Some(prev) => {
            if changed_level(cur.asks.first(), prev.asks.first()) {
                sd.ask = cur.asks.first().copied();
            }
            if changed_level(cur.bids.first(), prev.bids.first()) {
                sd.bid = cur.bids.first().copied();
            }
            if changed_trade(cur.trades.first(), prev.trades.first()) {
                sd.trade = cur.trades.first().cloned();
            }
        }
    }

    if sd.is_empty() {
        None
    } else {
        Some(sd)
    }
}

fn changed_level(cur: Option<&PriceLevel>, prev: Option<&PriceLevel>) -> bool {
    match (cur, prev) {
        (Some(c), Some(p)) => c.0 != p.0 || c.1 != p.1,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

fn changed_trade(cur: Option<&Trade>, prev: Option<&Trade>) -> bool {
    match (cur, prev) {
        (Some(c), Some(p)) => {
            c.trade_type != p.trade_type
                || c.price != p.price
                || c.tid != p.tid
                || c.amount != p.amount
        }
        (Some(_), None) => true,
        (None, _) => false,
    }
}
