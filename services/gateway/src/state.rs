//! Shared application state
//!
//! Holds the query handles into every per-pair pipeline plus the
//! monitor. Handles are cheap channel senders; cloning the state
//! clones no data.

use std::collections::HashMap;
use std::sync::Arc;

use market_data::{DepthHandle, StateHandle, TicksHandle};
use types::CurrencyPair;

use crate::monitor::MonitorHandle;

/// Query handles for one pair's pipeline.
#[derive(Clone)]
pub struct PairHandles {
    pub state: StateHandle,
    pub depth: DepthHandle,
    pub ticks: TicksHandle,
}

#[derive(Clone)]
pub struct AppState {
    pairs: Arc<HashMap<String, PairHandles>>,
    pub monitor: MonitorHandle,
}

impl AppState {
    pub fn new(pairs: HashMap<CurrencyPair, PairHandles>, monitor: MonitorHandle) -> Self {
        Self {
            pairs: Arc::new(
                pairs
                    .into_iter()
                    .map(|(pair, handles)| (pair.as_str().to_string(), handles))
                    .collect(),
            ),
            monitor,
        }
    }

    /// Look up the handles for a pair by its path segment.
    pub fn pair(&self, name: &str) -> Option<&PairHandles> {
        self.pairs.get(name)
    }
}
