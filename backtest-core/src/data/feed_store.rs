//! Per-TF dense OHLCV + indicator-output arrays. Append-only during prep;
//! read-only once handed to the engine.

use crate::domain::{Bar, TfRole};
use std::collections::HashMap;

/// One timeframe's worth of bars and precomputed indicator outputs.
#[derive(Debug, Clone)]
pub struct FeedStore {
    pub role: TfRole,
    pub bars: Vec<Bar>,
    /// Multi-output indicators expand to one array per sub-output, e.g.
    /// `macd.macd`, `macd.signal`, `macd.histogram`.
    pub indicator_outputs: HashMap<String, Vec<f64>>,
    close_ts_index: HashMap<i64, usize>,
    pub warmup_bars: usize,
}

impl FeedStore {
    pub fn new(role: TfRole, bars: Vec<Bar>, warmup_bars: usize) -> Self {
        let close_ts_index = bars.iter().enumerate().map(|(i, b)| (b.ts_close, i)).collect();
        Self { role, bars, indicator_outputs: HashMap::new(), close_ts_index, warmup_bars }
    }

    pub fn index_for_close_ts(&self, ts_close: i64) -> Option<usize> {
        self.close_ts_index.get(&ts_close).copied()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn indicator_value(&self, key: &str, idx: usize) -> Option<f64> {
        self.indicator_outputs.get(key).and_then(|arr| arr.get(idx)).copied()
    }

    pub fn set_indicator_output(&mut self, key: impl Into<String>, values: Vec<f64>) {
        self.indicator_outputs.insert(key.into(), values);
    }
}

/// Maps TF role to Feed Store. The exec role's `sim_start_idx` is the first
/// index past warmup at which the engine may evaluate rules.
#[derive(Debug)]
pub struct MultiTfFeedStore {
    pub stores: HashMap<TfRole, FeedStore>,
    pub exec_role: TfRole,
    pub sim_start_idx: usize,
}

impl MultiTfFeedStore {
    pub fn new(stores: HashMap<TfRole, FeedStore>, exec_role: TfRole, sim_start_idx: usize) -> Self {
        Self { stores, exec_role, sim_start_idx }
    }

    pub fn exec(&self) -> &FeedStore {
        &self.stores[&self.exec_role]
    }

    pub fn get(&self, role: TfRole) -> Option<&FeedStore> {
        self.stores.get(&role)
    }
}
