//! Snapshot View: a read-only, O(1)-construction window over the Feed Store
//! and Incremental State at a given exec-bar index, exposing namespaced
//! accessors (`price.*`, `indicator.*`, `structure.*`, `position.*`) to the
//! rule evaluator.
//!
//! Feature and structure ids are resolved once per bar against small
//! registries built at construction — not via string hashing inside the
//! evaluator's recursion, which only indexes into the already-resolved
//! per-bar history buffers.

use crate::data::MultiTfFeedStore;
use crate::detectors::TfIncrementalState;
use crate::domain::{Bar, Position, TfRole};
use crate::rules::{SnapshotSource, Value};
use std::collections::{HashMap, VecDeque};

/// Where a feature id resolves to: a batch-computed indicator array on some
/// TF's Feed Store, or a structure detector's field on some TF's Incremental
/// State.
#[derive(Debug, Clone)]
enum Resolution {
    Indicator { tf: TfRole, key: String },
    Structure { tf: TfRole, detector_key: String, field: String },
}

/// Registry built once from a Play's `feature_specs` and detector specs,
/// mapping declared ids to their resolution. Shared across all bars of a
/// run.
#[derive(Debug, Default)]
pub struct FeatureRegistry {
    resolutions: HashMap<String, Resolution>,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_indicator(&mut self, id: impl Into<String>, tf: TfRole, key: impl Into<String>) {
        self.resolutions.insert(id.into(), Resolution::Indicator { tf, key: key.into() });
    }

    pub fn register_structure(
        &mut self,
        id: impl Into<String>,
        tf: TfRole,
        detector_key: impl Into<String>,
        field: impl Into<String>,
    ) {
        self.resolutions
            .insert(id.into(), Resolution::Structure { tf, detector_key: detector_key.into(), field: field.into() });
    }

    /// Resolves a declared feature id to its current batch-indicator value,
    /// if it names an `Indicator` resolution. Used outside the Snapshot View
    /// by the risk policy (e.g. an ATR-multiple stop referencing a feature
    /// id directly rather than a rule condition).
    pub fn indicator_value(&self, feed: &MultiTfFeedStore, id: &str, idx: usize) -> Option<f64> {
        match self.resolutions.get(id)? {
            Resolution::Indicator { tf, key } => feed.get(*tf)?.indicator_value(key, idx),
            Resolution::Structure { .. } => None,
        }
    }
}

/// Bounded per-bar history of structure-detector scalar values, since
/// `TfIncrementalState` only exposes the latest value. Capped at
/// `max_lookback` bars; older entries are dropped.
#[derive(Debug, Default)]
pub struct StructureHistory {
    max_lookback: usize,
    series: HashMap<String, VecDeque<Option<f64>>>,
}

impl StructureHistory {
    pub fn new(max_lookback: usize) -> Self {
        Self { max_lookback, series: HashMap::new() }
    }

    pub fn record(&mut self, key: &str, value: Option<f64>) {
        let buf = self.series.entry(key.to_string()).or_default();
        buf.push_back(value);
        if buf.len() > self.max_lookback {
            buf.pop_front();
        }
    }

    fn at_offset(&self, key: &str, offset: usize) -> Option<f64> {
        let buf = self.series.get(key)?;
        if offset >= buf.len() {
            return None;
        }
        buf[buf.len() - 1 - offset]
    }

    fn len(&self, key: &str) -> usize {
        self.series.get(key).map(|b| b.len()).unwrap_or(0)
    }
}

pub struct Snapshot<'a> {
    registry: &'a FeatureRegistry,
    feed: &'a MultiTfFeedStore,
    exec_index: usize,
    incremental: &'a HashMap<TfRole, TfIncrementalState>,
    structure_history: &'a StructureHistory,
    position: Option<&'a Position>,
    exec_tf_duration_ms: i64,
    forward_fill: &'a HashMap<TfRole, Vec<Option<usize>>>,
}

impl<'a> Snapshot<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: &'a FeatureRegistry,
        feed: &'a MultiTfFeedStore,
        exec_index: usize,
        incremental: &'a HashMap<TfRole, TfIncrementalState>,
        structure_history: &'a StructureHistory,
        position: Option<&'a Position>,
        exec_tf_duration_ms: i64,
        forward_fill: &'a HashMap<TfRole, Vec<Option<usize>>>,
    ) -> Self {
        Self { registry, feed, exec_index, incremental, structure_history, position, exec_tf_duration_ms, forward_fill }
    }

    /// Maps an exec-bar index (after offset) to the index into `tf`'s own
    /// Feed Store array: the exec TF indexes directly, any higher TF goes
    /// through the last-closed-bar forward-fill table so a batch indicator
    /// read stays pinned to the same higher-TF bar across all exec bars
    /// between that TF's closes.
    fn store_index(&self, tf: TfRole, target_exec_idx: usize) -> Option<usize> {
        if tf == self.feed.exec_role {
            return Some(target_exec_idx);
        }
        self.forward_fill.get(&tf)?.get(target_exec_idx).copied().flatten()
    }

    fn exec_bar_at(&self, offset: usize) -> Option<&Bar> {
        let idx = self.exec_index.checked_sub(offset)?;
        self.feed.exec().bars.get(idx)
    }

    fn resolve_price(&self, field: &str, offset: usize) -> Option<f64> {
        let bar = self.exec_bar_at(offset)?;
        let v = match field {
            "open" => bar.open,
            "high" => bar.high,
            "low" => bar.low,
            "close" => bar.close,
            "volume" => bar.volume,
            _ => return None,
        };
        (!v.is_nan()).then_some(v)
    }

    fn resolve_position(&self, field: &str) -> Option<f64> {
        let pos = self.position?;
        match field {
            "side" => Some(pos.side.sign()),
            "entry_price" => Some(pos.entry_price),
            "stop_loss" => Some(pos.stop_loss),
            "take_profit" => Some(pos.take_profit),
            "size_usdt" => Some(pos.size_usdt),
            "unrealized_pnl" => Some(pos.unrealized_pnl),
            _ => None,
        }
    }
}

impl<'a> SnapshotSource for Snapshot<'a> {
    fn resolve(&self, value: &Value, extra_offset: usize) -> Option<f64> {
        match value {
            Value::Scalar(x) => Some(*x),
            Value::Set(_) => None,
            Value::Feature { id, field, offset } => {
                let total_offset = offset + extra_offset;
                if let Some(stripped) = id.strip_prefix("price.") {
                    return self.resolve_price(stripped, total_offset);
                }
                if id == "position" {
                    return self.resolve_position(field);
                }
                match self.registry.resolutions.get(id.as_str())? {
                    Resolution::Indicator { tf, key } => {
                        let store = self.feed.get(*tf)?;
                        let target_exec_idx = self.exec_index.checked_sub(total_offset)?;
                        let idx = self.store_index(*tf, target_exec_idx)?;
                        let v = store.indicator_value(key, idx)?;
                        (!v.is_nan()).then_some(v)
                    }
                    Resolution::Structure { detector_key, field: f, .. } => {
                        let hist_key = format!("{detector_key}.{f}");
                        self.structure_history.at_offset(&hist_key, total_offset)
                    }
                }
            }
        }
    }

    fn has_history(&self, bars: usize, extra_offset: usize) -> bool {
        self.exec_index.checked_sub(bars + extra_offset).is_some()
    }

    fn scale_bars(&self, bars: usize, anchor_tf: Option<TfRole>) -> usize {
        match anchor_tf {
            None => bars,
            Some(role) => {
                let Some(store) = self.feed.get(role) else { return bars };
                if store.bars.len() < 2 || self.exec_tf_duration_ms == 0 {
                    return bars;
                }
                let anchor_duration = (store.bars[1].ts_close - store.bars[0].ts_close).max(1);
                let ratio = anchor_duration / self.exec_tf_duration_ms;
                bars * ratio.max(1) as usize
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FeedStore;
    use std::collections::HashMap;

    fn bar(close: f64) -> Bar {
        Bar { ts_open: 0, ts_close: 1, open: close, high: close, low: close, close, volume: 1.0 }
    }

    #[test]
    fn price_close_resolves_with_offset() {
        let bars = vec![bar(100.0), bar(101.0), bar(102.0)];
        let store = FeedStore::new(TfRole::Low, bars, 0);
        let mut stores = HashMap::new();
        stores.insert(TfRole::Low, store);
        let feed = MultiTfFeedStore::new(stores, TfRole::Low, 0);
        let registry = FeatureRegistry::new();
        let incremental = HashMap::new();
        let hist = StructureHistory::new(8);
        let forward_fill = HashMap::new();
        let snap = Snapshot::new(&registry, &feed, 2, &incremental, &hist, None, 1, &forward_fill);
        let v = Value::Feature { id: "price.close".to_string(), field: "value".to_string(), offset: 1 };
        assert_eq!(snap.resolve(&v, 0), Some(101.0));
    }

    #[test]
    fn higher_tf_indicator_reads_through_forward_fill() {
        // 6 exec (Low) bars; 2 Med bars, each spanning 3 exec bars.
        let low_bars: Vec<Bar> = (0..6).map(|i| bar(100.0 + i as f64)).collect();
        let med_bars = vec![bar(200.0), bar(201.0)];
        let mut med_store = FeedStore::new(TfRole::Med, med_bars, 0);
        med_store.set_indicator_output("ema_21", vec![50.0, 60.0]);

        let mut stores = HashMap::new();
        stores.insert(TfRole::Low, FeedStore::new(TfRole::Low, low_bars, 0));
        stores.insert(TfRole::Med, med_store);
        let feed = MultiTfFeedStore::new(stores, TfRole::Low, 0);

        let mut registry = FeatureRegistry::new();
        registry.register_indicator("ema_med", TfRole::Med, "ema_21");

        // exec idx 0,1,2 forward-fill to med idx 0; exec idx 3,4,5 to med idx 1.
        let mut forward_fill = HashMap::new();
        forward_fill.insert(TfRole::Med, vec![Some(0), Some(0), Some(0), Some(1), Some(1), Some(1)]);

        let incremental = HashMap::new();
        let hist = StructureHistory::new(8);
        let v = Value::Feature { id: "ema_med".to_string(), field: "value".to_string(), offset: 0 };

        for idx in 0..3 {
            let snap = Snapshot::new(&registry, &feed, idx, &incremental, &hist, None, 1, &forward_fill);
            assert_eq!(snap.resolve(&v, 0), Some(50.0));
        }
        for idx in 3..6 {
            let snap = Snapshot::new(&registry, &feed, idx, &incremental, &hist, None, 1, &forward_fill);
            assert_eq!(snap.resolve(&v, 0), Some(60.0));
        }
    }

    #[test]
    fn structure_history_lookback_returns_none_past_recorded_window() {
        let mut hist = StructureHistory::new(2);
        hist.record("swing.high_level", Some(10.0));
        hist.record("swing.high_level", Some(11.0));
        assert_eq!(hist.at_offset("swing.high_level", 0), Some(11.0));
        assert_eq!(hist.at_offset("swing.high_level", 1), Some(10.0));
        assert_eq!(hist.at_offset("swing.high_level", 2), None);
    }
}
