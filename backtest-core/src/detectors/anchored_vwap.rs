//! VWAP anchored to a `Swing` dependency's pivot version, not a session
//! boundary. Resets its accumulators the bar the swing's `pair_version`
//! bumps; `bars_since_anchor` is 0 on that exact bar and 1 at its close.
//!
//! Must never be computed in the batch Data Frame Builder path — it depends
//! on incremental structure state, so the builder writes NaN placeholders
//! and the engine drives this detector bar-by-bar instead.

use super::{DepContext, DetectorValue, IncrementalDetector};
use crate::domain::Bar;

#[derive(Debug)]
pub struct AnchoredVwap {
    swing_key: String,
    last_pair_version: i64,
    cum_pv: f64,
    cum_vol: f64,
    value: Option<f64>,
    bars_since_anchor: u64,
}

impl AnchoredVwap {
    pub fn new(swing_key: impl Into<String>) -> Self {
        Self {
            swing_key: swing_key.into(),
            last_pair_version: -1,
            cum_pv: 0.0,
            cum_vol: 0.0,
            value: None,
            bars_since_anchor: 0,
        }
    }
}

impl IncrementalDetector for AnchoredVwap {
    fn update(&mut self, bar: &Bar, deps: &DepContext) {
        let pair_version = deps
            .get(&self.swing_key, "pair_version")
            .map(|v| v.as_f64() as i64)
            .unwrap_or(-1);
        if pair_version != self.last_pair_version {
            self.last_pair_version = pair_version;
            self.cum_pv = 0.0;
            self.cum_vol = 0.0;
            self.bars_since_anchor = 0;
        }
        if bar.is_void() {
            return;
        }
        let typical = (bar.high + bar.low + bar.close) / 3.0;
        self.cum_pv += typical * bar.volume;
        self.cum_vol += bar.volume;
        if self.cum_vol > 0.0 {
            self.value = Some(self.cum_pv / self.cum_vol);
        }
        self.bars_since_anchor += 1;
    }

    fn get_value(&self, field: &str) -> Option<DetectorValue> {
        match field {
            "value" => self.value.map(DetectorValue::Float),
            "bars_since_anchor" => Some(DetectorValue::Int(self.bars_since_anchor as i64)),
            _ => None,
        }
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["value", "bars_since_anchor"]
    }

    fn reset(&mut self) {
        self.last_pair_version = -1;
        self.cum_pv = 0.0;
        self.cum_vol = 0.0;
        self.value = None;
        self.bars_since_anchor = 0;
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "last_pair_version": self.last_pair_version,
            "cum_pv": self.cum_pv,
            "cum_vol": self.cum_vol,
            "value": self.value,
            "bars_since_anchor": self.bars_since_anchor,
        })
    }

    fn restore(&mut self, snap: &serde_json::Value) {
        self.last_pair_version = snap["last_pair_version"].as_i64().unwrap_or(-1);
        self.cum_pv = snap["cum_pv"].as_f64().unwrap_or(0.0);
        self.cum_vol = snap["cum_vol"].as_f64().unwrap_or(0.0);
        self.value = snap["value"].as_f64();
        self.bars_since_anchor = snap["bars_since_anchor"].as_u64().unwrap_or(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::swing::Swing;
    use crate::detectors::{DetectorSpec, TfIncrementalState};
    use std::collections::HashMap;

    fn bar(h: f64, l: f64, v: f64) -> Bar {
        Bar { ts_open: 0, ts_close: 1, open: h, high: h, low: l, close: h, volume: v }
    }

    fn make_state() -> TfIncrementalState {
        let specs = vec![
            DetectorSpec { key: "sw".to_string(), depends_on: HashMap::new() },
            DetectorSpec {
                key: "avwap".to_string(),
                depends_on: HashMap::from([("swing".to_string(), "sw".to_string())]),
            },
        ];
        TfIncrementalState::build(&specs, |key| match key {
            "sw" => Box::new(Swing::new(1, 1)),
            "avwap" => Box::new(AnchoredVwap::new("sw")),
            _ => unreachable!(),
        })
        .unwrap()
    }

    #[test]
    fn bars_since_anchor_resets_to_zero_on_new_pivot() {
        let state = make_state();
        state.update(&bar(10.0, 9.0, 1.0));
        state.update(&bar(15.0, 14.0, 1.0));
        state.update(&bar(12.0, 11.0, 1.0));
        // third bar confirms the swing high pivot -> pair_version bumps on this bar.
        assert_eq!(state.get("avwap", "bars_since_anchor"), Some(DetectorValue::Int(1)));
    }
}
