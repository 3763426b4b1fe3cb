//! Fibonacci retracement/extension levels anchored to a `Swing` pivot pair.
//!
//! Re-anchors whenever the swing's `pair_version` bumps, mirroring the
//! version-driven invalidation `AnchoredVwap` also relies on.

use super::{DepContext, DetectorValue, IncrementalDetector};
use crate::domain::Bar;

const RATIOS: [(&str, f64); 7] = [
    ("r0", 0.0),
    ("r236", 0.236),
    ("r382", 0.382),
    ("r500", 0.5),
    ("r618", 0.618),
    ("r786", 0.786),
    ("r1000", 1.0),
];
const EXT_RATIOS: [(&str, f64); 2] = [("e1272", 1.272), ("e1618", 1.618)];

#[derive(Debug)]
pub struct Fibonacci {
    swing_key: String,
    anchor_high: Option<f64>,
    anchor_low: Option<f64>,
    last_pair_version: i64,
}

impl Fibonacci {
    pub fn new(swing_key: impl Into<String>) -> Self {
        Self { swing_key: swing_key.into(), anchor_high: None, anchor_low: None, last_pair_version: -1 }
    }

    fn level(&self, ratio: f64) -> Option<f64> {
        let (h, l) = (self.anchor_high?, self.anchor_low?);
        Some(h - ratio * (h - l))
    }

    fn extension(&self, ratio: f64) -> Option<f64> {
        let (h, l) = (self.anchor_high?, self.anchor_low?);
        Some(h - ratio * (h - l))
    }
}

impl IncrementalDetector for Fibonacci {
    fn update(&mut self, _bar: &Bar, deps: &DepContext) {
        let pair_version = deps
            .get(&self.swing_key, "pair_version")
            .map(|v| v.as_f64() as i64)
            .unwrap_or(-1);
        if pair_version != self.last_pair_version {
            self.last_pair_version = pair_version;
            self.anchor_high = deps.get(&self.swing_key, "high_level").map(|v| v.as_f64());
            self.anchor_low = deps.get(&self.swing_key, "low_level").map(|v| v.as_f64());
        }
    }

    fn get_value(&self, field: &str) -> Option<DetectorValue> {
        for (key, ratio) in RATIOS {
            if field == key {
                return self.level(ratio).map(DetectorValue::Float);
            }
        }
        for (key, ratio) in EXT_RATIOS {
            if field == key {
                return self.extension(ratio).map(DetectorValue::Float);
            }
        }
        None
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["r0", "r236", "r382", "r500", "r618", "r786", "r1000", "e1272", "e1618"]
    }

    fn reset(&mut self) {
        self.anchor_high = None;
        self.anchor_low = None;
        self.last_pair_version = -1;
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "anchor_high": self.anchor_high,
            "anchor_low": self.anchor_low,
            "last_pair_version": self.last_pair_version,
        })
    }

    fn restore(&mut self, snap: &serde_json::Value) {
        self.anchor_high = snap["anchor_high"].as_f64();
        self.anchor_low = snap["anchor_low"].as_f64();
        self.last_pair_version = snap["last_pair_version"].as_i64().unwrap_or(-1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::swing::Swing;
    use crate::detectors::{DetectorSpec, TfIncrementalState};
    use std::collections::HashMap;

    fn bar(h: f64, l: f64) -> Bar {
        Bar { ts_open: 0, ts_close: 1, open: h, high: h, low: l, close: h, volume: 1.0 }
    }

    fn make_state() -> TfIncrementalState {
        let specs = vec![
            DetectorSpec { key: "sw".to_string(), depends_on: HashMap::new() },
            DetectorSpec {
                key: "fib".to_string(),
                depends_on: HashMap::from([("swing".to_string(), "sw".to_string())]),
            },
        ];
        TfIncrementalState::build(&specs, |key| match key {
            "sw" => Box::new(Swing::new(1, 1)),
            "fib" => Box::new(Fibonacci::new("sw")),
            _ => unreachable!(),
        })
        .unwrap()
    }

    #[test]
    fn levels_interpolate_between_anchors() {
        let state = make_state();
        for (h, l) in [(10.0, 0.0), (20.0, 10.0), (15.0, 5.0)] {
            state.update(&bar(h, l));
        }
        let r500 = state.get("fib", "r500").unwrap().as_f64();
        let high = state.get("sw", "high_level").unwrap().as_f64();
        let low = state.get("sw", "low_level").unwrap().as_f64();
        assert!((r500 - (high + low) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn no_value_before_any_pivot_confirmed() {
        let state = make_state();
        state.update(&bar(10.0, 9.0));
        assert_eq!(state.get("fib", "r500"), None);
    }
}
