//! Incremental exponential moving average, O(1) per bar.

use super::{DepContext, DetectorValue, IncrementalDetector};
use crate::domain::Bar;

#[derive(Debug)]
pub struct IncrementalEma {
    period: usize,
    alpha: f64,
    value: Option<f64>,
    count: u64,
}

impl IncrementalEma {
    pub fn new(period: usize) -> Self {
        Self { period, alpha: 2.0 / (period as f64 + 1.0), value: None, count: 0 }
    }

    pub fn is_ready(&self) -> bool {
        self.count as usize >= self.period
    }
}

impl IncrementalDetector for IncrementalEma {
    fn update(&mut self, bar: &Bar, _deps: &DepContext) {
        if bar.close.is_nan() {
            self.count += 1;
            return;
        }
        self.value = Some(match self.value {
            None => bar.close,
            Some(prev) => self.alpha * bar.close + (1.0 - self.alpha) * prev,
        });
        self.count += 1;
    }

    fn get_value(&self, field: &str) -> Option<DetectorValue> {
        match field {
            "value" => self.value.map(DetectorValue::Float),
            "is_ready" => Some(DetectorValue::Int(self.is_ready() as i64)),
            _ => None,
        }
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["value", "is_ready"]
    }

    fn reset(&mut self) {
        self.value = None;
        self.count = 0;
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({ "value": self.value, "count": self.count })
    }

    fn restore(&mut self, snap: &serde_json::Value) {
        self.value = snap["value"].as_f64();
        self.count = snap["count"].as_u64().unwrap_or(0);
    }
}
