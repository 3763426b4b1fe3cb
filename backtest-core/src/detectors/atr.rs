//! Incremental Wilder-smoothed Average True Range, O(1) per bar.

use super::{DepContext, DetectorValue, IncrementalDetector};
use crate::domain::Bar;

#[derive(Debug)]
pub struct IncrementalAtr {
    period: usize,
    prev_close: Option<f64>,
    value: Option<f64>,
    count: u64,
}

impl IncrementalAtr {
    pub fn new(period: usize) -> Self {
        Self { period, prev_close: None, value: None, count: 0 }
    }

    pub fn is_ready(&self) -> bool {
        self.count as usize >= self.period
    }

    fn true_range(&self, bar: &Bar) -> f64 {
        match self.prev_close {
            None => bar.high - bar.low,
            Some(prev) => (bar.high - bar.low).max((bar.high - prev).abs()).max((bar.low - prev).abs()),
        }
    }
}

impl IncrementalDetector for IncrementalAtr {
    fn update(&mut self, bar: &Bar, _deps: &DepContext) {
        if bar.is_void() {
            self.count += 1;
            return;
        }
        let tr = self.true_range(bar);
        self.value = Some(match self.value {
            None => tr,
            Some(prev) => {
                let n = self.period as f64;
                (prev * (n - 1.0) + tr) / n
            }
        });
        self.prev_close = Some(bar.close);
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
        self.prev_close = None;
        self.value = None;
        self.count = 0;
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({ "prev_close": self.prev_close, "value": self.value, "count": self.count })
    }

    fn restore(&mut self, snap: &serde_json::Value) {
        self.prev_close = snap["prev_close"].as_f64();
        self.value = snap["value"].as_f64();
        self.count = snap["count"].as_u64().unwrap_or(0);
    }
}
