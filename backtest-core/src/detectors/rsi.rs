//! Incremental Wilder-smoothed RSI, O(1) per bar.

use super::{DepContext, DetectorValue, IncrementalDetector};
use crate::domain::Bar;

#[derive(Debug)]
pub struct IncrementalRsi {
    period: usize,
    prev_close: Option<f64>,
    avg_gain: f64,
    avg_loss: f64,
    count: u64,
}

impl IncrementalRsi {
    pub fn new(period: usize) -> Self {
        Self { period, prev_close: None, avg_gain: 0.0, avg_loss: 0.0, count: 0 }
    }

    fn rsi(&self) -> f64 {
        if self.avg_gain == 0.0 && self.avg_loss == 0.0 {
            50.0
        } else if self.avg_loss == 0.0 {
            100.0
        } else if self.avg_gain == 0.0 {
            0.0
        } else {
            let rs = self.avg_gain / self.avg_loss;
            100.0 - 100.0 / (1.0 + rs)
        }
    }

    pub fn is_ready(&self) -> bool {
        self.count as usize > self.period
    }
}

impl IncrementalDetector for IncrementalRsi {
    fn update(&mut self, bar: &Bar, _deps: &DepContext) {
        if bar.close.is_nan() {
            self.count += 1;
            return;
        }
        if let Some(prev) = self.prev_close {
            let change = bar.close - prev;
            let gain = change.max(0.0);
            let loss = (-change).max(0.0);
            let n = self.period as f64;
            self.avg_gain = (self.avg_gain * (n - 1.0) + gain) / n;
            self.avg_loss = (self.avg_loss * (n - 1.0) + loss) / n;
            self.count += 1;
        }
        self.prev_close = Some(bar.close);
    }

    fn get_value(&self, field: &str) -> Option<DetectorValue> {
        match field {
            "value" => Some(DetectorValue::Float(self.rsi())),
            "is_ready" => Some(DetectorValue::Int(self.is_ready() as i64)),
            _ => None,
        }
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["value", "is_ready"]
    }

    fn reset(&mut self) {
        self.prev_close = None;
        self.avg_gain = 0.0;
        self.avg_loss = 0.0;
        self.count = 0;
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "prev_close": self.prev_close,
            "avg_gain": self.avg_gain,
            "avg_loss": self.avg_loss,
            "count": self.count,
        })
    }

    fn restore(&mut self, snap: &serde_json::Value) {
        self.prev_close = snap["prev_close"].as_f64();
        self.avg_gain = snap["avg_gain"].as_f64().unwrap_or(0.0);
        self.avg_loss = snap["avg_loss"].as_f64().unwrap_or(0.0);
        self.count = snap["count"].as_u64().unwrap_or(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(close: f64) -> Bar {
        Bar { ts_open: 0, ts_close: 1, open: close, high: close, low: close, close, volume: 1.0 }
    }

    fn ctx(state: &super::super::TfIncrementalState) -> DepContext<'_> {
        DepContext { state }
    }

    #[test]
    fn constant_gains_drive_rsi_toward_100() {
        let mut rsi = IncrementalRsi::new(3);
        let empty = super::super::TfIncrementalState::build(&[], |_| unreachable!()).unwrap();
        for c in [100.0, 101.0, 102.0, 103.0, 104.0, 105.0] {
            rsi.update(&bar(c), &ctx(&empty));
        }
        if let Some(DetectorValue::Float(v)) = rsi.get_value("value") {
            assert!(v > 90.0);
        } else {
            panic!("expected value");
        }
    }

    #[test]
    fn no_change_yields_fifty() {
        let mut rsi = IncrementalRsi::new(3);
        let empty = super::super::TfIncrementalState::build(&[], |_| unreachable!()).unwrap();
        rsi.update(&bar(100.0), &ctx(&empty));
        assert_eq!(rsi.get_value("value"), Some(DetectorValue::Float(50.0)));
    }
}
