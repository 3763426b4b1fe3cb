//! Incremental Ehlers Fisher Transform, O(1) per bar via an internal
//! monotonic min/max deque (the same technique `RollingWindow` uses,
//! inlined here since Fisher needs the raw extremes, not just the values).

use super::{DepContext, DetectorValue, IncrementalDetector};
use crate::domain::Bar;
use std::collections::VecDeque;

#[derive(Debug)]
pub struct Fisher {
    period: usize,
    index: i64,
    max_deque: VecDeque<(i64, f64)>,
    min_deque: VecDeque<(i64, f64)>,
    value: f64,
    fisher: f64,
    count: u64,
}

impl Fisher {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            index: -1,
            max_deque: VecDeque::new(),
            min_deque: VecDeque::new(),
            value: 0.0,
            fisher: 0.0,
            count: 0,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.count as usize >= self.period
    }
}

impl IncrementalDetector for Fisher {
    fn update(&mut self, bar: &Bar, _deps: &DepContext) {
        self.index += 1;
        if bar.is_void() {
            return;
        }
        let price = (bar.high + bar.low) / 2.0;
        let idx = self.index;
        let cutoff = idx - self.period as i64 + 1;

        while let Some(&(i, _)) = self.max_deque.back() {
            if i < cutoff {
                self.max_deque.pop_back();
            } else {
                break;
            }
        }
        while self.max_deque.front().map_or(false, |&(_, v)| v <= price) {
            self.max_deque.pop_front();
        }
        self.max_deque.push_front((idx, price));

        while let Some(&(i, _)) = self.min_deque.back() {
            if i < cutoff {
                self.min_deque.pop_back();
            } else {
                break;
            }
        }
        while self.min_deque.front().map_or(false, |&(_, v)| v >= price) {
            self.min_deque.pop_front();
        }
        self.min_deque.push_front((idx, price));

        self.count += 1;
        let max_h = self.max_deque.back().map(|&(_, v)| v).unwrap_or(price);
        let min_l = self.min_deque.back().map(|&(_, v)| v).unwrap_or(price);
        let range = max_h - min_l;
        if range.abs() > f64::EPSILON {
            let raw = 0.33 * 2.0 * ((price - min_l) / range - 0.5) + 0.67 * self.value;
            self.value = raw.clamp(-0.999, 0.999);
        }
        self.fisher = 0.5 * ((1.0 + self.value) / (1.0 - self.value)).ln() + 0.5 * self.fisher;
    }

    fn get_value(&self, field: &str) -> Option<DetectorValue> {
        match field {
            "value" => Some(DetectorValue::Float(self.fisher)),
            "is_ready" => Some(DetectorValue::Int(self.is_ready() as i64)),
            _ => None,
        }
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["value", "is_ready"]
    }

    fn reset(&mut self) {
        self.index = -1;
        self.max_deque.clear();
        self.min_deque.clear();
        self.value = 0.0;
        self.fisher = 0.0;
        self.count = 0;
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "index": self.index,
            "max_deque": self.max_deque,
            "min_deque": self.min_deque,
            "value": self.value,
            "fisher": self.fisher,
            "count": self.count,
        })
    }

    fn restore(&mut self, snap: &serde_json::Value) {
        self.index = snap["index"].as_i64().unwrap_or(-1);
        self.max_deque = serde_json::from_value(snap["max_deque"].clone()).unwrap_or_default();
        self.min_deque = serde_json::from_value(snap["min_deque"].clone()).unwrap_or_default();
        self.value = snap["value"].as_f64().unwrap_or(0.0);
        self.fisher = snap["fisher"].as_f64().unwrap_or(0.0);
        self.count = snap["count"].as_u64().unwrap_or(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(h: f64, l: f64) -> Bar {
        Bar { ts_open: 0, ts_close: 1, open: h, high: h, low: l, close: h, volume: 1.0 }
    }

    fn ctx(state: &super::super::TfIncrementalState) -> DepContext<'_> {
        DepContext { state }
    }

    #[test]
    fn becomes_ready_after_period_bars() {
        let mut fisher = Fisher::new(3);
        let empty = super::super::TfIncrementalState::build(&[], |_| unreachable!()).unwrap();
        for (h, l) in [(10.0, 9.0), (11.0, 10.0), (12.0, 11.0)] {
            fisher.update(&bar(h, l), &ctx(&empty));
        }
        assert_eq!(fisher.get_value("is_ready"), Some(DetectorValue::Int(1)));
    }

    #[test]
    fn finite_for_trending_prices() {
        let mut fisher = Fisher::new(5);
        let empty = super::super::TfIncrementalState::build(&[], |_| unreachable!()).unwrap();
        for i in 0..10 {
            let base = 10.0 + i as f64;
            fisher.update(&bar(base + 1.0, base), &ctx(&empty));
        }
        if let Some(DetectorValue::Float(v)) = fisher.get_value("value") {
            assert!(v.is_finite());
        } else {
            panic!("expected value");
        }
    }
}
