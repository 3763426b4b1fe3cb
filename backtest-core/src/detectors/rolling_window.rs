//! O(1) rolling min/max over a fixed-size window of a chosen bar field.

use super::{DepContext, DetectorValue, IncrementalDetector};
use crate::domain::Bar;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowField {
    High,
    Low,
    Close,
}

/// Monotonic-deque rolling min/max, grounded on the spec's "fixed-capacity
/// ring buffer owned by each detector" redesign note.
#[derive(Debug)]
pub struct RollingWindow {
    length: usize,
    field: WindowField,
    index: i64,
    max_deque: VecDeque<(i64, f64)>,
    min_deque: VecDeque<(i64, f64)>,
}

impl RollingWindow {
    pub fn new(length: usize, field: WindowField) -> Self {
        Self { length, field, index: -1, max_deque: VecDeque::new(), min_deque: VecDeque::new() }
    }

    fn field_value(&self, bar: &Bar) -> f64 {
        match self.field {
            WindowField::High => bar.high,
            WindowField::Low => bar.low,
            WindowField::Close => bar.close,
        }
    }

    pub fn max(&self) -> Option<f64> {
        self.max_deque.front().map(|(_, v)| *v)
    }

    pub fn min(&self) -> Option<f64> {
        self.min_deque.front().map(|(_, v)| *v)
    }
}

impl IncrementalDetector for RollingWindow {
    fn update(&mut self, bar: &Bar, _deps: &DepContext) {
        self.index += 1;
        if bar.is_void() {
            return;
        }
        let v = self.field_value(bar);
        let idx = self.index;
        while self.max_deque.back().is_some_and(|&(_, x)| x <= v) {
            self.max_deque.pop_back();
        }
        self.max_deque.push_back((idx, v));
        while self.min_deque.back().is_some_and(|&(_, x)| x >= v) {
            self.min_deque.pop_back();
        }
        self.min_deque.push_back((idx, v));

        let cutoff = idx - self.length as i64 + 1;
        while self.max_deque.front().is_some_and(|&(i, _)| i < cutoff) {
            self.max_deque.pop_front();
        }
        while self.min_deque.front().is_some_and(|&(i, _)| i < cutoff) {
            self.min_deque.pop_front();
        }
    }

    fn get_value(&self, field: &str) -> Option<DetectorValue> {
        match field {
            "max" => self.max().map(DetectorValue::Float),
            "min" => self.min().map(DetectorValue::Float),
            _ => None,
        }
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["max", "min"]
    }

    fn reset(&mut self) {
        self.index = -1;
        self.max_deque.clear();
        self.min_deque.clear();
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "index": self.index,
            "max_deque": self.max_deque,
            "min_deque": self.min_deque,
        })
    }

    fn restore(&mut self, snap: &serde_json::Value) {
        self.index = snap["index"].as_i64().unwrap_or(-1);
        self.max_deque = serde_json::from_value(snap["max_deque"].clone()).unwrap_or_default();
        self.min_deque = serde_json::from_value(snap["min_deque"].clone()).unwrap_or_default();
    }
}
