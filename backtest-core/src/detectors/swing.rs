//! Fractal swing pivot detection.
//!
//! A bar is a confirmed swing high/low once `right` bars have closed after
//! it and it remains the extreme of the `left + 1 + right` window — the
//! classic Williams-fractal shape, expressed here as an O(1) stateful
//! detector instead of a vectorised lookback scan.

use super::{DepContext, DetectorValue, IncrementalDetector};
use crate::domain::Bar;
use std::collections::VecDeque;

#[derive(Debug)]
pub struct Swing {
    left: usize,
    right: usize,
    window: VecDeque<(i64, Bar)>,
    index: i64,
    high_level: Option<f64>,
    low_level: Option<f64>,
    high_idx: Option<i64>,
    low_idx: Option<i64>,
    high_version: u64,
    low_version: u64,
    pair_direction: i64,
}

impl Swing {
    pub fn new(left: usize, right: usize) -> Self {
        Self {
            left,
            right,
            window: VecDeque::new(),
            index: -1,
            high_level: None,
            low_level: None,
            high_idx: None,
            low_idx: None,
            high_version: 0,
            low_version: 0,
            pair_direction: 0,
        }
    }

    fn span(&self) -> usize {
        self.left + self.right + 1
    }

    pub fn total_version(&self) -> u64 {
        self.high_version + self.low_version
    }
}

impl IncrementalDetector for Swing {
    fn update(&mut self, bar: &Bar, _deps: &DepContext) {
        self.index += 1;
        if bar.is_void() {
            return;
        }
        self.window.push_back((self.index, *bar));
        if self.window.len() > self.span() {
            self.window.pop_front();
        }
        if self.window.len() < self.span() {
            return;
        }
        let center = self.left;
        let (center_idx, center_bar) = self.window[center];
        let is_high = self
            .window
            .iter()
            .enumerate()
            .all(|(i, (_, b))| i == center || b.high <= center_bar.high);
        let is_low = self
            .window
            .iter()
            .enumerate()
            .all(|(i, (_, b))| i == center || b.low >= center_bar.low);

        if is_high {
            self.high_level = Some(center_bar.high);
            self.high_idx = Some(center_idx);
            self.high_version += 1;
            self.pair_direction = 1;
        }
        if is_low {
            self.low_level = Some(center_bar.low);
            self.low_idx = Some(center_idx);
            self.low_version += 1;
            self.pair_direction = -1;
        }
    }

    fn get_value(&self, field: &str) -> Option<DetectorValue> {
        match field {
            "high_level" => self.high_level.map(DetectorValue::Float),
            "low_level" => self.low_level.map(DetectorValue::Float),
            "high_idx" => self.high_idx.map(DetectorValue::Int),
            "low_idx" => self.low_idx.map(DetectorValue::Int),
            "high_version" => Some(DetectorValue::Int(self.high_version as i64)),
            "low_version" => Some(DetectorValue::Int(self.low_version as i64)),
            "pair_direction" => Some(DetectorValue::Int(self.pair_direction)),
            "pair_version" => Some(DetectorValue::Int(self.total_version() as i64)),
            _ => None,
        }
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &[
            "high_level",
            "low_level",
            "high_idx",
            "low_idx",
            "high_version",
            "low_version",
            "pair_direction",
            "pair_version",
        ]
    }

    fn reset(&mut self) {
        self.window.clear();
        self.index = -1;
        self.high_level = None;
        self.low_level = None;
        self.high_idx = None;
        self.low_idx = None;
        self.high_version = 0;
        self.low_version = 0;
        self.pair_direction = 0;
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "window": self.window,
            "index": self.index,
            "high_level": self.high_level,
            "low_level": self.low_level,
            "high_idx": self.high_idx,
            "low_idx": self.low_idx,
            "high_version": self.high_version,
            "low_version": self.low_version,
            "pair_direction": self.pair_direction,
        })
    }

    fn restore(&mut self, snap: &serde_json::Value) {
        self.window = serde_json::from_value(snap["window"].clone()).unwrap_or_default();
        self.index = snap["index"].as_i64().unwrap_or(-1);
        self.high_level = snap["high_level"].as_f64();
        self.low_level = snap["low_level"].as_f64();
        self.high_idx = snap["high_idx"].as_i64();
        self.low_idx = snap["low_idx"].as_i64();
        self.high_version = snap["high_version"].as_u64().unwrap_or(0);
        self.low_version = snap["low_version"].as_u64().unwrap_or(0);
        self.pair_direction = snap["pair_direction"].as_i64().unwrap_or(0);
    }
}
