//! Trend direction/strength derived from a `Swing` dependency.
//!
//! Declares `depends_on: {"swing": <swing_key>}` at the Play level; reads the
//! swing detector's confirmed pivot versions through `DepContext` rather than
//! re-deriving pivots itself.

use super::{DepContext, DetectorValue, IncrementalDetector};
use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Direction {
    fn as_i64(self) -> i64 {
        match self {
            Direction::Up => 1,
            Direction::Down => -1,
            Direction::Flat => 0,
        }
    }
}

#[derive(Debug)]
pub struct Trend {
    swing_key: String,
    direction: Direction,
    bars_in_trend: u64,
    last_pair_version: i64,
    last_high: Option<f64>,
    last_low: Option<f64>,
}

impl Trend {
    pub fn new(swing_key: impl Into<String>) -> Self {
        Self {
            swing_key: swing_key.into(),
            direction: Direction::Flat,
            bars_in_trend: 0,
            last_pair_version: -1,
            last_high: None,
            last_low: None,
        }
    }
}

impl IncrementalDetector for Trend {
    fn update(&mut self, _bar: &Bar, deps: &DepContext) {
        let pair_version = deps
            .get(&self.swing_key, "pair_version")
            .map(|v| v.as_f64() as i64)
            .unwrap_or(-1);
        let high = deps.get(&self.swing_key, "high_level").map(|v| v.as_f64());
        let low = deps.get(&self.swing_key, "low_level").map(|v| v.as_f64());

        if pair_version != self.last_pair_version {
            self.last_pair_version = pair_version;
            let new_direction = match (high, self.last_high, low, self.last_low) {
                (Some(h), Some(prev_h), _, _) if h > prev_h => Direction::Up,
                (_, _, Some(l), Some(prev_l)) if l < prev_l => Direction::Down,
                _ => self.direction,
            };
            if new_direction == self.direction {
                self.bars_in_trend += 1;
            } else {
                self.direction = new_direction;
                self.bars_in_trend = 1;
            }
            if high.is_some() {
                self.last_high = high;
            }
            if low.is_some() {
                self.last_low = low;
            }
        } else {
            self.bars_in_trend += 1;
        }
    }

    fn get_value(&self, field: &str) -> Option<DetectorValue> {
        match field {
            "direction" => Some(DetectorValue::Enum(self.direction.as_i64())),
            "bars_in_trend" => Some(DetectorValue::Int(self.bars_in_trend as i64)),
            _ => None,
        }
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["direction", "bars_in_trend"]
    }

    fn reset(&mut self) {
        self.direction = Direction::Flat;
        self.bars_in_trend = 0;
        self.last_pair_version = -1;
        self.last_high = None;
        self.last_low = None;
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "direction": self.direction.as_i64(),
            "bars_in_trend": self.bars_in_trend,
            "last_pair_version": self.last_pair_version,
            "last_high": self.last_high,
            "last_low": self.last_low,
        })
    }

    fn restore(&mut self, snap: &serde_json::Value) {
        self.direction = match snap["direction"].as_i64().unwrap_or(0) {
            1 => Direction::Up,
            -1 => Direction::Down,
            _ => Direction::Flat,
        };
        self.bars_in_trend = snap["bars_in_trend"].as_u64().unwrap_or(0);
        self.last_pair_version = snap["last_pair_version"].as_i64().unwrap_or(-1);
        self.last_high = snap["last_high"].as_f64();
        self.last_low = snap["last_low"].as_f64();
    }
}
