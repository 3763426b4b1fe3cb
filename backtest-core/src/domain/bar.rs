//! Closed-candle bar model shared by every timeframe.

use serde::{Deserialize, Serialize};

/// One of the three canonical timeframe roles a Play may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TfRole {
    Low,
    Med,
    High,
}

/// A single closed OHLCV candle on one timeframe.
///
/// Timestamps are UTC milliseconds. `ts_close - ts_open` must equal the
/// timeframe's duration; the engine never sees a partially-formed bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub ts_open: i64,
    pub ts_close: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// True if any OHLC field is NaN — a void bar standing in for a gap.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// OHLC ordering invariant from the data model.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.open.max(self.close)
            && self.low <= self.open.min(self.close)
            && self.ts_close > self.ts_open
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Whether the underlying market produced a real bar or a forward-carried gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketStatus {
    Open,
    Void,
}
