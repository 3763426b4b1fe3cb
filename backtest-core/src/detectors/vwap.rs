//! Session-anchored incremental VWAP.
//!
//! Weekly anchoring resets on the ISO Monday UTC boundary (the open question
//! in the spec's design notes resolved in favor of ISO Monday, not the
//! historical Thursday/epoch-aligned reset).

use super::{DepContext, DetectorValue, IncrementalDetector};
use crate::domain::Bar;
use chrono::{DateTime, Datelike, TimeZone, Utc, Weekday};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAnchor {
    None,
    Daily,
    Weekly,
}

#[derive(Debug)]
pub struct Vwap {
    anchor: SessionAnchor,
    cum_pv: f64,
    cum_vol: f64,
    value: Option<f64>,
    session_key: Option<i64>,
}

impl Vwap {
    pub fn new(anchor: SessionAnchor) -> Self {
        Self { anchor, cum_pv: 0.0, cum_vol: 0.0, value: None, session_key: None }
    }

    fn session_key(&self, ts_open: i64) -> i64 {
        match self.anchor {
            SessionAnchor::None => 0,
            SessionAnchor::Daily => {
                let dt: DateTime<Utc> = Utc.timestamp_millis_opt(ts_open).unwrap();
                dt.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp()
            }
            SessionAnchor::Weekly => {
                let dt: DateTime<Utc> = Utc.timestamp_millis_opt(ts_open).unwrap();
                let days_since_monday = dt.weekday().num_days_from_monday();
                let monday = dt.date_naive() - chrono::Duration::days(days_since_monday as i64);
                monday.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp()
            }
        }
    }
}

impl IncrementalDetector for Vwap {
    fn update(&mut self, bar: &Bar, _deps: &DepContext) {
        if bar.is_void() {
            return;
        }
        let key = self.session_key(bar.ts_open);
        if self.session_key != Some(key) {
            self.cum_pv = 0.0;
            self.cum_vol = 0.0;
            self.session_key = Some(key);
        }
        let typical = (bar.high + bar.low + bar.close) / 3.0;
        self.cum_pv += typical * bar.volume;
        self.cum_vol += bar.volume;
        // volume == 0 bars must not turn VWAP into NaN (§8 boundary case).
        if self.cum_vol > 0.0 {
            self.value = Some(self.cum_pv / self.cum_vol);
        }
    }

    fn get_value(&self, field: &str) -> Option<DetectorValue> {
        (field == "value").then_some(()).and_then(|_| self.value.map(DetectorValue::Float))
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["value"]
    }

    fn reset(&mut self) {
        self.cum_pv = 0.0;
        self.cum_vol = 0.0;
        self.value = None;
        self.session_key = None;
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "cum_pv": self.cum_pv,
            "cum_vol": self.cum_vol,
            "value": self.value,
            "session_key": self.session_key,
        })
    }

    fn restore(&mut self, snap: &serde_json::Value) {
        self.cum_pv = snap["cum_pv"].as_f64().unwrap_or(0.0);
        self.cum_vol = snap["cum_vol"].as_f64().unwrap_or(0.0);
        self.value = snap["value"].as_f64();
        self.session_key = snap["session_key"].as_i64();
    }
}
