//! Rectangular price-band zones with a PENDING/ACTIVE/TOUCHED/BROKEN
//! lifecycle and slot-array aggregates.
//!
//! `Zone` holds a fixed set of bands supplied at construction (their
//! `upper`/`lower` edges). `DerivedZone` re-anchors its single band from a
//! `Swing` dependency's most recent pivot pair, the same version-bump
//! invalidation pattern `Fibonacci` and `AnchoredVwap` use.

use super::{DepContext, DetectorValue, IncrementalDetector};
use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneState {
    Pending,
    Active,
    Touched,
    Broken,
}

impl ZoneState {
    fn as_i64(self) -> i64 {
        match self {
            ZoneState::Pending => 0,
            ZoneState::Active => 1,
            ZoneState::Touched => 2,
            ZoneState::Broken => 3,
        }
    }

    fn from_i64(v: i64) -> Self {
        match v {
            1 => ZoneState::Active,
            2 => ZoneState::Touched,
            3 => ZoneState::Broken,
            _ => ZoneState::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    upper: f64,
    lower: f64,
    state: ZoneState,
}

impl Slot {
    fn update(&mut self, bar: &Bar) {
        if self.state == ZoneState::Broken {
            return;
        }
        let entered = bar.low <= self.upper && bar.high >= self.lower;
        let broke_through = bar.close > self.upper || bar.close < self.lower;
        match self.state {
            ZoneState::Pending if entered => self.state = ZoneState::Active,
            ZoneState::Active if !entered => self.state = ZoneState::Touched,
            _ => {}
        }
        if broke_through && self.state != ZoneState::Pending {
            self.state = ZoneState::Broken;
        }
    }
}

#[derive(Debug)]
pub struct Zone {
    slots: Vec<Slot>,
}

impl Zone {
    pub fn new(bands: Vec<(f64, f64)>) -> Self {
        let slots = bands
            .into_iter()
            .map(|(upper, lower)| Slot { upper, lower, state: ZoneState::Pending })
            .collect();
        Self { slots }
    }

    fn active_count(&self) -> i64 {
        self.slots.iter().filter(|s| s.state == ZoneState::Active).count() as i64
    }

    fn closest_active(&self, price: f64) -> Option<&Slot> {
        self.slots
            .iter()
            .filter(|s| s.state == ZoneState::Active)
            .min_by(|a, b| {
                let da = ((a.upper + a.lower) / 2.0 - price).abs();
                let db = ((b.upper + b.lower) / 2.0 - price).abs();
                da.partial_cmp(&db).unwrap()
            })
    }
}

impl IncrementalDetector for Zone {
    fn update(&mut self, bar: &Bar, _deps: &DepContext) {
        if bar.is_void() {
            return;
        }
        for slot in &mut self.slots {
            slot.update(bar);
        }
    }

    fn get_value(&self, field: &str) -> Option<DetectorValue> {
        match field {
            "active_count" => Some(DetectorValue::Int(self.active_count())),
            "any_active" => Some(DetectorValue::Int((self.active_count() > 0) as i64)),
            _ => {
                if let Some(idx_str) = field.strip_prefix("slot_").and_then(|s| s.strip_suffix("_state")) {
                    let idx: usize = idx_str.parse().ok()?;
                    return self.slots.get(idx).map(|s| DetectorValue::Enum(s.state.as_i64()));
                }
                None
            }
        }
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["active_count", "any_active"]
    }

    fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.state = ZoneState::Pending;
        }
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "slots": self.slots.iter().map(|s| (s.upper, s.lower, s.state.as_i64())).collect::<Vec<_>>()
        })
    }

    fn restore(&mut self, snap: &serde_json::Value) {
        if let Some(arr) = snap["slots"].as_array() {
            self.slots = arr
                .iter()
                .filter_map(|v| {
                    let tuple = v.as_array()?;
                    Some(Slot {
                        upper: tuple.first()?.as_f64()?,
                        lower: tuple.get(1)?.as_f64()?,
                        state: ZoneState::from_i64(tuple.get(2)?.as_i64()?),
                    })
                })
                .collect();
        }
    }
}

/// Single price band anchored to a Swing's most recent pivot pair.
#[derive(Debug)]
pub struct DerivedZone {
    swing_key: String,
    slot: Option<Slot>,
    last_pair_version: i64,
}

impl DerivedZone {
    pub fn new(swing_key: impl Into<String>) -> Self {
        Self { swing_key: swing_key.into(), slot: None, last_pair_version: -1 }
    }
}

impl IncrementalDetector for DerivedZone {
    fn update(&mut self, bar: &Bar, deps: &DepContext) {
        let pair_version = deps
            .get(&self.swing_key, "pair_version")
            .map(|v| v.as_f64() as i64)
            .unwrap_or(-1);
        if pair_version != self.last_pair_version {
            self.last_pair_version = pair_version;
            let high = deps.get(&self.swing_key, "high_level").map(|v| v.as_f64());
            let low = deps.get(&self.swing_key, "low_level").map(|v| v.as_f64());
            if let (Some(upper), Some(lower)) = (high, low) {
                self.slot = Some(Slot { upper, lower, state: ZoneState::Pending });
            }
        }
        if let Some(slot) = &mut self.slot {
            if !bar.is_void() {
                slot.update(bar);
            }
        }
    }

    fn get_value(&self, field: &str) -> Option<DetectorValue> {
        match field {
            "state" => self.slot.map(|s| DetectorValue::Enum(s.state.as_i64())),
            "upper" => self.slot.map(|s| DetectorValue::Float(s.upper)),
            "lower" => self.slot.map(|s| DetectorValue::Float(s.lower)),
            _ => None,
        }
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["state", "upper", "lower"]
    }

    fn reset(&mut self) {
        self.slot = None;
        self.last_pair_version = -1;
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "slot": self.slot.map(|s| (s.upper, s.lower, s.state.as_i64())),
            "last_pair_version": self.last_pair_version,
        })
    }

    fn restore(&mut self, snap: &serde_json::Value) {
        self.slot = snap["slot"].as_array().map(|tuple| Slot {
            upper: tuple[0].as_f64().unwrap(),
            lower: tuple[1].as_f64().unwrap(),
            state: ZoneState::from_i64(tuple[2].as_i64().unwrap()),
        });
        self.last_pair_version = snap["last_pair_version"].as_i64().unwrap_or(-1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(h: f64, l: f64, c: f64) -> Bar {
        Bar { ts_open: 0, ts_close: 1, open: c, high: h, low: l, close: c, volume: 1.0 }
    }

    fn ctx(state: &super::super::TfIncrementalState) -> DepContext<'_> {
        DepContext { state }
    }

    #[test]
    fn zone_activates_on_entry_then_touched_on_exit() {
        let mut zone = Zone::new(vec![(110.0, 100.0)]);
        let empty = super::super::TfIncrementalState::build(&[], |_| unreachable!()).unwrap();
        zone.update(&bar(120.0, 115.0, 118.0), &ctx(&empty));
        assert_eq!(zone.get_value("active_count"), Some(DetectorValue::Int(0)));
        zone.update(&bar(108.0, 102.0, 105.0), &ctx(&empty));
        assert_eq!(zone.get_value("active_count"), Some(DetectorValue::Int(1)));
        zone.update(&bar(130.0, 120.0, 125.0), &ctx(&empty));
        assert_eq!(zone.get_value("active_count"), Some(DetectorValue::Int(0)));
    }

    #[test]
    fn zone_breaks_on_close_through() {
        let mut zone = Zone::new(vec![(110.0, 100.0)]);
        let empty = super::super::TfIncrementalState::build(&[], |_| unreachable!()).unwrap();
        zone.update(&bar(108.0, 102.0, 105.0), &ctx(&empty));
        zone.update(&bar(115.0, 108.0, 112.0), &ctx(&empty));
        assert_eq!(zone.get_value("slot_0_state"), Some(DetectorValue::Enum(ZoneState::Broken.as_i64())));
    }
}
