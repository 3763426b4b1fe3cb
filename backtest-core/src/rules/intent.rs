//! Intent emitted by a `when -> emit` rule block, before risk sizing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentAction {
    EntryLong,
    EntryShort,
    ExitLong,
    ExitShort,
    ExitAll,
    AdjustStop,
    AdjustTarget,
    NoAction,
}

/// A price or a reference to a feature value, resolved against the snapshot
/// at intent time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PriceRef {
    Absolute(f64),
    Feature { feature_id: String, field: String, offset: usize, offset_pct: Option<f64>, offset_abs: Option<f64> },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SizeSpec {
    SizeUsdt(f64),
    SizePct(f64),
    RiskPct(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Intent {
    pub action: Option<IntentAction>,
    pub size: Option<SizeSpec>,
    pub stop_loss: Option<PriceRef>,
    pub take_profit: Option<PriceRef>,
    pub reason: Option<String>,
    pub metadata: HashMap<String, f64>,
}

impl Intent {
    pub fn new(action: IntentAction) -> Self {
        Self { action: Some(action), ..Default::default() }
    }
}
