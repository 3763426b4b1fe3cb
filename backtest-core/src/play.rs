//! The declarative strategy description ("Play") the core receives at its boundary.
//!
//! The core never loads YAML itself (§6 of the spec: that's an external
//! collaborator's job). It only needs `Play` and its substructures to be
//! plain `serde`-deserializable data so a loader can hand over an
//! already-validated tree.

use crate::domain::TfRole;
use crate::rules::Node;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionMode {
    LongOnly,
    ShortOnly,
    LongShort,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeModel {
    pub taker_bps: f64,
    pub maker_bps: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub starting_equity_usdt: f64,
    pub max_leverage: f64,
    pub fee_model: FeeModel,
    pub slippage_bps: f64,
    pub min_trade_notional_usdt: f64,
    pub maintenance_margin_rate: Option<f64>,
    /// Funding rate applied at each 8h UTC boundary, as a ratio of position
    /// value (positive: longs pay shorts). A Play wires this from its
    /// funding schedule; the core treats it as a scalar per run.
    pub funding_rate_per_8h: f64,
}

impl AccountConfig {
    pub fn maintenance_margin_rate(&self) -> f64 {
        self.maintenance_margin_rate.unwrap_or(0.005)
    }

    pub fn initial_margin_rate(&self) -> f64 {
        1.0 / self.max_leverage
    }
}

/// A single timeframe declaration: role + duration in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TfSpec {
    pub role: TfRole,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeframeConfig {
    pub low_tf: TfSpec,
    pub med_tf: Option<TfSpec>,
    pub high_tf: Option<TfSpec>,
    pub exec: TfRole,
}

/// One declared feature: a batch indicator or an incremental detector.
/// `kind` is resolved against the registries at builder-construction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub id: String,
    pub kind: String,
    pub tf: TfRole,
    pub params: BTreeMap<String, f64>,
    /// `depends_on: {logical_role: key}` — other feature ids on the same TF.
    #[serde(default)]
    pub depends_on: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRules {
    pub entry_long: Option<Node>,
    pub entry_short: Option<Node>,
    pub exit_long: Option<Node>,
    pub exit_short: Option<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StopRule {
    Absolute { price: f64 },
    FixedPct { pct: f64 },
    AtrMultiple { multiple: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SizingRule {
    SizeUsdt(f64),
    SizePct(f64),
    RiskPct(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskModel {
    pub stop_loss: StopRule,
    pub take_profit: StopRule,
    pub sizing: SizingRule,
    /// `atr` feature id used when a stop rule is `AtrMultiple`.
    pub atr_feature_id: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionPolicy {
    pub mode: PositionMode,
    pub allow_flip: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Play {
    pub id: String,
    pub version: String,
    pub account: AccountConfig,
    pub symbol_universe: Vec<String>,
    pub timeframes: TimeframeConfig,
    pub feature_specs: Vec<FeatureSpec>,
    pub signal_rules: SignalRules,
    pub risk_model: RiskModel,
    pub position_policy: PositionPolicy,
}
