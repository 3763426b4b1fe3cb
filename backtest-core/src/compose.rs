//! Wires a Play's declared `feature_specs` and raw per-TF bars into the
//! three inputs `Engine::new` needs: a populated `MultiTfFeedStore`, one
//! `TfIncrementalState` per TF that declares structural detectors, and a
//! `FeatureRegistry` resolving every declared id to where its value lives.
//!
//! This is the seam between an external Play/data loader (out of scope, per
//! §6) and the deterministic core: everything downstream of `prepare_run`
//! never looks at a `FeatureSpec` again.

use crate::data::{DataFrameBuilder, FeedStore, MultiTfFeedStore};
use crate::detectors::anchored_vwap::AnchoredVwap;
use crate::detectors::fibonacci::Fibonacci;
use crate::detectors::fisher::Fisher;
use crate::detectors::rolling_window::{RollingWindow, WindowField};
use crate::detectors::swing::Swing;
use crate::detectors::trend::Trend;
use crate::detectors::zone::{DerivedZone, Zone};
use crate::detectors::{DetectorSpec, IncrementalDetector, TfIncrementalState};
use crate::domain::{Bar, TfRole};
use crate::error::{CoreError, CoreResult};
use crate::play::{FeatureSpec, Play};
use crate::snapshot::FeatureRegistry;
use std::collections::HashMap;

const BATCH_KINDS: &[&str] = &["ema", "sma", "rsi", "atr", "vwap"];

/// Output field names a structural/incremental-only kind produces, fixed
/// regardless of its params — used to pre-register every field in the
/// Snapshot View's registry without instantiating the detector first.
fn structural_output_fields(kind: &str) -> CoreResult<&'static [&'static str]> {
    match kind {
        "anchored_vwap" => Ok(&["value", "bars_since_anchor"]),
        "rolling_window" => Ok(&["max", "min"]),
        "swing" => Ok(&["high_level", "low_level", "high_idx", "low_idx", "high_version", "low_version", "pair_direction", "pair_version"]),
        "trend" => Ok(&["direction", "bars_in_trend"]),
        "zone" => Ok(&["active_count", "any_active"]),
        "derived_zone" => Ok(&["state", "upper", "lower"]),
        "fibonacci" => Ok(&["r0", "r236", "r382", "r500", "r618", "r786", "r1000", "e1272", "e1618"]),
        "fisher" => Ok(&["value", "is_ready"]),
        other => Err(CoreError::UnknownIndicator { kind: other.to_string() }),
    }
}

fn required_param(spec: &FeatureSpec, name: &str) -> CoreResult<f64> {
    spec.params.get(name).copied().ok_or_else(|| CoreError::InvalidParam {
        message: format!("feature '{}' missing required '{name}' param", spec.id),
        fix_hint: format!("add a numeric '{name}' param"),
    })
}

fn required_dep(spec: &FeatureSpec, role: &str) -> CoreResult<&str> {
    spec.depends_on.get(role).map(|s| s.as_str()).ok_or_else(|| CoreError::InvalidPlay {
        message: format!("feature '{}' missing required depends_on.{role}", spec.id),
        fix_hint: format!("add depends_on: {{ \"{role}\": \"<swing feature id>\" }}"),
    })
}

/// Bands for a `zone` feature are packed as `band_{i}_upper`/`band_{i}_lower`
/// param pairs since `FeatureSpec::params` is flat `f64`-valued.
fn zone_bands(spec: &FeatureSpec) -> CoreResult<Vec<(f64, f64)>> {
    let mut bands = Vec::new();
    let mut i = 0;
    loop {
        let upper_key = format!("band_{i}_upper");
        let lower_key = format!("band_{i}_lower");
        match (spec.params.get(&upper_key), spec.params.get(&lower_key)) {
            (Some(&upper), Some(&lower)) => bands.push((upper, lower)),
            _ => break,
        }
        i += 1;
    }
    if bands.is_empty() {
        return Err(CoreError::InvalidParam {
            message: format!("feature '{}' (zone) declares no bands", spec.id),
            fix_hint: "add band_0_upper/band_0_lower (and further band_N_* pairs)".to_string(),
        });
    }
    Ok(bands)
}

fn build_detector(spec: &FeatureSpec) -> CoreResult<Box<dyn IncrementalDetector>> {
    match spec.kind.as_str() {
        "swing" => {
            let left = required_param(spec, "left")? as usize;
            let right = required_param(spec, "right")? as usize;
            Ok(Box::new(Swing::new(left, right)))
        }
        "trend" => Ok(Box::new(Trend::new(required_dep(spec, "swing")?.to_string()))),
        "zone" => Ok(Box::new(Zone::new(zone_bands(spec)?))),
        "derived_zone" => Ok(Box::new(DerivedZone::new(required_dep(spec, "swing")?.to_string()))),
        "fibonacci" => Ok(Box::new(Fibonacci::new(required_dep(spec, "swing")?.to_string()))),
        "anchored_vwap" => Ok(Box::new(AnchoredVwap::new(required_dep(spec, "swing")?.to_string()))),
        "fisher" => Ok(Box::new(Fisher::new(required_param(spec, "period")? as usize))),
        "rolling_window" => {
            let length = required_param(spec, "length")? as usize;
            let field = match required_param(spec, "field")? as i64 {
                0 => WindowField::High,
                1 => WindowField::Low,
                _ => WindowField::Close,
            };
            Ok(Box::new(RollingWindow::new(length, field)))
        }
        other => Err(CoreError::UnknownIndicator { kind: other.to_string() }),
    }
}

pub(crate) fn tf_duration_ms(play: &Play) -> HashMap<TfRole, i64> {
    let mut out = HashMap::new();
    out.insert(play.timeframes.low_tf.role, play.timeframes.low_tf.duration_ms);
    if let Some(spec) = play.timeframes.med_tf {
        out.insert(spec.role, spec.duration_ms);
    }
    if let Some(spec) = play.timeframes.high_tf {
        out.insert(spec.role, spec.duration_ms);
    }
    out
}

/// Builds the Feed Store, per-TF Incremental State, and Feature Registry a
/// Play needs to drive an `Engine`, from its `feature_specs` plus raw closed
/// bars for every TF the Play declares.
pub fn prepare_run(play: &Play, bars_by_tf: HashMap<TfRole, Vec<Bar>>) -> CoreResult<(MultiTfFeedStore, HashMap<TfRole, TfIncrementalState>, FeatureRegistry)> {
    for spec in &play.feature_specs {
        DataFrameBuilder::validate(spec)?;
    }

    let mut specs_by_tf: HashMap<TfRole, Vec<&FeatureSpec>> = HashMap::new();
    for spec in &play.feature_specs {
        specs_by_tf.entry(spec.tf).or_default().push(spec);
    }

    let durations = tf_duration_ms(play);
    let exec_duration = durations.get(&play.timeframes.exec).copied().unwrap_or(1).max(1);

    let mut registry = FeatureRegistry::new();
    let mut stores = HashMap::new();
    let mut incremental = HashMap::new();
    let mut sim_start_idx = 0usize;

    for (&tf_role, bars) in &bars_by_tf {
        let tf_specs = specs_by_tf.get(&tf_role).cloned().unwrap_or_default();
        let warmup = tf_specs.iter().map(|spec| DataFrameBuilder::warmup_bars(&spec.kind, &spec.params)).max().unwrap_or(0);

        let mut store = FeedStore::new(tf_role, bars.clone(), warmup);

        let mut detector_specs = Vec::new();
        for spec in &tf_specs {
            if BATCH_KINDS.contains(&spec.kind.as_str()) {
                let values = DataFrameBuilder::compute(spec, bars)?.expect("batch kind always returns Some");
                store.set_indicator_output(spec.id.clone(), values);
                registry.register_indicator(spec.id.clone(), tf_role, spec.id.clone());
            } else {
                detector_specs.push(DetectorSpec { key: spec.id.clone(), depends_on: spec.depends_on.clone().into_iter().collect() });
            }
        }

        if !detector_specs.is_empty() {
            let spec_lookup: HashMap<&str, &FeatureSpec> = tf_specs.iter().map(|spec| (spec.id.as_str(), *spec)).collect();
            let state = TfIncrementalState::build(&detector_specs, |key| {
                build_detector(spec_lookup[key]).unwrap_or_else(|err| panic!("detector construction failed for '{key}': {err}"))
            })
            .map_err(|message| CoreError::InvalidPlay { message, fix_hint: "fix the detector dependency graph in feature_specs".to_string() })?;

            for spec in &tf_specs {
                if BATCH_KINDS.contains(&spec.kind.as_str()) {
                    continue;
                }
                for &field in structural_output_fields(&spec.kind)? {
                    registry.register_structure(format!("{}.{field}", spec.id), tf_role, spec.id.clone(), field);
                }
            }
            incremental.insert(tf_role, state);
        }

        if tf_role != play.timeframes.exec {
            let tf_dur = durations.get(&tf_role).copied().unwrap_or(exec_duration).max(1);
            let ratio = (tf_dur / exec_duration).max(1) as usize;
            sim_start_idx = sim_start_idx.max(warmup * ratio);
        } else {
            sim_start_idx = sim_start_idx.max(warmup);
        }

        stores.insert(tf_role, store);
    }

    let feed = MultiTfFeedStore::new(stores, play.timeframes.exec, sim_start_idx);
    Ok((feed, incremental, registry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::play::{
        AccountConfig, FeeModel, PositionMode, PositionPolicy, RiskModel, SignalRules, SizingRule, StopRule, TfSpec,
        TimeframeConfig,
    };
    use std::collections::BTreeMap;

    fn bar(close: f64) -> Bar {
        Bar { ts_open: 0, ts_close: 1, open: close, high: close + 1.0, low: close - 1.0, close, volume: 10.0 }
    }

    fn base_play(feature_specs: Vec<FeatureSpec>) -> Play {
        Play {
            id: "p".to_string(),
            version: "1.0.0".to_string(),
            account: AccountConfig {
                starting_equity_usdt: 1000.0,
                max_leverage: 10.0,
                fee_model: FeeModel { taker_bps: 5.5, maker_bps: 2.0 },
                slippage_bps: 2.0,
                min_trade_notional_usdt: 5.0,
                maintenance_margin_rate: None,
                funding_rate_per_8h: 0.0001,
            },
            symbol_universe: vec!["BTCUSDT".to_string()],
            timeframes: TimeframeConfig {
                low_tf: TfSpec { role: TfRole::Low, duration_ms: 3_600_000 },
                med_tf: None,
                high_tf: None,
                exec: TfRole::Low,
            },
            feature_specs,
            signal_rules: SignalRules { entry_long: None, entry_short: None, exit_long: None, exit_short: None },
            risk_model: RiskModel {
                stop_loss: StopRule::FixedPct { pct: 0.01 },
                take_profit: StopRule::FixedPct { pct: 0.02 },
                sizing: SizingRule::SizePct(0.1),
                atr_feature_id: None,
            },
            position_policy: PositionPolicy { mode: PositionMode::LongOnly, allow_flip: false },
        }
    }

    fn params(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn batch_indicator_registers_as_indicator_resolution() {
        let spec = FeatureSpec {
            id: "ema_9".to_string(),
            kind: "ema".to_string(),
            tf: TfRole::Low,
            params: params(&[("length", 9.0)]),
            depends_on: BTreeMap::new(),
        };
        let play = base_play(vec![spec]);
        let bars: Vec<Bar> = (0..20).map(|i| bar(100.0 + i as f64)).collect();
        let mut by_tf = HashMap::new();
        by_tf.insert(TfRole::Low, bars);
        let (feed, incremental, registry) = prepare_run(&play, by_tf).unwrap();
        assert!(incremental.get(&TfRole::Low).is_none());
        assert!(feed.exec().indicator_value("ema_9", 19).is_some());
        assert!(registry.indicator_value(&feed, "ema_9", 19).is_some());
    }

    #[test]
    fn swing_and_dependent_trend_build_one_incremental_state() {
        let swing = FeatureSpec {
            id: "sw".to_string(),
            kind: "swing".to_string(),
            tf: TfRole::Low,
            params: params(&[("left", 1.0), ("right", 1.0)]),
            depends_on: BTreeMap::new(),
        };
        let trend = FeatureSpec {
            id: "tr".to_string(),
            kind: "trend".to_string(),
            tf: TfRole::Low,
            params: BTreeMap::new(),
            depends_on: BTreeMap::from([("swing".to_string(), "sw".to_string())]),
        };
        let play = base_play(vec![swing, trend]);
        let bars: Vec<Bar> = (0..10).map(|i| bar(100.0 + i as f64)).collect();
        let mut by_tf = HashMap::new();
        by_tf.insert(TfRole::Low, bars);
        let (_feed, incremental, _registry) = prepare_run(&play, by_tf).unwrap();
        let state = incremental.get(&TfRole::Low).expect("swing/trend TF must build incremental state");
        state.update(&bar(111.0));
        assert!(state.get("tr", "direction").is_some());
    }

    #[test]
    fn unknown_kind_is_rejected_before_any_compute() {
        let spec = FeatureSpec {
            id: "x".to_string(),
            kind: "made_up".to_string(),
            tf: TfRole::Low,
            params: BTreeMap::new(),
            depends_on: BTreeMap::new(),
        };
        let play = base_play(vec![spec]);
        let mut by_tf = HashMap::new();
        by_tf.insert(TfRole::Low, vec![bar(100.0)]);
        assert!(prepare_run(&play, by_tf).is_err());
    }
}
