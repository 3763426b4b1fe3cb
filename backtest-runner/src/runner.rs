//! Orchestration entry point: wires a Play + per-TF bars through
//! `backtest_core::compose::prepare_run` into an `Engine`, runs it to
//! completion, and wraps the output as a `BacktestResult`.

use std::collections::HashMap;
use std::time::Instant;

use anyhow::Context;
use backtest_core::compose::prepare_run;
use backtest_core::data::builder::DataFrameBuilder;
use backtest_core::domain::{Bar, TfRole};
use backtest_core::engine::{Engine, EngineConfig};
use backtest_core::fingerprint::{dataset_hash, play_hash, run_id};
use backtest_core::play::Play;
use chrono::Utc;

use crate::result::BacktestResult;

/// Runs one deterministic backtest: builds the Feed Store / Incremental
/// State / Feature Registry from `play`'s declared features, then drives the
/// Engine over `bars_by_tf` from `sim_start_idx` to the end of data.
///
/// The coverage preflight treats the supplied exec-TF bars' own span as the
/// requested window, since this entry point receives already-fetched bars
/// rather than a window an ingestion collaborator still needs to resolve.
pub fn run(play: Play, bars_by_tf: HashMap<TfRole, Vec<Bar>>, seed: u64) -> anyhow::Result<BacktestResult> {
    let started = Instant::now();

    let exec_bars = bars_by_tf
        .get(&play.timeframes.exec)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("no bars supplied for exec timeframe {:?}", play.timeframes.exec))?;
    let window_start = exec_bars.first().map(|b| b.ts_open).unwrap_or(0);
    let window_end = exec_bars.last().map(|b| b.ts_close).unwrap_or(0);
    let preflight = DataFrameBuilder::preflight(&play, &exec_bars, window_start, window_end);

    let (feed, incremental, registry) =
        prepare_run(&play, bars_by_tf).context("failed to compose Play features into engine inputs")?;

    let play_hash_id = play_hash(&play);
    let dataset_id = dataset_hash(&feed.exec().bars);
    let id = run_id(&play_hash_id, &dataset_id, seed);
    let play_id = play.id.clone();

    let config = EngineConfig { play, seed };
    let engine = Engine::new(&config, &feed, incremental, registry);
    let run_result = engine.run(id).context("engine loop aborted on an invariant violation")?;

    let duration_secs = started.elapsed().as_secs_f64();
    Ok(BacktestResult::new(run_result, preflight, play_id, seed, duration_secs, Utc::now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use backtest_core::play::{
        AccountConfig, FeeModel, FeatureSpec, PositionMode, PositionPolicy, RiskModel, SignalRules, SizingRule,
        StopRule, TfSpec, TimeframeConfig,
    };
    use backtest_core::rules::{Node, Op, Value};
    use std::collections::BTreeMap;

    fn bar(i: i64, close: f64) -> Bar {
        Bar { ts_open: i * 1000, ts_close: (i + 1) * 1000, open: close, high: close + 1.0, low: close - 1.0, close, volume: 10.0 }
    }

    fn ema_feature(id: &str, length: f64) -> FeatureSpec {
        let mut params = BTreeMap::new();
        params.insert("length".to_string(), length);
        FeatureSpec { id: id.to_string(), kind: "ema".to_string(), tf: TfRole::Low, params, depends_on: BTreeMap::new() }
    }

    fn ema_cross_play() -> Play {
        Play {
            id: "ema-cross".to_string(),
            version: "1.0.0".to_string(),
            account: AccountConfig {
                starting_equity_usdt: 1000.0,
                max_leverage: 10.0,
                fee_model: FeeModel { taker_bps: 5.5, maker_bps: 2.0 },
                slippage_bps: 2.0,
                min_trade_notional_usdt: 5.0,
                maintenance_margin_rate: None,
                funding_rate_per_8h: 0.0,
            },
            symbol_universe: vec!["BTCUSDT".to_string()],
            timeframes: TimeframeConfig {
                low_tf: TfSpec { role: TfRole::Low, duration_ms: 1000 },
                med_tf: None,
                high_tf: None,
                exec: TfRole::Low,
            },
            feature_specs: vec![ema_feature("ema_fast", 2.0), ema_feature("ema_slow", 4.0)],
            signal_rules: SignalRules {
                entry_long: Some(Node::Leaf {
                    lhs: Value::feature("ema_fast"),
                    op: Op::CrossAbove,
                    rhs: Value::feature("ema_slow"),
                    tolerance: None,
                }),
                entry_short: None,
                exit_long: Some(Node::Leaf {
                    lhs: Value::feature("ema_fast"),
                    op: Op::CrossBelow,
                    rhs: Value::feature("ema_slow"),
                    tolerance: None,
                }),
                exit_short: None,
            },
            risk_model: RiskModel {
                stop_loss: StopRule::FixedPct { pct: 0.1 },
                take_profit: StopRule::FixedPct { pct: 0.1 },
                sizing: SizingRule::SizePct(0.1),
                atr_feature_id: None,
            },
            position_policy: PositionPolicy { mode: PositionMode::LongShort, allow_flip: false },
        }
    }

    #[test]
    fn end_to_end_run_produces_sealed_result() {
        let play = ema_cross_play();
        let bars: Vec<Bar> = (0..40).map(|i| bar(i, 100.0 + (i as f64 * 0.3).sin() * 5.0 + i as f64 * 0.1)).collect();
        let mut by_tf = HashMap::new();
        by_tf.insert(TfRole::Low, bars);

        let result = run(play, by_tf, 7).expect("run should succeed");
        assert!(result.run.full_hash.is_some());
        assert!(!result.run.equity_curve.is_empty());
    }

    #[test]
    fn same_inputs_reproduce_identical_full_hash() {
        let play = ema_cross_play();
        let bars: Vec<Bar> = (0..40).map(|i| bar(i, 100.0 + (i as f64 * 0.3).sin() * 5.0 + i as f64 * 0.1)).collect();

        let mut by_tf_a = HashMap::new();
        by_tf_a.insert(TfRole::Low, bars.clone());
        let mut by_tf_b = HashMap::new();
        by_tf_b.insert(TfRole::Low, bars);

        let a = run(play.clone(), by_tf_a, 7).unwrap();
        let b = run(play, by_tf_b, 7).unwrap();
        assert_eq!(a.run.full_hash, b.run.full_hash);
    }
}
