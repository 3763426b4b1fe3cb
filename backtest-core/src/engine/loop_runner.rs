//! Drives the per-exec-bar step order: advance -> exchange.process_bar ->
//! update incremental state -> refresh higher-TF contexts if closed ->
//! build snapshot -> evaluate rules -> policy -> submit signal -> record
//! equity. Single-threaded, deterministic, no lookahead.

use super::exchange::{PendingEntry, SimulatedExchange};
use super::state::{EngineConfig, EngineDiagnostic, EquityPoint, RunResult};
use crate::data::{align::forward_fill_index, MultiTfFeedStore};
use crate::detectors::TfIncrementalState;
use crate::domain::{IdGen, Ledger, PositionSide, RunId, TfRole};
use crate::error::{CoreError, CoreResult};
use crate::play::PositionPolicy;
use crate::risk;
use crate::rules::{self, IntentAction, Node, SnapshotSource};
use crate::snapshot::{FeatureRegistry, Snapshot, StructureHistory};
use std::collections::HashMap;

pub struct Engine<'a> {
    config: &'a EngineConfig,
    feed: &'a MultiTfFeedStore,
    incremental: HashMap<TfRole, TfIncrementalState>,
    registry: FeatureRegistry,
    structure_history: StructureHistory,
    exchange: SimulatedExchange,
    ledger: Ledger,
    id_gen: IdGen,
    forward_fill: HashMap<TfRole, Vec<Option<usize>>>,
}

impl<'a> Engine<'a> {
    pub fn new(
        config: &'a EngineConfig,
        feed: &'a MultiTfFeedStore,
        incremental: HashMap<TfRole, TfIncrementalState>,
        registry: FeatureRegistry,
    ) -> Self {
        let exec_close_ts: Vec<i64> = feed.exec().bars.iter().map(|b| b.ts_close).collect();
        let mut forward_fill = HashMap::new();
        for (&role, store) in &feed.stores {
            if role != feed.exec_role {
                forward_fill.insert(role, forward_fill_index(&exec_close_ts, &store.bars));
            }
        }
        Self {
            config,
            feed,
            incremental,
            registry,
            structure_history: StructureHistory::new(256),
            exchange: SimulatedExchange::new(config.play.account),
            ledger: Ledger::new(config.play.account.starting_equity_usdt),
            id_gen: IdGen::default(),
            forward_fill,
        }
    }

    fn closed_this_bar(&self, role: TfRole, exec_index: usize) -> bool {
        if role == self.feed.exec_role {
            return true;
        }
        let Some(ff) = self.forward_fill.get(&role) else { return false };
        let Some(idx) = ff.get(exec_index).copied().flatten() else { return false };
        exec_index == 0 || ff[exec_index - 1] != Some(idx)
    }

    fn evaluate_rule(&self, node: &Node, snap: &Snapshot) -> bool {
        rules::eval(node, snap).is_true()
    }

    /// Runs the full deterministic loop over the exec TF, from `sim_start_idx`
    /// to the last bar, returning the accumulated run result. Aborts with
    /// `INVARIANT_VIOLATION` (§7) the first bar the ledger desyncs from the
    /// exchange's own position state.
    pub fn run(mut self, run_id: RunId) -> CoreResult<RunResult> {
        let mut result = RunResult::new(run_id);
        let exec_len = self.feed.exec().len();

        for idx in 0..exec_len {
            let bar = self.feed.exec().bars[idx];

            let outcome = self.exchange.process_bar(&bar, idx, &mut self.ledger, &mut self.id_gen);
            if let Some(trade) = outcome.closed_trade {
                result.trades.push(trade);
            }

            if let Err(invariant) = self.ledger.verify_invariants(self.exchange.position()) {
                return Err(CoreError::InvariantViolation { bar_index: idx, invariant });
            }

            for (&role, state) in &self.incremental {
                if role == self.feed.exec_role || self.closed_this_bar(role, idx) {
                    let role_bar = if role == self.feed.exec_role {
                        bar
                    } else {
                        let ff_idx = self.forward_fill[&role][idx].unwrap();
                        self.feed.get(role).unwrap().bars[ff_idx]
                    };
                    state.update(&role_bar);
                    for (key, field, value) in state.all_values() {
                        self.structure_history.record(&format!("{key}.{field}"), value);
                    }
                }
            }

            if idx < self.feed.exec().warmup_bars.max(self.feed.sim_start_idx) {
                self.record_equity(&mut result, &bar, idx);
                continue;
            }

            if bar.is_void() {
                result.diagnostics.push(EngineDiagnostic::DataQualityWarning {
                    bar_index: idx,
                    ts: bar.ts_close,
                    message: "void bar skipped for rule evaluation".to_string(),
                });
                self.record_equity(&mut result, &bar, idx);
                continue;
            }

            self.evaluate_and_submit(idx, &bar, &mut result);
            self.record_equity(&mut result, &bar, idx);
        }

        if let Some(last) = self.feed.exec().bars.last().copied() {
            if let Some(trade) =
                self.exchange.force_close_at_end_of_data(&last, exec_len.saturating_sub(1), &mut self.ledger, &mut self.id_gen)
            {
                result.trades.push(trade);
            }
            if let Err(invariant) = self.ledger.verify_invariants(self.exchange.position()) {
                return Err(CoreError::InvariantViolation { bar_index: exec_len.saturating_sub(1), invariant });
            }
        }

        result.final_ledger = self.ledger.clone();
        result.seal();
        Ok(result)
    }

    fn evaluate_and_submit(&mut self, idx: usize, bar: &crate::domain::Bar, result: &mut RunResult) {
        let position = self.exchange.position().cloned();
        let snap = Snapshot::new(
            &self.registry,
            self.feed,
            idx,
            &self.incremental,
            &self.structure_history,
            position.as_ref(),
            self.exec_tf_duration_ms(),
            &self.forward_fill,
        );

        let rules = &self.config.play.signal_rules;
        let has_position = self.exchange.has_open_position();
        let policy = &self.config.play.position_policy;

        if !has_position {
            if let Some(node) = &rules.entry_long {
                if self.evaluate_rule(node, &snap) {
                    self.try_entry(PositionSide::Long, bar.close, policy, idx, result);
                    return;
                }
            }
            if let Some(node) = &rules.entry_short {
                if self.evaluate_rule(node, &snap) {
                    self.try_entry(PositionSide::Short, bar.close, policy, idx, result);
                    return;
                }
            }
        } else if let Some(pos) = &position {
            let exit_node = match pos.side {
                PositionSide::Long => &rules.exit_long,
                PositionSide::Short => &rules.exit_short,
            };
            if let Some(node) = exit_node {
                if self.evaluate_rule(node, &snap) {
                    let action = match pos.side {
                        PositionSide::Long => IntentAction::ExitLong,
                        PositionSide::Short => IntentAction::ExitShort,
                    };
                    match risk::evaluate_exit(action, has_position) {
                        Ok(_) => self.exchange.queue_exit(),
                        Err(reason) => result.diagnostics.push(EngineDiagnostic::PolicyReject {
                            bar_index: idx,
                            ts: bar.ts_close,
                            reason: format!("{reason:?}"),
                        }),
                    }
                }
            }
        }
    }

    fn try_entry(&mut self, side: PositionSide, mark_price: f64, policy: &PositionPolicy, idx: usize, result: &mut RunResult) {
        let atr_value = self
            .config
            .play
            .risk_model
            .atr_feature_id
            .and_then(|id| self.registry_indicator_value(id, idx));
        match risk::evaluate_entry(
            side,
            mark_price,
            &self.config.play.risk_model,
            &self.config.play.account,
            policy,
            &self.ledger,
            self.exchange.has_open_position(),
            atr_value,
        ) {
            Ok(signal) => self.exchange.queue_entry(PendingEntry {
                side,
                size_usdt: signal.size_usdt,
                stop_loss: signal.stop_loss.unwrap_or(mark_price),
                take_profit: signal.take_profit.unwrap_or(mark_price),
            }),
            Err(reason) => result.diagnostics.push(EngineDiagnostic::PolicyReject {
                bar_index: idx,
                ts: self.feed.exec().bars[idx].ts_close,
                reason: format!("{reason:?}"),
            }),
        }
    }

    fn registry_indicator_value(&self, feature_id: &str, idx: usize) -> Option<f64> {
        self.registry.indicator_value(self.feed, feature_id, idx)
    }

    /// Resolves a declared feature id at `exec_index` through the same
    /// Snapshot View the rule evaluator reads, including the forward-fill
    /// a higher-TF indicator goes through. Exposed for tests exercising the
    /// resolution path directly rather than through a full `run()`.
    pub fn feature_value_at(&self, feature_id: &str, exec_index: usize) -> Option<f64> {
        let position = self.exchange.position().cloned();
        let snap = Snapshot::new(
            &self.registry,
            self.feed,
            exec_index,
            &self.incremental,
            &self.structure_history,
            position.as_ref(),
            self.exec_tf_duration_ms(),
            &self.forward_fill,
        );
        snap.resolve(&crate::rules::Value::feature(feature_id), 0)
    }

    fn exec_tf_duration_ms(&self) -> i64 {
        let bars = &self.feed.exec().bars;
        if bars.len() < 2 {
            return 0;
        }
        bars[1].ts_close - bars[0].ts_close
    }

    fn record_equity(&self, result: &mut RunResult, bar: &crate::domain::Bar, idx: usize) {
        result.equity_curve.push(EquityPoint {
            ts: bar.ts_close,
            bar_index: idx,
            equity: self.ledger.equity(),
            cash_balance: self.ledger.cash_balance,
            unrealized_pnl: self.ledger.unrealized_pnl,
        });
    }
}
