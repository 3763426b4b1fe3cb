//! Backtest result and aggregate performance metrics, assembled around
//! `backtest_core::engine::RunResult` — the §6 `result.json` artifact.

use crate::metrics::PerformanceMetrics;
use backtest_core::data::PreflightReport;
use backtest_core::engine::RunResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bookkeeping the core itself never tracks (wall-clock duration, when the
/// run was produced, which Play/seed selected it) — orchestration-layer
/// metadata only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub play_id: String,
    pub seed: u64,
    pub generated_at: DateTime<Utc>,
    pub duration_secs: f64,
}

/// Complete result of one backtest run: the core's trade/equity/diagnostic
/// output, aggregate performance metrics derived from it, and orchestration
/// metadata. This is what `reporting::export_run_with_report` serializes as
/// `result.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub run: RunResult,
    pub metrics: PerformanceMetrics,
    pub preflight: PreflightReport,
    pub metadata: ResultMetadata,
}

impl BacktestResult {
    pub fn new(
        run: RunResult,
        preflight: PreflightReport,
        play_id: String,
        seed: u64,
        duration_secs: f64,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let initial_capital = run.equity_curve.first().map(|p| p.equity).unwrap_or(0.0);
        let metrics = PerformanceMetrics::compute(&run.equity_curve, &run.trades, initial_capital);
        Self { run, metrics, preflight, metadata: ResultMetadata { play_id, seed, generated_at, duration_secs } }
    }
}
