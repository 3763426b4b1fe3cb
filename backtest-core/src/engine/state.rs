//! Engine-level configuration and the run's accumulated output.

use crate::domain::{FullHash, Ledger, RunId, TradeRecord};
use crate::play::Play;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub play: Play,
    pub seed: u64,
}

/// A structured, post-hoc diagnostic. Never logged from the hot loop —
/// accumulated here and surfaced on `RunResult` once the run completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineDiagnostic {
    DataQualityWarning { bar_index: usize, ts: i64, message: String },
    PolicyReject { bar_index: usize, ts: i64, reason: String },
    GapReport { ts: i64, gap_bars: i64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub ts: i64,
    pub bar_index: usize,
    pub equity: f64,
    pub cash_balance: f64,
    pub unrealized_pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: RunId,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
    pub final_ledger: Ledger,
    pub diagnostics: Vec<EngineDiagnostic>,
    /// Content hash of `trades` + `equity_curve`, filled in once the run
    /// completes. Two runs with identical inputs must produce the same value.
    pub full_hash: Option<FullHash>,
}

impl RunResult {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            trades: Vec::new(),
            equity_curve: Vec::new(),
            final_ledger: Ledger::new(0.0),
            diagnostics: Vec::new(),
            full_hash: None,
        }
    }

    /// Computes and stores `full_hash` from the current `trades` and
    /// `equity_curve`. Called once, after the loop has finished.
    pub fn seal(&mut self) {
        self.full_hash = Some(crate::fingerprint::result_hash(&self.trades, &self.equity_curve));
    }
}
