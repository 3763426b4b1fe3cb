//! Summary statistics for reports.

use crate::result::BacktestResult;

#[derive(Debug, Clone)]
pub struct SummaryStats {
    pub sharpe: f64,
    pub sortino: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub num_trades: usize,
}

impl SummaryStats {
    pub fn from_result(result: &BacktestResult) -> Self {
        let m = &result.metrics;
        Self {
            sharpe: m.sharpe,
            sortino: m.sortino,
            total_return: m.total_return,
            max_drawdown: m.max_drawdown,
            win_rate: m.win_rate,
            profit_factor: m.profit_factor,
            num_trades: m.trade_count,
        }
    }
}
