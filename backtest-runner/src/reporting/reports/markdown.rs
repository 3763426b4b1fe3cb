//! Markdown report generator.

use super::SummaryStats;
use crate::result::BacktestResult;

pub struct MarkdownReportGenerator;

impl MarkdownReportGenerator {
    pub fn generate(&self, result: &BacktestResult) -> String {
        let summary = SummaryStats::from_result(result);
        let mut report = format!(
            "# Backtest Run Report\n\n\
Run ID: `{}`\n\
Play: `{}` (seed {})\n\n\
## Summary\n\
- Sharpe: {:.3}\n\
- Sortino: {:.3}\n\
- Total Return: {:+.2}%\n\
- Max Drawdown: {:+.2}%\n\
- Win Rate: {:.1}%\n\
- Profit Factor: {:.2}\n\
- Trades: {}\n",
            result.run.run_id.short_hex(),
            result.metadata.play_id,
            result.metadata.seed,
            summary.sharpe,
            summary.sortino,
            summary.total_return * 100.0,
            summary.max_drawdown * 100.0,
            summary.win_rate * 100.0,
            summary.profit_factor,
            summary.num_trades,
        );

        if !result.run.trades.is_empty() {
            report.push_str("\n## Trade Tape\n\n");

            let mut sorted_trades: Vec<_> = result.run.trades.iter().collect();
            sorted_trades
                .sort_by(|a, b| b.realized_pnl_usdt.partial_cmp(&a.realized_pnl_usdt).unwrap_or(std::cmp::Ordering::Equal));

            report.push_str("### Top Winners\n");
            report.push_str("| Side | Entry | Exit | PnL | Exit Reason |\n");
            report.push_str("|------|-------|------|-----|-------------|\n");
            for trade in sorted_trades.iter().take(5).filter(|t| t.realized_pnl_usdt > 0.0) {
                report.push_str(&format!(
                    "| {:?} | {} | {} | ${:+.2} | {:?} |\n",
                    trade.side, trade.entry_ts, trade.exit_ts, trade.realized_pnl_usdt, trade.exit_reason,
                ));
            }

            report.push_str("\n### Top Losers\n");
            report.push_str("| Side | Entry | Exit | PnL | Exit Reason |\n");
            report.push_str("|------|-------|------|-----|-------------|\n");
            for trade in sorted_trades.iter().rev().take(5).filter(|t| t.realized_pnl_usdt <= 0.0) {
                report.push_str(&format!(
                    "| {:?} | {} | {} | ${:+.2} | {:?} |\n",
                    trade.side, trade.entry_ts, trade.exit_ts, trade.realized_pnl_usdt, trade.exit_reason,
                ));
            }
        }

        if !result.run.diagnostics.is_empty() {
            report.push_str(&format!("\n## Diagnostics\n\n- Events recorded: {}\n", result.run.diagnostics.len()));
        }

        report.push_str("\n## Notes\n\n- Equity curve and trade tape are exported alongside this report.\n");

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backtest_core::data::PreflightReport;
    use backtest_core::domain::RunId;
    use backtest_core::engine::RunResult;
    use chrono::Utc;

    fn empty_preflight() -> PreflightReport {
        PreflightReport { required_start_ts: 0, required_end_ts: 0, gaps: Vec::new() }
    }

    #[test]
    fn report_contains_summary_section() {
        let run = RunResult::new(RunId::from_bytes(b"seed"));
        let result = BacktestResult::new(run, empty_preflight(), "ema-cross".to_string(), 7, 0.01, Utc::now());
        let report = MarkdownReportGenerator.generate(&result);
        assert!(report.contains("# Backtest Run Report"));
        assert!(report.contains("## Summary"));
        assert!(report.contains("ema-cross"));
    }
}
