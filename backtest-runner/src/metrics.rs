//! Performance metrics — pure functions that compute aggregate run
//! statistics from an `EquityPoint` curve and a `TradeRecord` list. No
//! dependency on the runner's I/O or the core's engine loop.
//!
//! Annualization uses elapsed wall-clock time (`ts` deltas in the equity
//! curve), not a 252-trading-day calendar basis — a USDT perpetual trades
//! continuously, so there is no trading-day concept to annualize against.

use backtest_core::domain::TradeRecord;
use backtest_core::engine::EquityPoint;
use serde::{Deserialize, Serialize};

const MS_PER_YEAR: f64 = 365.25 * 24.0 * 60.0 * 60.0 * 1000.0;

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub cagr: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub trade_count: usize,
    pub turnover_usdt: f64,
    pub total_fees_usdt: f64,
    pub total_funding_usdt: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub avg_losing_streak: f64,
}

impl PerformanceMetrics {
    pub fn compute(equity_curve: &[EquityPoint], trades: &[TradeRecord], initial_capital: f64) -> Self {
        Self {
            total_return: total_return(equity_curve, initial_capital),
            cagr: cagr(equity_curve, initial_capital),
            sharpe: sharpe_ratio(equity_curve),
            sortino: sortino_ratio(equity_curve),
            calmar: calmar_ratio(equity_curve, initial_capital),
            max_drawdown: max_drawdown(equity_curve),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            trade_count: trades.len(),
            turnover_usdt: turnover(trades),
            total_fees_usdt: trades.iter().map(|t| t.fees_paid_usdt).sum(),
            total_funding_usdt: trades.iter().map(|t| t.funding_paid_usdt).sum(),
            max_consecutive_wins: max_consecutive(trades, true),
            max_consecutive_losses: max_consecutive(trades, false),
            avg_losing_streak: avg_losing_streak(trades),
        }
    }
}

fn elapsed_years(equity_curve: &[EquityPoint]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(first), Some(last)) if last.ts > first.ts => (last.ts - first.ts) as f64 / MS_PER_YEAR,
        _ => 0.0,
    }
}

fn total_return(equity_curve: &[EquityPoint], initial_capital: f64) -> f64 {
    if initial_capital == 0.0 {
        return 0.0;
    }
    match equity_curve.last() {
        Some(last) => (last.equity - initial_capital) / initial_capital,
        None => 0.0,
    }
}

fn cagr(equity_curve: &[EquityPoint], initial_capital: f64) -> f64 {
    let years = elapsed_years(equity_curve);
    if years <= 0.0 || initial_capital <= 0.0 {
        return 0.0;
    }
    let final_equity = equity_curve.last().map(|p| p.equity).unwrap_or(initial_capital);
    if final_equity <= 0.0 {
        return -1.0;
    }
    (final_equity / initial_capital).powf(1.0 / years) - 1.0
}

/// Per-bar returns over the equity curve. Not resampled to any fixed
/// cadence — the exec-TF bar interval is whatever the Play declared.
fn bar_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .filter_map(|w| if w[0].equity.abs() > f64::EPSILON { Some((w[1].equity - w[0].equity) / w[0].equity) } else { None })
        .collect()
}

fn bars_per_year(equity_curve: &[EquityPoint]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }
    let span_ms = (equity_curve.last().unwrap().ts - equity_curve.first().unwrap().ts).max(1) as f64;
    let bar_ms = span_ms / (equity_curve.len() - 1) as f64;
    if bar_ms <= 0.0 {
        0.0
    } else {
        MS_PER_YEAR / bar_ms
    }
}

fn sharpe_ratio(equity_curve: &[EquityPoint]) -> f64 {
    let returns = bar_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(&returns);
    let sd = std_dev(&returns, mean);
    if sd.abs() < f64::EPSILON {
        return 0.0;
    }
    mean / sd * bars_per_year(equity_curve).sqrt()
}

fn sortino_ratio(equity_curve: &[EquityPoint]) -> f64 {
    let returns = bar_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(&returns);
    let downside: Vec<f64> = returns.iter().filter(|&&r| r < 0.0).copied().collect();
    if downside.is_empty() {
        return 0.0;
    }
    let downside_sd = std_dev(&downside, 0.0);
    if downside_sd.abs() < f64::EPSILON {
        return 0.0;
    }
    mean / downside_sd * bars_per_year(equity_curve).sqrt()
}

fn calmar_ratio(equity_curve: &[EquityPoint], initial_capital: f64) -> f64 {
    let mdd = max_drawdown(equity_curve);
    if mdd.abs() < f64::EPSILON {
        return 0.0;
    }
    cagr(equity_curve, initial_capital) / mdd
}

fn max_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0;
    for point in equity_curve {
        peak = peak.max(point.equity);
        if peak > 0.0 {
            let dd = (peak - point.equity) / peak;
            worst = worst.max(dd);
        }
    }
    worst
}

fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

fn profit_factor(trades: &[TradeRecord]) -> f64 {
    let gross_profit: f64 = trades.iter().filter(|t| t.realized_pnl_usdt > 0.0).map(|t| t.realized_pnl_usdt).sum();
    let gross_loss: f64 = trades.iter().filter(|t| t.realized_pnl_usdt < 0.0).map(|t| -t.realized_pnl_usdt).sum();
    if gross_loss.abs() < f64::EPSILON {
        if gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    } else {
        gross_profit / gross_loss
    }
}

fn turnover(trades: &[TradeRecord]) -> f64 {
    trades.iter().map(|t| t.size_usdt * 2.0).sum()
}

fn max_consecutive(trades: &[TradeRecord], winners: bool) -> usize {
    let mut best = 0usize;
    let mut current = 0usize;
    for t in trades {
        if t.is_winner() == winners {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

fn avg_losing_streak(trades: &[TradeRecord]) -> f64 {
    let mut streaks = Vec::new();
    let mut current = 0usize;
    for t in trades {
        if !t.is_winner() {
            current += 1;
        } else if current > 0 {
            streaks.push(current);
            current = 0;
        }
    }
    if current > 0 {
        streaks.push(current);
    }
    if streaks.is_empty() {
        0.0
    } else {
        streaks.iter().sum::<usize>() as f64 / streaks.len() as f64
    }
}

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
