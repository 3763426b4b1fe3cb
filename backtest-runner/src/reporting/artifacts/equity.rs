//! Equity curve export (CSV).

use anyhow::{Context, Result};
use backtest_core::engine::EquityPoint;
use std::path::Path;

pub fn write_equity_csv(path: &Path, equity: &[EquityPoint]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create equity CSV {}", path.display()))?;

    wtr.write_record(["ts_ms", "bar_index", "equity", "cash_balance", "unrealized_pnl"])?;
    for point in equity {
        wtr.write_record([
            point.ts.to_string(),
            point.bar_index.to_string(),
            format!("{:.8}", point.equity),
            format!("{:.8}", point.cash_balance),
            format!("{:.8}", point.unrealized_pnl),
        ])?;
    }
    wtr.flush().context("failed to flush equity CSV writer")?;
    Ok(())
}
