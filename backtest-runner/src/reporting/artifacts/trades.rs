//! Trade tape export (CSV/JSON), columns per the §6 artifact layout.

use anyhow::{Context, Result};
use backtest_core::domain::TradeRecord;
use std::path::Path;

const HEADER: [&str; 17] = [
    "side",
    "size_usdt",
    "entry_ts",
    "exit_ts",
    "entry_price",
    "exit_price",
    "realized_pnl_usdt",
    "fees_paid_usdt",
    "funding_paid_usdt",
    "exit_reason",
    "exit_price_source",
    "stop_loss",
    "take_profit",
    "mae",
    "mfe",
    "entry_bar_index",
    "exit_bar_index",
];

pub fn write_trades_csv(path: &Path, trades: &[TradeRecord]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create trades CSV {}", path.display()))?;

    wtr.write_record(HEADER)?;
    for t in trades {
        wtr.write_record([
            format!("{:?}", t.side),
            format!("{:.8}", t.size_usdt),
            t.entry_ts.to_string(),
            t.exit_ts.to_string(),
            format!("{:.8}", t.entry_price),
            format!("{:.8}", t.exit_price),
            format!("{:.8}", t.realized_pnl_usdt),
            format!("{:.8}", t.fees_paid_usdt),
            format!("{:.8}", t.funding_paid_usdt),
            format!("{:?}", t.exit_reason),
            format!("{:?}", t.exit_price_source),
            format!("{:.8}", t.stop_loss),
            format!("{:.8}", t.take_profit),
            format!("{:.8}", t.mae),
            format!("{:.8}", t.mfe),
            t.entry_bar_index.to_string(),
            t.exit_bar_index.to_string(),
        ])?;
    }
    wtr.flush().context("failed to flush trades CSV writer")?;
    Ok(())
}

pub fn write_trades_json(path: &Path, trades: &[TradeRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(trades).context("failed to serialize trades")?;
    std::fs::write(path, json).with_context(|| format!("failed to write trades JSON {}", path.display()))?;
    Ok(())
}
