//! Preflight export — the §6 `preflight_report.json` artifact: the data
//! coverage check performed before the run, serialized as-is.

use anyhow::{Context, Result};
use std::path::Path;

use backtest_core::data::PreflightReport;

pub fn write_preflight_json(path: &Path, preflight: &PreflightReport) -> Result<()> {
    let json = serde_json::to_string_pretty(preflight).context("failed to serialize preflight report")?;
    std::fs::write(path, json).with_context(|| format!("failed to write preflight report to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_gaps_and_window_bounds() {
        let report = PreflightReport { required_start_ts: 100, required_end_ts: 200, gaps: vec![(120, 140)] };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preflight_report.json");
        write_preflight_json(&path, &report).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: PreflightReport = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, report);
    }
}
