//! Diagnostics export — the §6 `events.jsonl` artifact: one
//! `EngineDiagnostic` per line, in emission order.

use anyhow::{Context, Result};
use std::path::Path;

use crate::result::BacktestResult;

pub fn write_diagnostics_jsonl(path: &Path, result: &BacktestResult) -> Result<()> {
    let mut lines = String::new();
    for diagnostic in &result.run.diagnostics {
        let line = serde_json::to_string(diagnostic).context("failed to serialize diagnostic")?;
        lines.push_str(&line);
        lines.push('\n');
    }
    std::fs::write(path, lines).with_context(|| format!("failed to write diagnostics to {}", path.display()))?;
    Ok(())
}
