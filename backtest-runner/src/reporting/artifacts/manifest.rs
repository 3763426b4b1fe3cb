//! `run_manifest.json` export — identity, versions, and seeds per §6.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::result::BacktestResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub short_hash: String,
    pub full_hash: Option<String>,
    pub play_id: String,
    pub seed: u64,
    pub core_version: &'static str,
    pub runner_version: &'static str,
    pub generated_at: DateTime<Utc>,
    pub duration_secs: f64,
}

pub fn write_manifest(path: &Path, result: &BacktestResult) -> Result<()> {
    let manifest = RunManifest {
        run_id: result.run.run_id.as_hex(),
        short_hash: result.run.run_id.short_hex(),
        full_hash: result.run.full_hash.map(|h| h.as_hex()),
        play_id: result.metadata.play_id.clone(),
        seed: result.metadata.seed,
        core_version: backtest_core::VERSION,
        runner_version: env!("CARGO_PKG_VERSION"),
        generated_at: result.metadata.generated_at,
        duration_secs: result.metadata.duration_secs,
    };

    let json = serde_json::to_string_pretty(&manifest).context("failed to serialize run manifest")?;
    std::fs::write(path, json).with_context(|| format!("failed to write manifest to {}", path.display()))?;
    Ok(())
}
