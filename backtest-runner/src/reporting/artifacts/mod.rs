//! Artifact manager for persisting run outputs under the
//! `{category}/{play_id}/{symbol}/{short_hash}/` layout.

mod diagnostics;
mod equity;
mod manifest;
mod preflight;
mod trades;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::result::BacktestResult;

pub use manifest::RunManifest;

/// Paths of every artifact written for one run.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub run_dir: PathBuf,
    pub manifest: PathBuf,
    pub result_json: PathBuf,
    pub preflight_json: PathBuf,
    pub equity_csv: PathBuf,
    pub trades_csv: PathBuf,
    pub trades_json: PathBuf,
    pub events_jsonl: PathBuf,
    pub report_markdown: Option<PathBuf>,
}

/// Writes the full artifact set for a run under a category directory.
#[derive(Debug, Clone)]
pub struct ArtifactManager {
    category_dir: PathBuf,
}

impl ArtifactManager {
    pub fn new(category_dir: impl AsRef<Path>) -> Result<Self> {
        let category_dir = category_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&category_dir).context("failed to create artifact category directory")?;
        Ok(Self { category_dir })
    }

    pub fn save_run(&self, symbol: &str, result: &BacktestResult) -> Result<ArtifactPaths> {
        let run_dir = self
            .category_dir
            .join(&result.metadata.play_id)
            .join(symbol)
            .join(result.run.run_id.short_hex());
        std::fs::create_dir_all(&run_dir).context("failed to create run artifact directory")?;

        let manifest_path = run_dir.join("run_manifest.json");
        manifest::write_manifest(&manifest_path, result)?;

        let result_json = run_dir.join("result.json");
        let json = serde_json::to_string_pretty(result).context("failed to serialize result.json")?;
        std::fs::write(&result_json, json).with_context(|| format!("failed to write {}", result_json.display()))?;

        let preflight_json = run_dir.join("preflight_report.json");
        preflight::write_preflight_json(&preflight_json, &result.preflight)?;

        let equity_csv = run_dir.join("equity.csv");
        equity::write_equity_csv(&equity_csv, &result.run.equity_curve)?;

        let trades_csv = run_dir.join("trades.csv");
        let trades_json = run_dir.join("trades.json");
        trades::write_trades_csv(&trades_csv, &result.run.trades)?;
        trades::write_trades_json(&trades_json, &result.run.trades)?;

        let events_jsonl = run_dir.join("events.jsonl");
        diagnostics::write_diagnostics_jsonl(&events_jsonl, result)?;

        Ok(ArtifactPaths {
            run_dir,
            manifest: manifest_path,
            result_json,
            preflight_json,
            equity_csv,
            trades_csv,
            trades_json,
            events_jsonl,
            report_markdown: None,
        })
    }
}
