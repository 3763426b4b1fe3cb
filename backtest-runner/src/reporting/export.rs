//! Export orchestrator for artifacts and reports.

use anyhow::Result;
use std::path::Path;

use crate::reporting::artifacts::{ArtifactManager, ArtifactPaths};
use crate::reporting::reports::MarkdownReportGenerator;
use crate::result::BacktestResult;

pub fn export_run_with_report(
    category_dir: impl AsRef<Path>,
    symbol: &str,
    result: &BacktestResult,
    include_report: bool,
) -> Result<ArtifactPaths> {
    let manager = ArtifactManager::new(category_dir)?;
    let mut paths = manager.save_run(symbol, result)?;

    if include_report {
        let report_path = paths.run_dir.join("report.md");
        let generator = MarkdownReportGenerator;
        let report = generator.generate(result);
        std::fs::write(&report_path, report)?;
        paths.report_markdown = Some(report_path);
    }

    Ok(paths)
}
