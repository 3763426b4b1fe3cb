//! Run orchestration and artifact output for the backtest execution core.
//!
//! ## Components
//!
//! - `config::RunConfig`: selects a Play + data window + seed + output location
//! - `runner::run`: composes a Play's declared features onto raw bars and drives the Engine
//! - `result::BacktestResult`: the core's `RunResult` plus derived `metrics::PerformanceMetrics`
//! - `reporting`: writes `result.json`, `run_manifest.json`, trade/equity CSVs, and a markdown report

pub mod config;
pub mod metrics;
pub mod reporting;
pub mod result;
pub mod runner;

pub use config::RunConfig;
pub use metrics::PerformanceMetrics;
pub use result::BacktestResult;
