//! Backtest Core — the deterministic execution core of the research
//! platform: multi-timeframe data model, incrementally-maintained indicators
//! and structure detectors, a three-valued rule DSL evaluated against a
//! read-only snapshot, and a Bybit-aligned simulated exchange.
//!
//! - Domain types (bars, ids, positions, trades, the ledger)
//! - Data prep: per-TF Feed Store, batch indicator arrays, MTF forward-fill
//! - Incremental State: stateful O(1) detectors with a dependency DAG
//! - Rule DSL: three-valued condition trees over the Snapshot View
//! - Risk Policy: intent -> sized signal, or a recoverable reject
//! - Engine: the Simulated Exchange and the bar-by-bar loop driving it

/// Crate version, surfaced for run manifests that record which core built a result.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod compose;
pub mod data;
pub mod detectors;
pub mod domain;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod play;
pub mod risk;
pub mod rng;
pub mod rules;
pub mod snapshot;
