//! Orchestration-level run configuration.
//!
//! This is deliberately thin: the Play itself is loaded and schema-validated
//! by an external collaborator (§6) and handed to this crate as an
//! already-parsed `backtest_core::play::Play`. `RunConfig` only carries what
//! an orchestration layer needs to pick *which* run to drive and *where* to
//! write it — loadable from a plain TOML file, no env-var reads.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Half-open UTC-ms window a run is driven over.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Window {
    pub start_ts_ms: i64,
    pub end_ts_ms: i64,
}

/// Selects a Play + data window + seed + output location for one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    /// Identifies the Play this run drives; the Play struct itself is
    /// supplied separately by the caller, not loaded from this config.
    pub play_id: String,
    pub symbol: String,
    pub window: Window,
    pub seed: u64,
    /// Opaque identifier for whichever historical-data source the caller's
    /// data loader resolved (out of scope here; just carried for the
    /// manifest).
    pub data_source_id: String,
    pub output_dir: PathBuf,
}

impl RunConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deterministic identifier for this orchestration config, independent
    /// of the `backtest_core::fingerprint` hashes (which additionally
    /// depend on the Play's content and the dataset). Used to name the
    /// config-selection layer's own bookkeeping, not the run artifact
    /// directory (see `reporting::artifacts` for that, which is keyed off
    /// `backtest_core::fingerprint::run_id`).
    pub fn selection_id(&self) -> String {
        let json = serde_json::to_string(self).expect("RunConfig must serialize");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}
