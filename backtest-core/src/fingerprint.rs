//! Run fingerprinting — deterministic identity hashes for a Play, its input
//! dataset, the engine configuration run against it, and the resulting trade
//! sequence.
//!
//! - `PlayHash`: exact identity of a `Play` (structure + every parameter).
//! - `DatasetHash`: content identity of the OHLCV bars a run was driven by.
//! - `ConfigHash`: identity of the full `EngineConfig` (Play + seed) — the key
//!   artifact directories are named after (`short_hex()`).
//! - `RunId`: derived from `(PlayHash, DatasetHash, seed)` — addresses one run.
//! - `FullHash`: content hash of a completed run's `trades` + `equity_curve`,
//!   used to verify two runs produced byte-identical output (§8).

use crate::domain::{Bar, ConfigHash, DatasetHash, FullHash, PlayHash, RunId, TradeRecord};
use crate::engine::state::{EngineConfig, EquityPoint};
use crate::play::Play;

/// Exact content identity of a Play: same structure and every parameter
/// value. Two Plays differing only in, say, an EMA length hash differently.
pub fn play_hash(play: &Play) -> PlayHash {
    let json = serde_json::to_string(play).expect("Play must serialize");
    PlayHash::from_bytes(json.as_bytes())
}

/// Content identity of the dataset a run consumed. Hashes every bar's fields
/// in order, so truncation, reordering, or a single changed candle changes
/// the hash.
pub fn dataset_hash(bars: &[Bar]) -> DatasetHash {
    let mut buf = Vec::with_capacity(bars.len() * 56);
    for bar in bars {
        buf.extend_from_slice(&bar.ts_open.to_le_bytes());
        buf.extend_from_slice(&bar.ts_close.to_le_bytes());
        buf.extend_from_slice(&bar.open.to_le_bytes());
        buf.extend_from_slice(&bar.high.to_le_bytes());
        buf.extend_from_slice(&bar.low.to_le_bytes());
        buf.extend_from_slice(&bar.close.to_le_bytes());
        buf.extend_from_slice(&bar.volume.to_le_bytes());
    }
    DatasetHash::from_bytes(&buf)
}

/// Identity of the full engine configuration (Play + seed) — the key used to
/// name a run's artifact directory before the dataset is even known.
pub fn config_hash(config: &EngineConfig) -> ConfigHash {
    let json = serde_json::to_string(config).expect("EngineConfig must serialize");
    ConfigHash::from_bytes(json.as_bytes())
}

/// Derives the identity of one run from its three determining inputs: the
/// Play, the dataset it ran against, and the seed, in a fixed field order so
/// the result never depends on call-site argument ordering.
pub fn run_id(play: &PlayHash, dataset: &DatasetHash, seed: u64) -> RunId {
    let mut buf = Vec::with_capacity(32 + 32 + 8);
    buf.extend_from_slice(&play.0);
    buf.extend_from_slice(&dataset.0);
    buf.extend_from_slice(&seed.to_le_bytes());
    RunId::from_bytes(&buf)
}

/// Content hash of a completed run's trade sequence and equity curve. Two
/// runs with identical `(Play hash, dataset hash, seed)` must produce the
/// same `FullHash` — this is what a re-run check compares.
pub fn result_hash(trades: &[TradeRecord], equity_curve: &[EquityPoint]) -> FullHash {
    let json = serde_json::to_string(&(trades, equity_curve)).expect("run output must serialize");
    FullHash::from_bytes(json.as_bytes())
}
