//! The taxonomy of things that can go wrong, realised as a `thiserror`
//! enum. Hard-failure kinds are raised at preflight/builder time and the
//! engine never starts; `INVARIANT_VIOLATION` aborts a running loop;
//! `POLICY_REJECT` is recoverable and never reaches this type (it is
//! recorded as telemetry and the loop continues).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{{\"error_code\":\"INVALID_PLAY\",\"message\":\"{message}\",\"fix_hint\":\"{fix_hint}\"}}")]
    InvalidPlay { message: String, fix_hint: String },

    #[error("{{\"error_code\":\"UNKNOWN_INDICATOR\",\"message\":\"unknown indicator type '{kind}'\",\"fix_hint\":\"use one of the registered indicator types\"}}")]
    UnknownIndicator { kind: String },

    #[error("{{\"error_code\":\"UNDECLARED_FEATURE\",\"message\":\"rule references undeclared feature '{feature_id}'\",\"fix_hint\":\"add '{feature_id}' to feature_specs\"}}")]
    UndeclaredFeature { feature_id: String },

    #[error("{{\"error_code\":\"INVALID_PARAM\",\"message\":\"{message}\",\"fix_hint\":\"{fix_hint}\"}}")]
    InvalidParam { message: String, fix_hint: String },

    #[error("{{\"error_code\":\"INSUFFICIENT_DATA\",\"message\":\"{message}\",\"fix_hint\":\"{fix_hint}\"}}")]
    InsufficientData { message: String, fix_hint: String },

    #[error("{{\"error_code\":\"GAP_EXCEEDS_THRESHOLD\",\"message\":\"gap of {gap_bars} bars exceeds {threshold_bars} bar threshold at ts {ts}\",\"fix_hint\":\"run data sync to backfill the gap\"}}")]
    GapExceedsThreshold { ts: i64, gap_bars: i64, threshold_bars: i64 },

    #[error("{{\"error_code\":\"INVARIANT_VIOLATION\",\"message\":\"{invariant} violated at bar {bar_index}\",\"fix_hint\":\"this is an engine defect, file a bug with the run manifest\"}}")]
    InvariantViolation { bar_index: usize, invariant: String },

    #[error("{{\"error_code\":\"MODE_LOCK_VIOLATED\",\"message\":\"{message}\",\"fix_hint\":\"v1 supports isolated-margin USDT-linear one-way perpetuals only\"}}")]
    ModeLockViolated { message: String },
}

pub type CoreResult<T> = Result<T, CoreError>;
