//! Data Frame Builder: vectorised, off-hot-loop computation of per-TF
//! indicator arrays declared by a Play's `feature_specs`.
//!
//! Structural detectors (Swing, Trend, Zone, Fibonacci) are never computed
//! here — they live exclusively in Incremental State. This builder only
//! produces the simple incrementally-defined indicators (EMA/RSI/ATR/VWAP)
//! in batch, plus NaN placeholders for Anchored VWAP, which §4.1 forbids
//! computing in batch since it depends on incremental structure state.

use crate::compose::tf_duration_ms;
use crate::domain::Bar;
use crate::error::{CoreError, CoreResult};
use crate::play::{FeatureSpec, Play};

/// Coverage check run before `prepare_run`: the data window an orchestrator
/// must supply, plus any gaps found in what it actually supplied.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PreflightReport {
    pub required_start_ts: i64,
    pub required_end_ts: i64,
    /// `(gap_start_ts, gap_end_ts)` pairs exceeding 3x the exec timeframe's duration.
    pub gaps: Vec<(i64, i64)>,
}

impl PreflightReport {
    pub fn is_clean(&self) -> bool {
        self.gaps.is_empty()
    }
}

pub struct DataFrameBuilder;

impl DataFrameBuilder {
    /// Warmup bar count per indicator kind, per §4.1's stated formula.
    pub fn warmup_bars(kind: &str, params: &std::collections::BTreeMap<String, f64>) -> usize {
        let length = params.get("length").or_else(|| params.get("period")).copied().unwrap_or(1.0);
        match kind {
            "ema" | "anchored_vwap" => (3.0 * length).ceil() as usize,
            "rsi" => (2.0 * length).ceil() as usize,
            "sma" => length.ceil() as usize,
            "atr" | "vwap" => length.ceil() as usize,
            _ => {
                let max_param = params.values().cloned().fold(0.0, f64::max);
                (2.0 * max_param).ceil() as usize
            }
        }
    }

    /// Checks historical-data coverage before `compose::prepare_run` is
    /// called: the required window is `[window_start - warmup_span -
    /// safety_buffer, window_end]`, where `warmup_span` is the exec TF's
    /// longest declared warmup in bars, scaled to ms, and `safety_buffer` is
    /// one extra exec bar's width. `exec_bars` must already be sorted by
    /// `ts_open`; gaps wider than 3x the exec TF's duration are reported but
    /// never cause this call itself to fail — the caller decides whether a
    /// non-empty `gaps` list is a hard failure.
    pub fn preflight(play: &Play, exec_bars: &[Bar], window_start_ts: i64, window_end_ts: i64) -> PreflightReport {
        let exec_duration_ms = tf_duration_ms(play).get(&play.timeframes.exec).copied().unwrap_or(1).max(1);

        let warmup_bars = play
            .feature_specs
            .iter()
            .filter(|spec| spec.tf == play.timeframes.exec)
            .map(|spec| Self::warmup_bars(&spec.kind, &spec.params))
            .max()
            .unwrap_or(0);
        let warmup_span = warmup_bars as i64 * exec_duration_ms;
        let safety_buffer = exec_duration_ms;

        let gap_threshold = 3 * exec_duration_ms;
        let gaps = exec_bars
            .windows(2)
            .filter_map(|pair| {
                let gap = pair[1].ts_open - pair[0].ts_close;
                (gap > gap_threshold).then_some((pair[0].ts_close, pair[1].ts_open))
            })
            .collect();

        PreflightReport {
            required_start_ts: window_start_ts - warmup_span - safety_buffer,
            required_end_ts: window_end_ts,
            gaps,
        }
    }

    /// Validates a feature spec's parameters are in the declared registry's
    /// range before any computation begins.
    pub fn validate(spec: &FeatureSpec) -> CoreResult<()> {
        match spec.kind.as_str() {
            "ema" | "sma" | "rsi" | "atr" | "vwap" | "anchored_vwap" | "rolling_window" | "swing" | "trend"
            | "zone" | "derived_zone" | "fibonacci" | "fisher" => Ok(()),
            other => Err(CoreError::UnknownIndicator { kind: other.to_string() }),
        }
    }

    /// Computes the batch array for a single feature spec. Returns `None`
    /// for structural/incremental-only kinds (handled by Incremental State)
    /// and NaN-filled for Anchored VWAP (handled by the engine per bar).
    pub fn compute(spec: &FeatureSpec, bars: &[Bar]) -> CoreResult<Option<Vec<f64>>> {
        Self::validate(spec)?;
        match spec.kind.as_str() {
            "ema" => Ok(Some(Self::ema(spec, bars)?)),
            "sma" => Ok(Some(Self::sma(spec, bars)?)),
            "rsi" => Ok(Some(Self::rsi(spec, bars)?)),
            "atr" => Ok(Some(Self::atr(spec, bars)?)),
            "vwap" => Ok(Some(Self::vwap(spec, bars))),
            "anchored_vwap" => Ok(Some(vec![f64::NAN; bars.len()])),
            _ => Ok(None),
        }
    }

    fn length_param(spec: &FeatureSpec) -> CoreResult<usize> {
        let length = spec
            .params
            .get("length")
            .or_else(|| spec.params.get("period"))
            .ok_or_else(|| CoreError::InvalidParam {
                message: format!("feature '{}' missing required 'length' param", spec.id),
                fix_hint: "add a numeric 'length' or 'period' param".to_string(),
            })?;
        if *length <= 0.0 {
            return Err(CoreError::InvalidParam {
                message: format!("feature '{}' has non-positive length {}", spec.id, length),
                fix_hint: "length must be a positive integer".to_string(),
            });
        }
        Ok(*length as usize)
    }

    fn ema(spec: &FeatureSpec, bars: &[Bar]) -> CoreResult<Vec<f64>> {
        let period = Self::length_param(spec)?;
        let alpha = 2.0 / (period as f64 + 1.0);
        let mut out = Vec::with_capacity(bars.len());
        let mut value: Option<f64> = None;
        for bar in bars {
            if bar.close.is_nan() {
                out.push(value.unwrap_or(f64::NAN));
                continue;
            }
            value = Some(match value {
                None => bar.close,
                Some(prev) => alpha * bar.close + (1.0 - alpha) * prev,
            });
            out.push(value.unwrap());
        }
        Ok(out)
    }

    fn sma(spec: &FeatureSpec, bars: &[Bar]) -> CoreResult<Vec<f64>> {
        let period = Self::length_param(spec)?;
        let mut out = Vec::with_capacity(bars.len());
        let mut window: std::collections::VecDeque<f64> = std::collections::VecDeque::with_capacity(period);
        let mut sum = 0.0;
        for bar in bars {
            if bar.close.is_nan() {
                out.push(f64::NAN);
                continue;
            }
            window.push_back(bar.close);
            sum += bar.close;
            if window.len() > period {
                sum -= window.pop_front().unwrap();
            }
            if window.len() < period {
                out.push(f64::NAN);
            } else {
                out.push(sum / period as f64);
            }
        }
        Ok(out)
    }

    fn rsi(spec: &FeatureSpec, bars: &[Bar]) -> CoreResult<Vec<f64>> {
        let period = Self::length_param(spec)?;
        let mut out = Vec::with_capacity(bars.len());
        let mut prev_close: Option<f64> = None;
        let mut avg_gain = 0.0;
        let mut avg_loss = 0.0;
        for bar in bars {
            if bar.close.is_nan() {
                out.push(f64::NAN);
                continue;
            }
            if let Some(prev) = prev_close {
                let change = bar.close - prev;
                let gain = change.max(0.0);
                let loss = (-change).max(0.0);
                let n = period as f64;
                avg_gain = (avg_gain * (n - 1.0) + gain) / n;
                avg_loss = (avg_loss * (n - 1.0) + loss) / n;
                let rsi = if avg_gain == 0.0 && avg_loss == 0.0 {
                    50.0
                } else if avg_loss == 0.0 {
                    100.0
                } else if avg_gain == 0.0 {
                    0.0
                } else {
                    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
                };
                out.push(rsi);
            } else {
                out.push(50.0);
            }
            prev_close = Some(bar.close);
        }
        Ok(out)
    }

    fn atr(spec: &FeatureSpec, bars: &[Bar]) -> CoreResult<Vec<f64>> {
        let period = Self::length_param(spec)?;
        let mut out = Vec::with_capacity(bars.len());
        let mut prev_close: Option<f64> = None;
        let mut value: Option<f64> = None;
        for bar in bars {
            if bar.is_void() {
                out.push(value.unwrap_or(f64::NAN));
                continue;
            }
            let tr = match prev_close {
                None => bar.high - bar.low,
                Some(prev) => (bar.high - bar.low).max((bar.high - prev).abs()).max((bar.low - prev).abs()),
            };
            value = Some(match value {
                None => tr,
                Some(prev) => (prev * (period as f64 - 1.0) + tr) / period as f64,
            });
            out.push(value.unwrap());
            prev_close = Some(bar.close);
        }
        Ok(out)
    }

    fn vwap(_spec: &FeatureSpec, bars: &[Bar]) -> Vec<f64> {
        let mut out = Vec::with_capacity(bars.len());
        let mut cum_pv = 0.0;
        let mut cum_vol = 0.0;
        let mut value = f64::NAN;
        for bar in bars {
            if !bar.is_void() {
                let typical = (bar.high + bar.low + bar.close) / 3.0;
                cum_pv += typical * bar.volume;
                cum_vol += bar.volume;
                if cum_vol > 0.0 {
                    value = cum_pv / cum_vol;
                }
            }
            out.push(value);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn bar(close: f64) -> Bar {
        Bar { ts_open: 0, ts_close: 1, open: close, high: close, low: close, close, volume: 1.0 }
    }

    fn spec(kind: &str, length: f64) -> FeatureSpec {
        let mut params = BTreeMap::new();
        params.insert("length".to_string(), length);
        FeatureSpec {
            id: "f".to_string(),
            kind: kind.to_string(),
            tf: crate::domain::TfRole::Low,
            params,
            depends_on: BTreeMap::new(),
        }
    }

    #[test]
    fn unknown_indicator_is_rejected() {
        let s = spec("made_up_kind", 9.0);
        assert!(DataFrameBuilder::validate(&s).is_err());
    }

    #[test]
    fn anchored_vwap_batches_to_nan() {
        let s = spec("anchored_vwap", 9.0);
        let bars = vec![bar(100.0), bar(101.0)];
        let out = DataFrameBuilder::compute(&s, &bars).unwrap().unwrap();
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn ema_warmup_is_triple_length() {
        assert_eq!(DataFrameBuilder::warmup_bars("ema", &spec("ema", 9.0).params), 27);
    }

    #[test]
    fn ema_batch_matches_hand_computation() {
        let s = spec("ema", 2.0);
        let bars = vec![bar(10.0), bar(20.0)];
        let out = DataFrameBuilder::compute(&s, &bars).unwrap().unwrap();
        assert!((out[1] - 16.666_666_666_7).abs() < 1e-6);
    }

    fn minimal_play(feature_specs: Vec<FeatureSpec>, exec_duration_ms: i64) -> Play {
        use crate::play::{AccountConfig, FeeModel, PositionMode, PositionPolicy, RiskModel, SignalRules, SizingRule, StopRule, TfSpec, TimeframeConfig};
        Play {
            id: "p".to_string(),
            version: "1.0.0".to_string(),
            account: AccountConfig {
                starting_equity_usdt: 1000.0,
                max_leverage: 10.0,
                fee_model: FeeModel { taker_bps: 5.5, maker_bps: 2.0 },
                slippage_bps: 2.0,
                min_trade_notional_usdt: 5.0,
                maintenance_margin_rate: None,
                funding_rate_per_8h: 0.0,
            },
            symbol_universe: vec!["BTCUSDT".to_string()],
            timeframes: TimeframeConfig {
                low_tf: TfSpec { role: crate::domain::TfRole::Low, duration_ms: exec_duration_ms },
                med_tf: None,
                high_tf: None,
                exec: crate::domain::TfRole::Low,
            },
            feature_specs,
            signal_rules: SignalRules { entry_long: None, entry_short: None, exit_long: None, exit_short: None },
            risk_model: RiskModel {
                stop_loss: StopRule::FixedPct { pct: 0.01 },
                take_profit: StopRule::FixedPct { pct: 0.02 },
                sizing: SizingRule::SizePct(0.1),
                atr_feature_id: None,
            },
            position_policy: PositionPolicy { mode: PositionMode::LongOnly, allow_flip: false },
        }
    }

    fn dense_bars(n: usize, interval_ms: i64) -> Vec<Bar> {
        (0..n)
            .map(|i| Bar {
                ts_open: i as i64 * interval_ms,
                ts_close: (i as i64 + 1) * interval_ms,
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0,
                volume: 1.0,
            })
            .collect()
    }

    #[test]
    fn preflight_required_start_accounts_for_warmup_and_safety_buffer() {
        let play = minimal_play(vec![spec("ema", 9.0)], 60_000);
        let report = DataFrameBuilder::preflight(&play, &dense_bars(40, 60_000), 1_000_000, 2_000_000);
        // warmup = 27 bars * 60_000ms + safety buffer of one bar (60_000ms)
        assert_eq!(report.required_start_ts, 1_000_000 - 27 * 60_000 - 60_000);
        assert_eq!(report.required_end_ts, 2_000_000);
    }

    #[test]
    fn preflight_detects_gap_exceeding_three_bars() {
        let play = minimal_play(vec![], 60_000);
        let mut bars = dense_bars(5, 60_000);
        bars[3].ts_open += 10 * 60_000;
        let report = DataFrameBuilder::preflight(&play, &bars, 0, 300_000);
        assert_eq!(report.gaps.len(), 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn preflight_clean_dataset_has_no_gaps() {
        let play = minimal_play(vec![], 60_000);
        let report = DataFrameBuilder::preflight(&play, &dense_bars(10, 60_000), 0, 600_000);
        assert!(report.is_clean());
    }
}
