//! Risk Policy: turns a raw `Intent` into a sized `Signal`, or a recoverable
//! `PolicyReject`. Enforces margin/entry gates and the Play's
//! `position_policy`. A reject never aborts the run — the intent is simply
//! dropped and the loop continues (§7).

use crate::domain::{Ledger, PositionSide};
use crate::play::{AccountConfig, PositionMode, PositionPolicy, RiskModel, SizingRule, StopRule};
use crate::rules::IntentAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyRejectReason {
    InsufficientMargin,
    BelowMinNotional,
    ModeDisallowsSide,
    AlreadyInPosition,
    NoOpenPosition,
    InvalidStopLoss,
    MissingAtrForStop,
    ExceedsMaxLeverage,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    pub action: IntentAction,
    pub size_usdt: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

fn resolve_stop(rule: StopRule, side: PositionSide, mark_price: f64, atr: Option<f64>, is_stop_loss: bool) -> Result<f64, PolicyRejectReason> {
    // For a stop-loss, the adverse direction is opposite `side`; for a
    // take-profit it's the favourable direction.
    let adverse = if is_stop_loss { -side.sign() } else { side.sign() };
    let price = match rule {
        StopRule::Absolute { price } => price,
        StopRule::FixedPct { pct } => mark_price * (1.0 + adverse * pct),
        StopRule::AtrMultiple { multiple } => {
            let atr = atr.ok_or(PolicyRejectReason::MissingAtrForStop)?;
            mark_price + adverse * multiple * atr
        }
    };
    // A stop-loss must sit on the adverse side of entry regardless of which
    // rule produced it, not just the ones that derive it from `mark_price`.
    if is_stop_loss {
        let on_adverse_side = match side {
            PositionSide::Long => price < mark_price,
            PositionSide::Short => price > mark_price,
        };
        if !on_adverse_side {
            return Err(PolicyRejectReason::InvalidStopLoss);
        }
    }
    Ok(price)
}

fn resolve_size(
    rule: SizingRule,
    equity: f64,
    mark_price: f64,
    stop_loss: Option<f64>,
) -> Result<f64, PolicyRejectReason> {
    match rule {
        SizingRule::SizeUsdt(v) => Ok(v),
        SizingRule::SizePct(pct) => Ok(equity * pct),
        SizingRule::RiskPct(pct) => {
            let stop = stop_loss.ok_or(PolicyRejectReason::InvalidStopLoss)?;
            let stop_distance = (mark_price - stop).abs();
            if stop_distance <= f64::EPSILON {
                return Err(PolicyRejectReason::InvalidStopLoss);
            }
            let risk_amount = equity * pct;
            let quantity = risk_amount / stop_distance;
            Ok(quantity * mark_price)
        }
    }
}

fn mode_allows(mode: PositionMode, side: PositionSide) -> bool {
    match mode {
        PositionMode::LongOnly => side == PositionSide::Long,
        PositionMode::ShortOnly => side == PositionSide::Short,
        PositionMode::LongShort => true,
    }
}

/// Evaluates an entry intent into a sized `Signal`, or a reject reason.
#[allow(clippy::too_many_arguments)]
pub fn evaluate_entry(
    side: PositionSide,
    mark_price: f64,
    risk_model: &RiskModel,
    account: &AccountConfig,
    position_policy: &PositionPolicy,
    ledger: &Ledger,
    has_open_position: bool,
    atr_value: Option<f64>,
) -> Result<Signal, PolicyRejectReason> {
    if has_open_position && !position_policy.allow_flip {
        return Err(PolicyRejectReason::AlreadyInPosition);
    }
    if !mode_allows(position_policy.mode, side) {
        return Err(PolicyRejectReason::ModeDisallowsSide);
    }

    let stop_loss = resolve_stop(risk_model.stop_loss, side, mark_price, atr_value, true)?;
    let take_profit = resolve_stop(risk_model.take_profit, side, mark_price, atr_value, false)?;

    let equity = ledger.equity();
    let size_usdt = resolve_size(risk_model.sizing, equity, mark_price, Some(stop_loss))?;
    if size_usdt < account.min_trade_notional_usdt {
        return Err(PolicyRejectReason::BelowMinNotional);
    }
    if size_usdt > equity * account.max_leverage {
        return Err(PolicyRejectReason::ExceedsMaxLeverage);
    }

    let required_margin = size_usdt * account.initial_margin_rate();
    let est_entry_fee = size_usdt * account.fee_model.taker_bps / 10_000.0;
    if required_margin + est_entry_fee > ledger.available_balance() {
        return Err(PolicyRejectReason::InsufficientMargin);
    }

    let action = match side {
        PositionSide::Long => IntentAction::EntryLong,
        PositionSide::Short => IntentAction::EntryShort,
    };
    Ok(Signal { action, size_usdt, stop_loss: Some(stop_loss), take_profit: Some(take_profit) })
}

/// Evaluates an exit intent. Exits are always allowed while a position is
/// open; the only reject is firing an exit with nothing open.
pub fn evaluate_exit(action: IntentAction, has_open_position: bool) -> Result<Signal, PolicyRejectReason> {
    if !has_open_position {
        return Err(PolicyRejectReason::NoOpenPosition);
    }
    Ok(Signal { action, size_usdt: 0.0, stop_loss: None, take_profit: None })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::play::FeeModel;

    fn account() -> AccountConfig {
        AccountConfig {
            starting_equity_usdt: 1000.0,
            max_leverage: 10.0,
            fee_model: FeeModel { taker_bps: 5.5, maker_bps: 2.0 },
            slippage_bps: 2.0,
            min_trade_notional_usdt: 5.0,
            maintenance_margin_rate: None,
            funding_rate_per_8h: 0.0001,
        }
    }

    #[test]
    fn long_only_mode_rejects_short_entry() {
        let ledger = Ledger::new(1000.0);
        let policy = PositionPolicy { mode: PositionMode::LongOnly, allow_flip: false };
        let risk = RiskModel {
            stop_loss: StopRule::FixedPct { pct: 0.01 },
            take_profit: StopRule::FixedPct { pct: 0.02 },
            sizing: SizingRule::SizePct(0.1),
            atr_feature_id: None,
        };
        let result = evaluate_entry(PositionSide::Short, 100.0, &risk, &account(), &policy, &ledger, false, None);
        assert_eq!(result, Err(PolicyRejectReason::ModeDisallowsSide));
    }

    #[test]
    fn fixed_pct_stop_computes_adverse_side() {
        let ledger = Ledger::new(1000.0);
        let policy = PositionPolicy { mode: PositionMode::LongShort, allow_flip: false };
        let risk = RiskModel {
            stop_loss: StopRule::FixedPct { pct: 0.01 },
            take_profit: StopRule::FixedPct { pct: 0.02 },
            sizing: SizingRule::SizePct(0.1),
            atr_feature_id: None,
        };
        let signal = evaluate_entry(PositionSide::Long, 100.0, &risk, &account(), &policy, &ledger, false, None).unwrap();
        assert!((signal.stop_loss.unwrap() - 99.0).abs() < 1e-9);
        assert!((signal.take_profit.unwrap() - 102.0).abs() < 1e-9);
    }

    #[test]
    fn below_min_notional_is_rejected() {
        let ledger = Ledger::new(1000.0);
        let policy = PositionPolicy { mode: PositionMode::LongShort, allow_flip: false };
        let risk = RiskModel {
            stop_loss: StopRule::FixedPct { pct: 0.01 },
            take_profit: StopRule::FixedPct { pct: 0.02 },
            sizing: SizingRule::SizeUsdt(1.0),
            atr_feature_id: None,
        };
        let result = evaluate_entry(PositionSide::Long, 100.0, &risk, &account(), &policy, &ledger, false, None);
        assert_eq!(result, Err(PolicyRejectReason::BelowMinNotional));
    }

    #[test]
    fn insufficient_margin_is_rejected() {
        // Equity comfortably clears the max-leverage cap on its own, but
        // most of it is already tied up as used margin on another position.
        let mut ledger = Ledger::new(1000.0);
        ledger.used_margin = 950.0;
        let policy = PositionPolicy { mode: PositionMode::LongShort, allow_flip: false };
        let risk = RiskModel {
            stop_loss: StopRule::FixedPct { pct: 0.01 },
            take_profit: StopRule::FixedPct { pct: 0.02 },
            sizing: SizingRule::SizeUsdt(500.0),
            atr_feature_id: None,
        };
        let result = evaluate_entry(PositionSide::Long, 100.0, &risk, &account(), &policy, &ledger, false, None);
        assert_eq!(result, Err(PolicyRejectReason::InsufficientMargin));
    }

    #[test]
    fn size_exceeding_max_leverage_is_rejected() {
        let ledger = Ledger::new(100.0);
        let policy = PositionPolicy { mode: PositionMode::LongShort, allow_flip: false };
        let risk = RiskModel {
            stop_loss: StopRule::FixedPct { pct: 0.01 },
            take_profit: StopRule::FixedPct { pct: 0.02 },
            sizing: SizingRule::SizeUsdt(2000.0),
            atr_feature_id: None,
        };
        let result = evaluate_entry(PositionSide::Long, 100.0, &risk, &account(), &policy, &ledger, false, None);
        assert_eq!(result, Err(PolicyRejectReason::ExceedsMaxLeverage));
    }

    #[test]
    fn absolute_stop_on_wrong_side_of_entry_is_rejected() {
        let ledger = Ledger::new(1000.0);
        let policy = PositionPolicy { mode: PositionMode::LongShort, allow_flip: false };
        let risk = RiskModel {
            stop_loss: StopRule::Absolute { price: 101.0 },
            take_profit: StopRule::Absolute { price: 110.0 },
            sizing: SizingRule::SizePct(0.1),
            atr_feature_id: None,
        };
        let result = evaluate_entry(PositionSide::Long, 100.0, &risk, &account(), &policy, &ledger, false, None);
        assert_eq!(result, Err(PolicyRejectReason::InvalidStopLoss));
    }
}
