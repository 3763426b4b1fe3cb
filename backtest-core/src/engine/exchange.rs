//! Simulated Exchange: Bybit-aligned isolated-margin USDT-linear-perpetual
//! accounting. Accepts sized signals at bar close, fills market orders at
//! the next bar's open, checks TP/SL intrabar with a deterministic
//! tie-break, applies funding at 8h UTC boundaries, and liquidates on
//! margin breach.
//!
//! Market orders with an attached TP/SL only (§ Non-goals): no limit/stop
//! order book, no partial fills, no hedge mode.

use crate::domain::{Bar, ExitPriceSource, ExitReason, IdGen, Ledger, Position, PositionSide, TradeRecord};
use crate::play::{AccountConfig, FeeModel};

const FUNDING_INTERVAL_MS: i64 = 8 * 60 * 60 * 1000;

impl FeeModel {
    fn taker_fee(&self, notional: f64) -> f64 {
        notional * self.taker_bps / 10_000.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingEntry {
    pub side: PositionSide,
    pub size_usdt: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

#[derive(Debug, Default)]
pub struct BarOutcome {
    pub closed_trade: Option<TradeRecord>,
    pub funding_paid: f64,
    pub liquidated: bool,
}

#[derive(Debug)]
pub struct SimulatedExchange {
    account: AccountConfig,
    position: Option<Position>,
    pending_entry: Option<PendingEntry>,
    pending_exit: bool,
    last_funding_bucket: Option<i64>,
}

impl SimulatedExchange {
    pub fn new(account: AccountConfig) -> Self {
        Self { account, position: None, pending_entry: None, pending_exit: false, last_funding_bucket: None }
    }

    pub fn has_open_position(&self) -> bool {
        self.position.is_some()
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn queue_entry(&mut self, entry: PendingEntry) {
        self.pending_entry = Some(entry);
    }

    pub fn queue_exit(&mut self) {
        self.pending_exit = true;
    }

    fn funding_bucket(ts: i64) -> i64 {
        ts.div_euclid(FUNDING_INTERVAL_MS)
    }

    /// Runs the full per-bar exchange sequence against `bar`, mutating
    /// `ledger` and returning what happened. `bar_index`/`id_gen` back the
    /// closed trade record, if any.
    pub fn process_bar(&mut self, bar: &Bar, bar_index: usize, ledger: &mut Ledger, id_gen: &mut IdGen) -> BarOutcome {
        let mut outcome = BarOutcome::default();

        if bar.is_void() {
            return outcome;
        }

        // 1. funding at 8h UTC boundaries.
        let bucket = Self::funding_bucket(bar.ts_open);
        if self.last_funding_bucket.is_some_and(|prev| bucket != prev) {
            if let Some(pos) = &mut self.position {
                let amount = pos.market_value(bar.open) * self.account.funding_rate_per_8h * pos.side.sign();
                ledger.apply_funding(amount);
                pos.funding_paid += amount;
                outcome.funding_paid = amount;
            }
        }
        self.last_funding_bucket = Some(bucket);

        // 2. fill a queued entry at this bar's open.
        if let Some(entry) = self.pending_entry.take() {
            self.fill_entry(entry, bar, bar_index, ledger);
        }

        // 3. a queued signal-driven exit, filled at this bar's open.
        if self.pending_exit {
            self.pending_exit = false;
            if let Some(trade) = self.close_position(
                bar.open,
                bar.ts_close,
                bar_index,
                ExitReason::Signal,
                ExitPriceSource::Signal,
                ledger,
                id_gen,
            ) {
                outcome.closed_trade = Some(trade);
            }
        }

        // 4. intrabar TP/SL check, SL checked before TP (worst-case tie-break).
        if outcome.closed_trade.is_none() {
            if let Some(trade) = self.check_intrabar_exit(bar, bar_index, ledger, id_gen) {
                outcome.closed_trade = Some(trade);
            }
        }

        // 5. mark-to-market.
        if let Some(pos) = &mut self.position {
            pos.update_mark(bar.close);
            ledger.unrealized_pnl = pos.unrealized_pnl;
        } else {
            ledger.unrealized_pnl = 0.0;
        }

        // 6. liquidation check: equity <= maintenance margin at the bar's
        // worst intrabar price for this position's side (low for long, high
        // for short) — the close alone can understate an adverse wick that
        // already breached maintenance margin intrabar.
        if outcome.closed_trade.is_none() {
            if let Some(pos) = &self.position {
                let adverse_price = match pos.side {
                    PositionSide::Long => bar.low,
                    PositionSide::Short => bar.high,
                };
                let adverse_unrealized = pos.quantity() * (adverse_price - pos.entry_price) * pos.side.sign();
                let adverse_equity = ledger.cash_balance + adverse_unrealized;
                ledger.maintenance_margin = pos.size_usdt * self.account.maintenance_margin_rate();
                if adverse_equity <= ledger.maintenance_margin {
                    let fee = self.account.fee_model.taker_fee(pos.market_value(adverse_price));
                    if let Some(trade) = self.close_position(
                        adverse_price,
                        bar.ts_close,
                        bar_index,
                        ExitReason::Liquidation,
                        ExitPriceSource::Liquidation,
                        ledger,
                        id_gen,
                    ) {
                        ledger.apply_commission(fee);
                        outcome.closed_trade = Some(trade);
                        outcome.liquidated = true;
                    }
                }
            } else {
                ledger.maintenance_margin = 0.0;
            }
        }

        outcome
    }

    /// Force-closes any open position at the last bar's close (§8 boundary
    /// case: position open at end of window).
    pub fn force_close_at_end_of_data(
        &mut self,
        bar: &Bar,
        bar_index: usize,
        ledger: &mut Ledger,
        id_gen: &mut IdGen,
    ) -> Option<TradeRecord> {
        self.close_position(
            bar.close,
            bar.ts_close,
            bar_index,
            ExitReason::EndOfData,
            ExitPriceSource::BarClose,
            ledger,
            id_gen,
        )
    }

    fn fill_entry(&mut self, entry: PendingEntry, bar: &Bar, bar_index: usize, ledger: &mut Ledger) {
        let fill_price = bar.open;
        let fee = self.account.fee_model.taker_fee(entry.size_usdt);
        let used_margin = entry.size_usdt * self.account.initial_margin_rate();
        self.position = Some(Position::new(
            entry.side,
            entry.size_usdt,
            fill_price,
            entry.stop_loss,
            entry.take_profit,
            bar.ts_open,
            bar_index,
            used_margin,
        ));
        ledger.used_margin = used_margin;
        ledger.apply_commission(fee);
    }

    fn check_intrabar_exit(
        &mut self,
        bar: &Bar,
        bar_index: usize,
        ledger: &mut Ledger,
        id_gen: &mut IdGen,
    ) -> Option<TradeRecord> {
        let pos = self.position.as_ref()?;
        let (sl_hit, tp_hit) = match pos.side {
            PositionSide::Long => (bar.low <= pos.stop_loss, bar.high >= pos.take_profit),
            PositionSide::Short => (bar.high >= pos.stop_loss, bar.low <= pos.take_profit),
        };
        // Worst-case tie-break: SL is checked (and fires) before TP.
        if sl_hit {
            return self.close_position(
                pos.stop_loss,
                bar.ts_close,
                bar_index,
                ExitReason::Sl,
                ExitPriceSource::SlLevel,
                ledger,
                id_gen,
            );
        }
        if tp_hit {
            return self.close_position(
                pos.take_profit,
                bar.ts_close,
                bar_index,
                ExitReason::Tp,
                ExitPriceSource::TpLevel,
                ledger,
                id_gen,
            );
        }
        None
    }

    fn close_position(
        &mut self,
        exit_price: f64,
        exit_ts: i64,
        exit_bar_index: usize,
        exit_reason: ExitReason,
        exit_price_source: ExitPriceSource,
        ledger: &mut Ledger,
        id_gen: &mut IdGen,
    ) -> Option<TradeRecord> {
        let pos = self.position.take()?;
        let realized_pnl = pos.quantity() * (exit_price - pos.entry_price) * pos.side.sign();
        let fee = self.account.fee_model.taker_fee(pos.market_value(exit_price));

        ledger.cash_balance += realized_pnl;
        ledger.apply_commission(fee);
        ledger.used_margin = 0.0;
        ledger.unrealized_pnl = 0.0;
        ledger.maintenance_margin = 0.0;

        Some(TradeRecord {
            trade_id: id_gen.next_trade_id(),
            side: pos.side,
            size_usdt: pos.size_usdt,
            entry_ts: pos.entry_ts,
            entry_bar_index: pos.entry_bar_index,
            entry_price: pos.entry_price,
            exit_ts,
            exit_bar_index,
            exit_price,
            exit_reason,
            exit_price_source,
            stop_loss: pos.stop_loss,
            take_profit: pos.take_profit,
            realized_pnl_usdt: realized_pnl,
            fees_paid_usdt: fee,
            funding_paid_usdt: pos.funding_paid,
            mae: pos.mae,
            mfe: pos.mfe,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::play::FeeModel;

    fn account() -> AccountConfig {
        AccountConfig {
            starting_equity_usdt: 1000.0,
            max_leverage: 10.0,
            fee_model: FeeModel { taker_bps: 0.0, maker_bps: 0.0 },
            slippage_bps: 0.0,
            min_trade_notional_usdt: 5.0,
            maintenance_margin_rate: Some(0.005),
            funding_rate_per_8h: 0.0001,
        }
    }

    fn bar(ts_open: i64, o: f64, h: f64, l: f64, c: f64) -> Bar {
        Bar { ts_open, ts_close: ts_open + 3_600_000, open: o, high: h, low: l, close: c, volume: 1.0 }
    }

    #[test]
    fn sl_fires_before_tp_on_same_bar() {
        let mut exchange = SimulatedExchange::new(account());
        let mut ledger = Ledger::new(1000.0);
        let mut id_gen = IdGen::default();
        exchange.queue_entry(PendingEntry {
            side: PositionSide::Long,
            size_usdt: 1000.0,
            stop_loss: 99.0,
            take_profit: 101.0,
        });
        exchange.process_bar(&bar(0, 100.0, 100.0, 100.0, 100.0), 0, &mut ledger, &mut id_gen);
        let outcome = exchange.process_bar(&bar(3_600_000, 100.2, 101.2, 98.8, 100.0), 1, &mut ledger, &mut id_gen);
        let trade = outcome.closed_trade.unwrap();
        assert_eq!(trade.exit_reason, ExitReason::Sl);
        assert_eq!(trade.exit_price_source, ExitPriceSource::SlLevel);
        assert!((trade.exit_price - 99.0).abs() < 1e-9);
    }

    #[test]
    fn liquidation_fires_on_deep_adverse_move() {
        let mut exchange = SimulatedExchange::new(account());
        let mut ledger = Ledger::new(1000.0);
        let mut id_gen = IdGen::default();
        exchange.queue_entry(PendingEntry {
            side: PositionSide::Long,
            size_usdt: 10_000.0,
            stop_loss: 1.0,
            take_profit: 1_000.0,
        });
        exchange.process_bar(&bar(0, 100.0, 100.0, 100.0, 100.0), 0, &mut ledger, &mut id_gen);
        let outcome = exchange.process_bar(&bar(3_600_000, 99.0, 99.0, 90.0, 92.0), 1, &mut ledger, &mut id_gen);
        assert!(outcome.liquidated);
        assert_eq!(outcome.closed_trade.unwrap().exit_reason, ExitReason::Liquidation);
    }

    #[test]
    fn funding_applies_once_at_8h_boundary() {
        let mut exchange = SimulatedExchange::new(account());
        let mut ledger = Ledger::new(1000.0);
        let mut id_gen = IdGen::default();
        exchange.queue_entry(PendingEntry {
            side: PositionSide::Long,
            size_usdt: 1000.0,
            stop_loss: 1.0,
            take_profit: 1000.0,
        });
        // 07:55 UTC entry.
        let entry_ts = 7 * 3_600_000 + 55 * 60_000;
        exchange.process_bar(&bar(entry_ts, 100.0, 100.0, 100.0, 100.0), 0, &mut ledger, &mut id_gen);
        let before = ledger.total_funding_usdt;
        // next bar crosses the 08:00 boundary.
        let outcome = exchange.process_bar(&bar(entry_ts + 3_600_000, 100.0, 100.0, 100.0, 100.0), 1, &mut ledger, &mut id_gen);
        assert!(outcome.funding_paid > 0.0);
        assert!(ledger.total_funding_usdt > before);
    }

    #[test]
    fn closed_trade_attributes_accrued_funding() {
        let mut exchange = SimulatedExchange::new(account());
        let mut ledger = Ledger::new(1000.0);
        let mut id_gen = IdGen::default();
        exchange.queue_entry(PendingEntry {
            side: PositionSide::Long,
            size_usdt: 1000.0,
            stop_loss: 1.0,
            take_profit: 1000.0,
        });
        let entry_ts = 7 * 3_600_000 + 55 * 60_000;
        exchange.process_bar(&bar(entry_ts, 100.0, 100.0, 100.0, 100.0), 0, &mut ledger, &mut id_gen);
        // crosses the 08:00 boundary, accruing funding against the open position.
        exchange.process_bar(&bar(entry_ts + 3_600_000, 100.0, 100.0, 100.0, 100.0), 1, &mut ledger, &mut id_gen);
        let outcome = exchange.force_close_at_end_of_data(
            &bar(entry_ts + 7_200_000, 100.0, 100.0, 100.0, 100.0),
            2,
            &mut ledger,
            &mut id_gen,
        );
        let trade = outcome.unwrap();
        assert!(trade.funding_paid_usdt > 0.0);
        assert!((trade.funding_paid_usdt - ledger.total_funding_usdt).abs() < 1e-9);
    }
}
