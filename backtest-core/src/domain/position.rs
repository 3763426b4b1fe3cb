//! Open position on the (single, per-run) USDT-margined perpetual.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn sign(self) -> f64 {
        match self {
            PositionSide::Long => 1.0,
            PositionSide::Short => -1.0,
        }
    }
}

/// An open isolated-margin position. Only one may exist at a time (v1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: PositionSide,
    pub size_usdt: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub entry_ts: i64,
    pub entry_bar_index: usize,
    pub used_margin: f64,
    pub unrealized_pnl: f64,
    /// Maximum adverse excursion, USDT, always <= 0.
    pub mae: f64,
    /// Maximum favorable excursion, USDT, always >= 0.
    pub mfe: f64,
    /// Funding accrued against this position since entry, USDT. Positive
    /// means the position paid funding, negative means it received it.
    pub funding_paid: f64,
}

impl Position {
    pub fn new(
        side: PositionSide,
        size_usdt: f64,
        entry_price: f64,
        stop_loss: f64,
        take_profit: f64,
        entry_ts: i64,
        entry_bar_index: usize,
        used_margin: f64,
    ) -> Self {
        Self {
            side,
            size_usdt,
            entry_price,
            stop_loss,
            take_profit,
            entry_ts,
            entry_bar_index,
            used_margin,
            unrealized_pnl: 0.0,
            mae: 0.0,
            mfe: 0.0,
            funding_paid: 0.0,
        }
    }

    /// Quantity of the underlying the position's notional corresponds to.
    pub fn quantity(&self) -> f64 {
        self.size_usdt / self.entry_price
    }

    /// Current notional value of the position at `mark`.
    pub fn market_value(&self, mark: f64) -> f64 {
        self.quantity() * mark
    }

    /// Mark the position to `mark` price: recomputes unrealized PnL and MAE/MFE.
    pub fn update_mark(&mut self, mark: f64) {
        let pnl = self.quantity() * (mark - self.entry_price) * self.side.sign();
        self.unrealized_pnl = pnl;
        if pnl < self.mae {
            self.mae = pnl;
        }
        if pnl > self.mfe {
            self.mfe = pnl;
        }
    }
}
