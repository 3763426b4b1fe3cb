//! Closed trade record.

use super::{PositionSide, TradeId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    Tp,
    Sl,
    Signal,
    Liquidation,
    ForceClose,
    EndOfData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitPriceSource {
    TpLevel,
    SlLevel,
    BarClose,
    MarkPrice,
    Signal,
    Liquidation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub trade_id: TradeId,
    pub side: PositionSide,
    pub size_usdt: f64,
    pub entry_ts: i64,
    pub entry_bar_index: usize,
    pub entry_price: f64,
    pub exit_ts: i64,
    pub exit_bar_index: usize,
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    pub exit_price_source: ExitPriceSource,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub realized_pnl_usdt: f64,
    pub fees_paid_usdt: f64,
    pub funding_paid_usdt: f64,
    pub mae: f64,
    pub mfe: f64,
}

impl TradeRecord {
    pub fn is_winner(&self) -> bool {
        self.realized_pnl_usdt > 0.0
    }

    pub fn bars_held(&self) -> usize {
        self.exit_bar_index.saturating_sub(self.entry_bar_index)
    }
}
