//! Core domain types: bars, identifiers, positions, trades, the ledger.

pub mod bar;
pub mod ids;
pub mod ledger;
pub mod position;
pub mod trade;

pub use bar::{Bar, MarketStatus, TfRole};
pub use ids::{ConfigHash, DatasetHash, FullHash, IdGen, OrderId, PlayHash, RunId, SignalEventId, TradeId};
pub use ledger::{Ledger, EQUITY_EPSILON};
pub use position::{Position, PositionSide};
pub use trade::{ExitPriceSource, ExitReason, TradeRecord};
