//! Isolated-margin USDT ledger and its derived accounting identities.

use super::position::Position;
use serde::{Deserialize, Serialize};

/// Tolerance used when checking the equity/margin identities (§8 of the spec).
pub const EQUITY_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    pub cash_balance: f64,
    pub unrealized_pnl: f64,
    pub used_margin: f64,
    pub maintenance_margin: f64,
    pub total_commission_usdt: f64,
    pub total_funding_usdt: f64,
}

impl Ledger {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            cash_balance: initial_cash,
            unrealized_pnl: 0.0,
            used_margin: 0.0,
            maintenance_margin: 0.0,
            total_commission_usdt: 0.0,
            total_funding_usdt: 0.0,
        }
    }

    pub fn equity(&self) -> f64 {
        self.cash_balance + self.unrealized_pnl
    }

    pub fn free_margin(&self) -> f64 {
        self.equity() - self.used_margin
    }

    pub fn available_balance(&self) -> f64 {
        self.free_margin().max(0.0)
    }

    /// Checks the ledger's tracked `unrealized_pnl`/`used_margin` against
    /// values independently recomputed from the exchange's own position
    /// state — not against the ledger's own derived getters, which would
    /// always agree with themselves regardless of whether the ledger was
    /// ever desynced from the position it's supposed to mirror. Returns the
    /// violated invariant's name on mismatch (§7 `INVARIANT_VIOLATION`).
    pub fn verify_invariants(&self, position: Option<&Position>) -> Result<(), String> {
        let expected_unrealized = position.map_or(0.0, |p| p.unrealized_pnl);
        if (self.unrealized_pnl - expected_unrealized).abs() > EQUITY_EPSILON {
            return Err(format!(
                "unrealized_pnl identity violated: ledger {} != position {}",
                self.unrealized_pnl, expected_unrealized
            ));
        }
        let expected_used_margin = position.map_or(0.0, |p| p.used_margin);
        if (self.used_margin - expected_used_margin).abs() > EQUITY_EPSILON {
            return Err(format!(
                "used_margin identity violated: ledger {} != position {}",
                self.used_margin, expected_used_margin
            ));
        }
        if (self.equity() - (self.cash_balance + self.unrealized_pnl)).abs() > EQUITY_EPSILON {
            return Err(format!(
                "equity identity violated: {} != cash {} + unrealized {}",
                self.equity(),
                self.cash_balance,
                self.unrealized_pnl
            ));
        }
        Ok(())
    }

    pub fn apply_funding(&mut self, amount: f64) {
        self.cash_balance -= amount;
        self.total_funding_usdt += amount;
    }

    pub fn apply_commission(&mut self, amount: f64) {
        self.cash_balance -= amount;
        self.total_commission_usdt += amount;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equity_with_no_position() {
        let ledger = Ledger::new(1000.0);
        assert_eq!(ledger.equity(), 1000.0);
        assert_eq!(ledger.free_margin(), 1000.0);
        assert_eq!(ledger.available_balance(), 1000.0);
    }

    #[test]
    fn equity_accounts_for_unrealized_pnl() {
        let mut ledger = Ledger::new(1000.0);
        ledger.unrealized_pnl = -50.0;
        ledger.used_margin = 100.0;
        assert_eq!(ledger.equity(), 950.0);
        assert_eq!(ledger.free_margin(), 850.0);
    }

    #[test]
    fn available_balance_floors_at_zero() {
        let mut ledger = Ledger::new(100.0);
        ledger.used_margin = 500.0;
        assert_eq!(ledger.available_balance(), 0.0);
    }

    #[test]
    fn invariants_hold_after_funding_and_commission() {
        let mut ledger = Ledger::new(1000.0);
        ledger.apply_funding(1.5);
        ledger.apply_commission(0.5);
        assert!(ledger.verify_invariants(None).is_ok());
        assert!((ledger.cash_balance - 998.0).abs() < 1e-9);
    }

    #[test]
    fn invariants_fail_when_unrealized_desyncs_from_position() {
        use super::super::position::PositionSide;

        let mut ledger = Ledger::new(1000.0);
        ledger.unrealized_pnl = -40.0;
        let position = Position::new(PositionSide::Long, 1000.0, 100.0, 99.0, 102.0, 0, 0, 100.0);
        assert!(ledger.verify_invariants(Some(&position)).is_err());
    }
}
