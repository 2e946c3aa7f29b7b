//! Actors and their personal wallets.
//!
//! A user's personal cash and collateral live outside the venue; `deposit`
//! moves them into order book custody. The aggregate debt scalar tracks the
//! face value of every fixed-rate loan the user currently owes that is backed
//! by real collateral.

use crate::ledger::LedgerAccount;
use crate::types::UserId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub cash: LedgerAccount,
    pub collateral: LedgerAccount,
    pub total_debt_covered_by_real_collateral: Decimal,
}

impl User {
    pub fn new(id: UserId, cash: Decimal, collateral: Decimal) -> Self {
        Self {
            id,
            cash: LedgerAccount::new(cash),
            collateral: LedgerAccount::new(collateral),
            total_debt_covered_by_real_collateral: Decimal::ZERO,
        }
    }

    pub fn debt(&self) -> Decimal {
        self.total_debt_covered_by_real_collateral
    }

    pub fn has_debt(&self) -> bool {
        !self.total_debt_covered_by_real_collateral.is_zero()
    }

    pub(crate) fn add_debt(&mut self, amount: Decimal) {
        assert!(amount >= Decimal::ZERO, "debt increase must not be negative: {amount}");
        self.total_debt_covered_by_real_collateral += amount;
    }

    // a negative result means a validated operation removed more debt than existed
    pub(crate) fn reduce_debt(&mut self, amount: Decimal) {
        self.total_debt_covered_by_real_collateral -= amount;
        assert!(
            self.total_debt_covered_by_real_collateral >= Decimal::ZERO,
            "aggregate debt of {} went negative: {}",
            self.id,
            self.total_debt_covered_by_real_collateral
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn new_user_has_no_debt() {
        let user = User::new(UserId(1), dec!(100), dec!(5));
        assert_eq!(user.cash.free, dec!(100));
        assert_eq!(user.collateral.free, dec!(5));
        assert!(!user.has_debt());
    }

    #[test]
    fn debt_scalar_moves_both_ways() {
        let mut user = User::new(UserId(1), dec!(0), dec!(0));
        user.add_debt(dec!(103));
        user.reduce_debt(dec!(3));
        assert_eq!(user.debt(), dec!(100));
    }

    #[test]
    #[should_panic(expected = "went negative")]
    fn negative_debt_is_fatal() {
        let mut user = User::new(UserId(1), dec!(0), dec!(0));
        user.add_debt(dec!(10));
        user.reduce_debt(dec!(10.01));
    }
}
