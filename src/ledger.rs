//! Free/locked balance pair.
//!
//! Every balance in the system (personal wallets, the order book reserves, the
//! variable pool reserves) is a `LedgerAccount`. Each mutating call has a
//! `can_*` twin that runs the same checks without touching state, so callers
//! can validate a whole multi-account operation before committing any of it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAccount {
    pub free: Decimal,
    pub locked: Decimal,
}

impl LedgerAccount {
    pub fn new(free: Decimal) -> Self {
        assert!(free >= Decimal::ZERO, "ledger cannot start negative");
        Self {
            free,
            locked: Decimal::ZERO,
        }
    }

    pub fn total(&self) -> Decimal {
        self.free + self.locked
    }

    pub fn can_lock(&self, amount: Decimal) -> Result<(), LedgerError> {
        check_amount(amount)?;
        if amount > self.free {
            return Err(LedgerError::InsufficientFree {
                requested: amount,
                available: self.free,
            });
        }
        Ok(())
    }

    pub fn lock(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        self.can_lock(amount)?;
        self.free -= amount;
        self.locked += amount;
        self.assert_non_negative();
        Ok(())
    }

    pub fn can_unlock(&self, amount: Decimal) -> Result<(), LedgerError> {
        check_amount(amount)?;
        if amount > self.locked {
            return Err(LedgerError::InsufficientLocked {
                requested: amount,
                available: self.locked,
            });
        }
        Ok(())
    }

    pub fn unlock(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        self.can_unlock(amount)?;
        self.locked -= amount;
        self.free += amount;
        self.assert_non_negative();
        Ok(())
    }

    pub fn can_lock_absolute(&self, amount: Decimal) -> Result<(), LedgerError> {
        check_amount(amount)?;
        if amount > self.total() {
            return Err(LedgerError::InsufficientFree {
                requested: amount,
                available: self.total(),
            });
        }
        Ok(())
    }

    // releases everything locked, then locks exactly `amount`
    pub fn lock_absolute(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        self.can_lock_absolute(amount)?;
        self.free = self.total() - amount;
        self.locked = amount;
        self.assert_non_negative();
        Ok(())
    }

    pub fn can_transfer(&self, amount: Decimal) -> Result<(), LedgerError> {
        check_amount(amount)?;
        if amount > self.free {
            return Err(LedgerError::InsufficientFree {
                requested: amount,
                available: self.free,
            });
        }
        Ok(())
    }

    pub fn transfer(&mut self, to: &mut LedgerAccount, amount: Decimal) -> Result<(), LedgerError> {
        self.can_transfer(amount)?;
        self.free -= amount;
        to.free += amount;
        self.assert_non_negative();
        Ok(())
    }

    // commit half of check-then-commit. the caller already ran the can_* twin,
    // so a failure here is an accounting defect
    pub(crate) fn settle_transfer(&mut self, to: &mut LedgerAccount, amount: Decimal) {
        if let Err(e) = self.transfer(to, amount) {
            panic!("validated transfer failed: {e}");
        }
    }

    fn assert_non_negative(&self) {
        assert!(
            self.free >= Decimal::ZERO && self.locked >= Decimal::ZERO,
            "ledger went negative: free={}, locked={}",
            self.free,
            self.locked
        );
    }
}

fn check_amount(amount: Decimal) -> Result<(), LedgerError> {
    if amount < Decimal::ZERO {
        return Err(LedgerError::NegativeAmount(amount));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Insufficient free balance: requested {requested}, available {available}")]
    InsufficientFree { requested: Decimal, available: Decimal },

    #[error("Insufficient locked balance: requested {requested}, available {available}")]
    InsufficientLocked { requested: Decimal, available: Decimal },

    #[error("Amount must not be negative: {0}")]
    NegativeAmount(Decimal),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn lock_and_unlock() {
        let mut acc = LedgerAccount::new(dec!(100));
        acc.lock(dec!(40)).unwrap();
        assert_eq!(acc.free, dec!(60));
        assert_eq!(acc.locked, dec!(40));

        acc.unlock(dec!(15)).unwrap();
        assert_eq!(acc.free, dec!(75));
        assert_eq!(acc.locked, dec!(25));
    }

    #[test]
    fn lock_too_much_leaves_balance_untouched() {
        let mut acc = LedgerAccount::new(dec!(10));
        let before = acc.clone();
        assert!(matches!(acc.lock(dec!(11)), Err(LedgerError::InsufficientFree { .. })));
        assert!(matches!(acc.unlock(dec!(1)), Err(LedgerError::InsufficientLocked { .. })));
        assert_eq!(acc, before);
    }

    #[test]
    fn lock_absolute_repools_first() {
        let mut acc = LedgerAccount::new(dec!(100));
        acc.lock(dec!(70)).unwrap();
        acc.lock_absolute(dec!(20)).unwrap();
        assert_eq!(acc.locked, dec!(20));
        assert_eq!(acc.free, dec!(80));

        let before = acc.clone();
        assert!(acc.lock_absolute(dec!(101)).is_err());
        assert_eq!(acc, before);
    }

    #[test]
    fn transfer_moves_free_only() {
        let mut from = LedgerAccount::new(dec!(50));
        let mut to = LedgerAccount::default();
        from.lock(dec!(30)).unwrap();

        assert!(from.transfer(&mut to, dec!(25)).is_err());
        from.transfer(&mut to, dec!(20)).unwrap();
        assert_eq!(from.free, dec!(0));
        assert_eq!(from.locked, dec!(30));
        assert_eq!(to.free, dec!(20));
    }

    #[test]
    #[should_panic(expected = "validated transfer failed")]
    fn settle_without_check_is_fatal() {
        let mut from = LedgerAccount::new(dec!(1));
        let mut to = LedgerAccount::default();
        from.settle_transfer(&mut to, dec!(2));
    }

    #[test]
    fn negative_amounts_rejected() {
        let mut acc = LedgerAccount::new(dec!(5));
        assert_eq!(acc.lock(dec!(-1)), Err(LedgerError::NegativeAmount(dec!(-1))));
        assert!(acc.can_transfer(dec!(-0.5)).is_err());
    }
}
