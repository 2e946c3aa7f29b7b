//! Variable-rate pool that absorbs overdue fixed-rate debt.
//!
//! Accounting follows the liquidity-index scheme: a loan stores its principal
//! divided by the index at funding time, and its current debt is that scaled
//! amount times the current index. The index grows linearly per tick at the
//! utilization-derived rate and is only written back when the pool mutates.
//!
//! Reserve identity kept by every mutation:
//! `cash.free == total_deposits - total_lent_out`, hence utilization stays in `[0, 1]`.

use crate::config::VariablePoolParams;
use crate::ledger::{LedgerAccount, LedgerError};
use crate::types::{Price, Timestamp, UserId, VariableLoanId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableLoan {
    pub id: VariableLoanId,
    pub borrower: UserId,
    pub amount_lent: Decimal,
    pub scaled_principal: Decimal,
    pub collateral: Decimal,
    pub start_time: Timestamp,
    pub repaid: bool,
}

impl VariableLoan {
    pub fn debt_at(&self, liquidity_index: Decimal) -> Decimal {
        self.scaled_principal * liquidity_index
    }
}

/// Amounts settled by a variable loan repayment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableRepayment {
    pub debt: Decimal,
    pub collateral: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariablePool {
    pub cash: LedgerAccount,
    pub collateral: LedgerAccount,
    params: VariablePoolParams,
    deposits: BTreeMap<UserId, Decimal>,
    total_deposits: Decimal,
    total_lent_out: Decimal,
    liquidity_index: Decimal,
    last_update: Timestamp,
    loans: BTreeMap<VariableLoanId, VariableLoan>,
    next_loan_id: u64,
}

impl VariablePool {
    pub fn new(params: VariablePoolParams, now: Timestamp) -> Self {
        Self {
            cash: LedgerAccount::default(),
            collateral: LedgerAccount::default(),
            params,
            deposits: BTreeMap::new(),
            total_deposits: Decimal::ZERO,
            total_lent_out: Decimal::ZERO,
            liquidity_index: Decimal::ONE,
            last_update: now,
            loans: BTreeMap::new(),
            next_loan_id: 0,
        }
    }

    pub fn params(&self) -> &VariablePoolParams {
        &self.params
    }

    pub fn total_deposits(&self) -> Decimal {
        self.total_deposits
    }

    pub fn total_lent_out(&self) -> Decimal {
        self.total_lent_out
    }

    pub fn deposit_of(&self, user: UserId) -> Decimal {
        self.deposits.get(&user).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn liquidity_index(&self) -> Decimal {
        self.liquidity_index
    }

    pub fn loan(&self, id: VariableLoanId) -> Result<&VariableLoan, VariablePoolError> {
        self.loans.get(&id).ok_or(VariablePoolError::LoanNotFound(id))
    }

    pub fn loans(&self) -> impl Iterator<Item = &VariableLoan> {
        self.loans.values()
    }

    pub fn utilization_ratio(&self) -> Decimal {
        if self.total_deposits.is_zero() {
            return Decimal::ZERO;
        }
        let ur = self.total_lent_out / self.total_deposits;
        assert!(
            ur >= Decimal::ZERO && ur <= Decimal::ONE,
            "utilization out of range: {ur}"
        );
        ur
    }

    // continuous two-slope curve: min_rate..kink below the turning point, kink..max_rate above
    pub fn interest_rate(&self) -> Decimal {
        let p = &self.params;
        let ur = self.utilization_ratio();
        if ur <= p.turning_point {
            p.min_rate + p.slope * ur
        } else {
            let kink = p.kink_rate();
            kink + (p.max_rate - kink) * (ur - p.turning_point) / (Decimal::ONE - p.turning_point)
        }
    }

    /// Liquidity index as of `now`, without writing it back.
    pub fn index_at(&self, now: Timestamp) -> Decimal {
        let elapsed = self.last_update.ticks_until(&now);
        // nothing outstanding, nothing to accrue
        if elapsed <= 0 || self.total_lent_out.is_zero() {
            return self.liquidity_index;
        }
        self.liquidity_index * (Decimal::ONE + self.interest_rate() * Decimal::from(elapsed))
    }

    pub fn current_debt(&self, id: VariableLoanId, now: Timestamp) -> Result<Decimal, VariablePoolError> {
        let loan = self.loan(id)?;
        if loan.repaid {
            return Ok(Decimal::ZERO);
        }
        Ok(loan.debt_at(self.index_at(now)))
    }

    pub fn collateral_ratio(&self, id: VariableLoanId, now: Timestamp, price: Price) -> Result<Decimal, VariablePoolError> {
        let debt = self.current_debt(id, now)?;
        if debt.is_zero() {
            return Ok(Decimal::MAX);
        }
        Ok(price.to_cash(self.loan(id)?.collateral) / debt)
    }

    pub fn is_liquidatable(
        &self,
        id: VariableLoanId,
        now: Timestamp,
        price: Price,
        cr_liquidation: Decimal,
    ) -> Result<bool, VariablePoolError> {
        let loan = self.loan(id)?;
        Ok(!loan.repaid && self.collateral_ratio(id, now, price)? < cr_liquidation)
    }

    fn accrue(&mut self, now: Timestamp) {
        if now > self.last_update {
            self.liquidity_index = self.index_at(now);
            self.last_update = now;
        }
    }

    pub fn supply(
        &mut self,
        supplier: UserId,
        from: &mut LedgerAccount,
        amount: Decimal,
        now: Timestamp,
    ) -> Result<(), VariablePoolError> {
        if amount <= Decimal::ZERO {
            return Err(VariablePoolError::ZeroAmount);
        }
        from.can_transfer(amount)?;

        self.accrue(now);
        from.settle_transfer(&mut self.cash, amount);
        *self.deposits.entry(supplier).or_insert(Decimal::ZERO) += amount;
        self.total_deposits += amount;
        Ok(())
    }

    pub fn can_borrow(
        &self,
        amount: Decimal,
        collateral: Decimal,
        price: Price,
        cr_opening: Decimal,
        collateral_provider: &LedgerAccount,
    ) -> Result<(), VariablePoolError> {
        if amount <= Decimal::ZERO {
            return Err(VariablePoolError::ZeroAmount);
        }
        let ratio = price.to_cash(collateral) / amount;
        if ratio < cr_opening {
            return Err(VariablePoolError::OpeningRatioNotMet {
                ratio,
                required: cr_opening,
            });
        }
        self.cash.can_transfer(amount)?;
        collateral_provider.can_transfer(collateral)?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn borrow(
        &mut self,
        borrower: UserId,
        amount: Decimal,
        collateral: Decimal,
        price: Price,
        cr_opening: Decimal,
        now: Timestamp,
        cash_recipient: &mut LedgerAccount,
        collateral_provider: &mut LedgerAccount,
    ) -> Result<VariableLoanId, VariablePoolError> {
        self.can_borrow(amount, collateral, price, cr_opening, collateral_provider)?;

        self.accrue(now);
        self.cash.settle_transfer(cash_recipient, amount);
        collateral_provider.settle_transfer(&mut self.collateral, collateral);
        self.total_lent_out += amount;

        let id = VariableLoanId(self.next_loan_id);
        self.next_loan_id += 1;
        self.loans.insert(
            id,
            VariableLoan {
                id,
                borrower,
                amount_lent: amount,
                scaled_principal: amount / self.liquidity_index,
                collateral,
                start_time: now,
                repaid: false,
            },
        );
        Ok(id)
    }

    pub fn can_repay(
        &self,
        id: VariableLoanId,
        now: Timestamp,
        payer: &LedgerAccount,
    ) -> Result<VariableRepayment, VariablePoolError> {
        let loan = self.loan(id)?;
        if loan.repaid {
            return Err(VariablePoolError::AlreadyRepaid(id));
        }
        let debt = loan.debt_at(self.index_at(now));
        payer.can_transfer(debt)?;
        self.collateral.can_transfer(loan.collateral)?;
        Ok(VariableRepayment {
            debt,
            collateral: loan.collateral,
        })
    }

    pub fn repay(
        &mut self,
        id: VariableLoanId,
        now: Timestamp,
        payer: &mut LedgerAccount,
        collateral_recipient: &mut LedgerAccount,
    ) -> Result<VariableRepayment, VariablePoolError> {
        let repayment = self.can_repay(id, now, payer)?;
        let amount_lent = self.loan(id)?.amount_lent;

        self.accrue(now);
        payer.settle_transfer(&mut self.cash, repayment.debt);
        self.collateral.settle_transfer(collateral_recipient, repayment.collateral);
        if let Some(loan) = self.loans.get_mut(&id) {
            loan.repaid = true;
        }
        // interest becomes part of the lendable base
        self.total_deposits += repayment.debt - amount_lent;
        self.total_lent_out -= amount_lent;
        assert!(self.total_lent_out >= Decimal::ZERO, "variable pool lent out went negative");
        Ok(repayment)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VariablePoolError {
    #[error("Amount must be positive")]
    ZeroAmount,

    #[error("Opening collateral ratio not met: {ratio} < {required}")]
    OpeningRatioNotMet { ratio: Decimal, required: Decimal },

    #[error("Variable loan {0:?} not found")]
    LoanNotFound(VariableLoanId),

    #[error("Variable loan {0:?} already repaid")]
    AlreadyRepaid(VariableLoanId),

    #[error("Pool ledger: {0}")]
    Ledger(#[from] LedgerError),
}
