//! Read-only queries: balances, collateral ratios, assigned collateral, virtual collateral.

use super::core::LendingOrderBook;
use super::results::LendingError;
use crate::ledger::LedgerAccount;
use crate::loan::{Loan, LoanState};
use crate::offer::{BorrowOffer, LoanOffer};
use crate::types::{BorrowOfferId, LoanId, Timestamp, UserId, VariableLoanId};
use crate::variable_pool::VariablePool;
use rust_decimal::Decimal;

impl LendingOrderBook {
    pub fn user_cash(&self, user: UserId) -> Decimal {
        self.venue_of(user).cash
    }

    pub fn user_deposited_collateral(&self, user: UserId) -> Decimal {
        self.venue_of(user).collateral_deposited
    }

    pub fn user_locked_collateral(&self, user: UserId) -> Decimal {
        self.venue_of(user).collateral_locked_by_pool
    }

    pub fn user_free_collateral(&self, user: UserId) -> Decimal {
        self.venue_of(user).free_collateral()
    }

    pub fn cash_reserve(&self) -> &LedgerAccount {
        &self.cash
    }

    pub fn collateral_reserve(&self) -> &LedgerAccount {
        &self.collateral
    }

    pub fn liquidation_profit_cash(&self) -> Decimal {
        self.liquidation_profit_cash
    }

    pub fn liquidation_profit_collateral(&self) -> Decimal {
        self.liquidation_profit_collateral
    }

    pub fn loan(&self, id: LoanId) -> Result<&Loan, LendingError> {
        Ok(self.loans.get(id)?)
    }

    pub fn loans(&self) -> impl Iterator<Item = &Loan> {
        self.loans.iter()
    }

    pub fn loan_state(&self, id: LoanId) -> Result<LoanState, LendingError> {
        Ok(self.loans.state(id, self.context.time())?)
    }

    pub fn loan_due_date(&self, id: LoanId) -> Result<Timestamp, LendingError> {
        Ok(self.loans.due_date(id)?)
    }

    pub fn loan_offer(&self, lender: UserId) -> Option<&LoanOffer> {
        self.loan_offers.get(&lender)
    }

    pub fn borrow_offer(&self, id: BorrowOfferId) -> Option<&BorrowOffer> {
        self.borrow_offers.get(&id)
    }

    pub fn variable_pool(&self) -> &VariablePool {
        &self.variable_pool
    }

    /// Free collateral value over aggregate debt. `Decimal::MAX` when there is no debt.
    pub fn get_borrower_collateral_ratio(&self, borrower: UserId) -> Result<Decimal, LendingError> {
        let debt = self.user(borrower)?.debt();
        Ok(self.collateral_ratio(self.user_free_collateral(borrower), debt))
    }

    pub fn is_borrower_liquidatable(&self, borrower: UserId) -> Result<bool, LendingError> {
        self.would_be_liquidatable(borrower, Decimal::ZERO)
    }

    pub fn is_loan_liquidatable(&self, loan_id: LoanId) -> Result<bool, LendingError> {
        if self.loans.is_repaid(loan_id)? {
            return Ok(false);
        }
        let borrower = self.loans.root_of(loan_id)?.borrower;
        self.is_borrower_liquidatable(borrower)
    }

    /// Share of the borrower's free collateral backing this FOL, proportional to its face value.
    pub fn get_fol_assigned_collateral(&self, loan_id: LoanId) -> Result<Decimal, LendingError> {
        let fol = self.loans.get_fol(loan_id)?;
        let debt = self.user(fol.borrower)?.debt();
        if debt.is_zero() {
            return Ok(Decimal::ZERO);
        }
        let free = self.user_free_collateral(fol.borrower);
        // rounding must never assign more than the borrower holds
        Ok((free * fol.face_value / debt).min(free))
    }

    /// Share of the root FOL's assigned collateral backing this loan's credit.
    pub fn get_pro_rata_assigned_collateral(&self, loan_id: LoanId) -> Result<Decimal, LendingError> {
        let loan = self.loans.get(loan_id)?;
        let fol = self.loans.root_of(loan_id)?;
        if fol.face_value.is_zero() {
            return Ok(Decimal::ZERO);
        }
        let fol_collateral = self.get_fol_assigned_collateral(fol.id)?;
        Ok((fol_collateral * loan.credit() / fol.face_value).min(fol_collateral))
    }

    /// Credit the user holds as lender on unrepaid loans due at or before `due_date`.
    pub fn get_user_virtual_collateral_per_date(&self, user: UserId, due_date: Timestamp) -> Result<Decimal, LendingError> {
        let mut total = Decimal::ZERO;
        for loan in self.loans.iter().filter(|l| l.lender == user) {
            if !self.loans.is_repaid(loan.id)? && self.loans.due_date(loan.id)? <= due_date {
                total += loan.credit();
            }
        }
        Ok(total)
    }

    pub fn get_user_virtual_collateral_in_range(
        &self,
        user: UserId,
        due_dates: &[Timestamp],
    ) -> Result<Vec<Decimal>, LendingError> {
        due_dates
            .iter()
            .map(|due| self.get_user_virtual_collateral_per_date(user, *due))
            .collect()
    }

    pub fn is_variable_loan_liquidatable(&self, id: VariableLoanId) -> Result<bool, LendingError> {
        Ok(self.variable_pool.is_liquidatable(
            id,
            self.context.time(),
            self.context.price(),
            self.context.params.cr_liquidation,
        )?)
    }

    pub(super) fn collateral_ratio(&self, free_collateral: Decimal, debt: Decimal) -> Decimal {
        if debt.is_zero() {
            return Decimal::MAX;
        }
        self.context.price().to_cash(free_collateral) / debt
    }

    pub(super) fn ratio_below_liquidation(&self, free_collateral: Decimal, debt: Decimal) -> bool {
        self.collateral_ratio(free_collateral, debt) < self.context.params.cr_liquidation
    }

    // liquidatable once `extra_debt` more face value is added to the borrower
    pub(super) fn would_be_liquidatable(&self, borrower: UserId, extra_debt: Decimal) -> Result<bool, LendingError> {
        let debt = self.user(borrower)?.debt() + extra_debt;
        Ok(self.ratio_below_liquidation(self.user_free_collateral(borrower), debt))
    }

    pub(super) fn check_opening_collateral(&self, borrower: UserId, face_value: Decimal) -> Result<(), LendingError> {
        let required = self.context.opening_collateral_for(face_value);
        let available = self.user_free_collateral(borrower);
        if available < required {
            return Err(LendingError::OpeningCollateralNotMet { required, available });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::orderbook::LendingOrderBook;
    use crate::types::{Currency, Price, Timestamp};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[test]
    fn no_debt_means_infinite_ratio() {
        let mut ob = LendingOrderBook::with_defaults(Price::new_unchecked(dec!(100)));
        let alice = ob.create_user(dec!(0), dec!(1)).unwrap();
        ob.deposit(alice, dec!(1), Currency::Collateral).unwrap();
        assert_eq!(ob.get_borrower_collateral_ratio(alice).unwrap(), Decimal::MAX);
        assert!(!ob.is_borrower_liquidatable(alice).unwrap());
        assert_eq!(
            ob.get_user_virtual_collateral_in_range(alice, &[Timestamp(1), Timestamp(5)]).unwrap(),
            vec![Decimal::ZERO, Decimal::ZERO]
        );
    }
}
