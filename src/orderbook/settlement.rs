//! Repayment, claims, debt compensation and maturity rollover.

use super::core::{check_positive, user_mut, venue_mut, LendingOrderBook};
use super::results::{CompensationResult, LendingError};
use crate::events::{
    ClaimedEvent, CompensatedEvent, EventPayload, MovedToVariablePoolEvent, RepaidEvent, VariableLoanRepaidEvent,
};
use crate::loan::LoanState;
use crate::types::{LoanId, UserId, VariableLoanId};
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
struct CompensationPlan {
    loan_to_repay: LoanId,
    loan_to_compensate: LoanId,
    repay_lender: UserId,
    repay_borrower: UserId,
    amount: Decimal,
}

#[derive(Debug, Clone)]
struct RolloverPlan {
    loan_id: LoanId,
    borrower: UserId,
    face_value: Decimal,
    assigned_collateral: Decimal,
}

impl LendingOrderBook {
    /// Repays a FOL in full from the borrower's personal cash.
    pub fn repay(&mut self, loan_id: LoanId) -> Result<(), LendingError> {
        let (borrower, face_value) = self
            .plan_repay(loan_id)
            .map_err(|e| self.rejected("repay", e))?;

        let wallet = user_mut(&mut self.users, borrower);
        wallet.cash.settle_transfer(&mut self.cash, face_value);
        wallet.reduce_debt(face_value);
        self.loans.get_mut(loan_id).mark_repaid();

        self.emit_event(EventPayload::Repaid(RepaidEvent {
            loan_id,
            borrower,
            amount: face_value,
        }));
        Ok(())
    }

    fn plan_repay(&self, loan_id: LoanId) -> Result<(UserId, Decimal), LendingError> {
        let fol = self.loans.get_fol(loan_id)?;
        if self.loans.is_repaid(loan_id)? {
            return Err(LendingError::AlreadyRepaid(loan_id));
        }
        self.user(fol.borrower)?.cash.can_transfer(fol.face_value)?;
        Ok((fol.borrower, fol.face_value))
    }

    /// Credits the lender's venue cash with the remaining credit of a repaid loan.
    pub fn claim(&mut self, loan_id: LoanId) -> Result<Decimal, LendingError> {
        let state = self
            .loan_state(loan_id)
            .map_err(|e| self.rejected("claim", e))?;
        if state != LoanState::Repaid {
            return Err(self.rejected("claim", LendingError::InvalidLoanState { loan_id, state }));
        }

        let loan = self.loans.get_mut(loan_id);
        let lender = loan.lender;
        let amount = loan.settle_claim();
        venue_mut(&mut self.venue, lender).add_cash(amount);

        self.emit_event(EventPayload::Claimed(ClaimedEvent { loan_id, lender, amount }));
        Ok(amount)
    }

    /// Nets the borrower's debt on `loan_to_repay` against credit it holds on
    /// `loan_to_compensate`. The netted credit is re-issued as a SOL to the
    /// lender of `loan_to_repay`. No cash moves.
    pub fn compensate(
        &mut self,
        loan_to_repay: LoanId,
        loan_to_compensate: LoanId,
        amount: Option<Decimal>,
    ) -> Result<CompensationResult, LendingError> {
        let plan = self
            .plan_compensate(loan_to_repay, loan_to_compensate, amount)
            .map_err(|e| self.rejected("compensate", e))?;

        self.loans.get_mut(plan.loan_to_repay).reduce_face_value(plan.amount);
        user_mut(&mut self.users, plan.repay_borrower).reduce_debt(plan.amount);
        self.loans.get_mut(plan.loan_to_compensate).lock(plan.amount);
        let new_loan = self
            .loans
            .create_sol(plan.loan_to_compensate, plan.repay_lender, plan.repay_borrower, plan.amount);

        self.emit_event(EventPayload::Compensated(CompensatedEvent {
            loan_to_repay: plan.loan_to_repay,
            loan_to_compensate: plan.loan_to_compensate,
            amount: plan.amount,
            new_loan,
        }));
        Ok(CompensationResult {
            amount: plan.amount,
            new_loan,
        })
    }

    fn plan_compensate(
        &self,
        loan_to_repay: LoanId,
        loan_to_compensate: LoanId,
        requested: Option<Decimal>,
    ) -> Result<CompensationPlan, LendingError> {
        let repay = self.loans.get_fol(loan_to_repay)?;
        let compensate = self.loans.get(loan_to_compensate)?;
        if loan_to_repay == loan_to_compensate || compensate.lender != repay.borrower {
            return Err(LendingError::CompensationMismatch {
                loan_to_repay,
                loan_to_compensate,
            });
        }
        if self.loans.is_repaid(loan_to_repay)? {
            return Err(LendingError::AlreadyRepaid(loan_to_repay));
        }
        if self.loans.is_repaid(loan_to_compensate)? {
            return Err(LendingError::AlreadyRepaid(loan_to_compensate));
        }
        let repay_due = self.loans.due_date(loan_to_repay)?;
        let compensate_due = self.loans.due_date(loan_to_compensate)?;
        if repay_due < compensate_due {
            return Err(LendingError::DueDateIncompatible {
                repay_due,
                compensate_due,
            });
        }

        let available = repay.credit().min(compensate.credit());
        let amount = requested.unwrap_or(available);
        if amount > available {
            return Err(LendingError::CompensationTooLarge {
                requested: amount,
                available,
            });
        }
        check_positive(amount)?;
        compensate.can_lock(amount)?;

        Ok(CompensationPlan {
            loan_to_repay,
            loan_to_compensate,
            repay_lender: repay.lender,
            repay_borrower: repay.borrower,
            amount,
        })
    }

    /// Rolls an overdue FOL into the variable pool. The pool pays the face value
    /// into the order book, takes the FOL's assigned collateral, and the FOL
    /// counts as repaid from then on.
    pub fn move_to_variable_pool(&mut self, loan_id: LoanId) -> Result<VariableLoanId, LendingError> {
        let plan = self
            .plan_rollover(loan_id)
            .map_err(|e| self.rejected("move_to_variable_pool", e))?;

        let price = self.context.price();
        let cr_opening = self.context.params.cr_opening;
        let now = self.context.time();
        let variable_loan_id = match self.variable_pool.borrow(
            plan.borrower,
            plan.face_value,
            plan.assigned_collateral,
            price,
            cr_opening,
            now,
            &mut self.cash,
            &mut self.collateral,
        ) {
            Ok(id) => id,
            Err(e) => panic!("validated variable pool borrow failed: {e}"),
        };
        venue_mut(&mut self.venue, plan.borrower).lock_by_pool(plan.assigned_collateral);
        user_mut(&mut self.users, plan.borrower).reduce_debt(plan.face_value);
        self.loans.get_mut(plan.loan_id).mark_repaid();

        self.emit_event(EventPayload::MovedToVariablePool(MovedToVariablePoolEvent {
            loan_id: plan.loan_id,
            variable_loan_id,
            borrower: plan.borrower,
            amount: plan.face_value,
            collateral: plan.assigned_collateral,
        }));
        Ok(variable_loan_id)
    }

    fn plan_rollover(&self, loan_id: LoanId) -> Result<RolloverPlan, LendingError> {
        let fol = self.loans.get_fol(loan_id)?;
        if self.loans.is_repaid(loan_id)? {
            return Err(LendingError::AlreadyRepaid(loan_id));
        }
        if !self.loans.is_overdue(loan_id, self.context.time())? {
            return Err(LendingError::NotOverdue(loan_id));
        }
        let assigned_collateral = self.get_fol_assigned_collateral(loan_id)?;
        self.variable_pool.can_borrow(
            fol.face_value,
            assigned_collateral,
            self.context.price(),
            self.context.params.cr_opening,
            &self.collateral,
        )?;
        Ok(RolloverPlan {
            loan_id,
            borrower: fol.borrower,
            face_value: fol.face_value,
            assigned_collateral,
        })
    }

    /// Settles a variable loan from the borrower's venue cash at its index-scaled
    /// debt and releases the collateral the pool held.
    pub fn repay_variable_loan(&mut self, id: VariableLoanId) -> Result<Decimal, LendingError> {
        let now = self.context.time();
        let borrower = self
            .plan_variable_repay(id)
            .map_err(|e| self.rejected("repay_variable_loan", e))?;

        let repayment = match self
            .variable_pool
            .repay(id, now, &mut self.cash, &mut self.collateral)
        {
            Ok(r) => r,
            Err(e) => panic!("validated variable pool repay failed: {e}"),
        };
        let venue = venue_mut(&mut self.venue, borrower);
        venue.add_cash(-repayment.debt);
        venue.lock_by_pool(-repayment.collateral);

        self.emit_event(EventPayload::VariableLoanRepaid(VariableLoanRepaidEvent {
            variable_loan_id: id,
            borrower,
            debt: repayment.debt,
            collateral: repayment.collateral,
        }));
        Ok(repayment.debt)
    }

    fn plan_variable_repay(&self, id: VariableLoanId) -> Result<UserId, LendingError> {
        let borrower = self.variable_pool.loan(id)?.borrower;
        let repayment = self.variable_pool.can_repay(id, self.context.time(), &self.cash)?;
        let available = self.user_cash(borrower);
        if available < repayment.debt {
            return Err(LendingError::InsufficientCash {
                user: borrower,
                requested: repayment.debt,
                available,
            });
        }
        Ok(borrower)
    }
}
