//! Market order matching.
//!
//! A borrower taking a loan offer first spends virtual collateral (credit it
//! already holds as a lender on loans maturing no later than the new due date),
//! minting a SOL per consumed loan, and backs only the remainder with real
//! collateral through a new FOL. Each call is validated into a plan before any
//! balance moves.

use super::core::{check_positive, user_mut, LendingOrderBook};
use super::results::{LendingError, MarketOrderResult};
use crate::events::{BorrowerExitedEvent, EventPayload, FolCreatedEvent, SolCreatedEvent};
use crate::types::{BorrowOfferId, LoanId, Timestamp, UserId};
use rust_decimal::Decimal;
use std::collections::BTreeSet;

// one SOL carved out of an existing loan's credit
#[derive(Debug, Clone)]
struct VirtualLeg {
    source: LoanId,
    root: LoanId,
    face_value: Decimal,
    amount_out: Decimal,
}

#[derive(Debug, Clone)]
struct BorrowPlan {
    borrower: UserId,
    lender: UserId,
    due_date: Timestamp,
    legs: Vec<VirtualLeg>,
    // (face value, cash out) backed by real collateral
    remainder: Option<(Decimal, Decimal)>,
    amount_out: Decimal,
}

#[derive(Debug, Clone)]
struct LendPlan {
    lender: UserId,
    offer_id: BorrowOfferId,
    borrower: UserId,
    due_date: Timestamp,
    face_value: Decimal,
    amount_out: Decimal,
}

#[derive(Debug, Clone)]
struct ExitPlan {
    loan_id: LoanId,
    offer_id: BorrowOfferId,
    previous_borrower: UserId,
    new_borrower: UserId,
    face_value: Decimal,
    amount_in: Decimal,
}

impl LendingOrderBook {
    /// Borrows from `lender`'s standing offer.
    ///
    /// With `exact_amount_in`, `amount` is the face value owed at `due_date` and
    /// the cash received is `amount / (1 + rate)`; otherwise `amount` is the cash
    /// received and the face value is `amount * (1 + rate)`. Loans listed in
    /// `virtual_collateral_loan_ids` are consumed in order; ids not held by the
    /// borrower, maturing after `due_date`, already repaid, or repeated are skipped.
    pub fn borrow_as_market_order(
        &mut self,
        borrower: UserId,
        lender: UserId,
        due_date: Timestamp,
        amount: Decimal,
        exact_amount_in: bool,
        virtual_collateral_loan_ids: &[LoanId],
    ) -> Result<MarketOrderResult, LendingError> {
        let plan = self
            .plan_borrow(borrower, lender, due_date, amount, exact_amount_in, virtual_collateral_loan_ids)
            .map_err(|e| self.rejected("borrow_as_market_order", e))?;
        Ok(self.apply_borrow(plan))
    }

    fn plan_borrow(
        &self,
        borrower: UserId,
        lender: UserId,
        due_date: Timestamp,
        amount: Decimal,
        exact_amount_in: bool,
        virtual_collateral_loan_ids: &[LoanId],
    ) -> Result<BorrowPlan, LendingError> {
        check_positive(amount)?;
        self.user(borrower)?;
        let offer = self
            .loan_offers
            .get(&lender)
            .ok_or(LendingError::LoanOfferNotFound(lender))?;
        self.check_due_date(due_date)?;
        let now = self.context.time();
        if due_date > offer.max_due_date {
            return Err(LendingError::DueDateBeyondOffer {
                due_date,
                max_due_date: offer.max_due_date,
            });
        }
        if amount > offer.max_amount {
            return Err(LendingError::OfferCapacityExceeded {
                requested: amount,
                available: offer.max_amount,
            });
        }
        let rate = offer
            .rate_at(now, due_date)
            .ok_or(LendingError::RateNotFound { due_date })?;
        let r = Decimal::ONE + rate;

        let (mut in_left, mut out_left) = if exact_amount_in {
            (amount, amount / r)
        } else {
            (amount * r, amount)
        };

        let mut legs = Vec::new();
        let mut seen = BTreeSet::new();
        for &loan_id in virtual_collateral_loan_ids {
            if in_left.is_zero() {
                break;
            }
            let loan = self.loans.get(loan_id)?;
            if loan.lender != borrower || !seen.insert(loan_id) {
                tracing::debug!(%loan_id, %borrower, "skipping virtual collateral not held by borrower");
                continue;
            }
            if self.loans.due_date(loan_id)? > due_date || self.loans.is_repaid(loan_id)? {
                tracing::debug!(%loan_id, "skipping virtual collateral maturing after due date");
                continue;
            }
            let credit = loan.credit();
            if credit.is_zero() {
                continue;
            }
            let delta_in = in_left.min(credit);
            // the last leg takes whatever cash is left so the totals stay exact
            let delta_out = if delta_in == in_left { out_left } else { delta_in / r };
            loan.can_lock(delta_in)?;
            legs.push(VirtualLeg {
                source: loan_id,
                root: loan.root_id(),
                face_value: delta_in,
                amount_out: delta_out,
            });
            in_left -= delta_in;
            out_left -= delta_out;
        }

        let remainder = if in_left > Decimal::ZERO {
            if self.would_be_liquidatable(borrower, in_left)? {
                return Err(LendingError::WouldBeLiquidatable(borrower));
            }
            self.check_opening_collateral(borrower, in_left)?;
            Some((in_left, out_left))
        } else {
            None
        };

        let amount_out = legs.iter().map(|l| l.amount_out).sum::<Decimal>() + remainder.map_or(Decimal::ZERO, |(_, out)| out);
        if amount_out > offer.max_amount {
            return Err(LendingError::OfferCapacityExceeded {
                requested: amount_out,
                available: offer.max_amount,
            });
        }
        self.check_lend_cash(lender, amount_out)?;

        Ok(BorrowPlan {
            borrower,
            lender,
            due_date,
            legs,
            remainder,
            amount_out,
        })
    }

    fn apply_borrow(&mut self, plan: BorrowPlan) -> MarketOrderResult {
        let mut sols = Vec::with_capacity(plan.legs.len());
        let mut face_value = Decimal::ZERO;

        for leg in &plan.legs {
            self.loans.get_mut(leg.source).lock(leg.face_value);
            let sol_id = self.loans.create_sol(leg.source, plan.lender, plan.borrower, leg.face_value);
            self.lend_cash(plan.lender, plan.borrower, leg.amount_out);
            face_value += leg.face_value;
            sols.push(sol_id);

            self.emit_event(EventPayload::SolCreated(SolCreatedEvent {
                loan_id: sol_id,
                parent: leg.source,
                root: leg.root,
                lender: plan.lender,
                borrower: plan.borrower,
                face_value: leg.face_value,
            }));
        }

        let mut fol = None;
        if let Some((fv, out)) = plan.remainder {
            let fol_id = self.loans.create_fol(plan.lender, plan.borrower, fv, plan.due_date);
            user_mut(&mut self.users, plan.borrower).add_debt(fv);
            self.lend_cash(plan.lender, plan.borrower, out);
            face_value += fv;
            self.emit_event(EventPayload::FolCreated(FolCreatedEvent {
                loan_id: fol_id,
                lender: plan.lender,
                borrower: plan.borrower,
                face_value: fv,
                due_date: plan.due_date,
                amount_out: out,
            }));
            fol = Some(fol_id);
        }

        if let Some(offer) = self.loan_offers.get_mut(&plan.lender) {
            offer.fill(plan.amount_out);
        }

        MarketOrderResult {
            sols,
            fol,
            face_value,
            amount_out: plan.amount_out,
        }
    }

    /// Lends into a standing borrow offer.
    ///
    /// With `exact_amount_in`, `amount` is the cash lent and the face value is
    /// `amount * (1 + rate)`; otherwise `amount` is the face value and the cash
    /// lent is `amount / (1 + rate)`.
    pub fn lend_as_market_order(
        &mut self,
        lender: UserId,
        borrow_offer_id: BorrowOfferId,
        due_date: Timestamp,
        amount: Decimal,
        exact_amount_in: bool,
    ) -> Result<MarketOrderResult, LendingError> {
        let plan = self
            .plan_lend(lender, borrow_offer_id, due_date, amount, exact_amount_in)
            .map_err(|e| self.rejected("lend_as_market_order", e))?;

        let fol_id = self.loans.create_fol(plan.lender, plan.borrower, plan.face_value, plan.due_date);
        user_mut(&mut self.users, plan.borrower).add_debt(plan.face_value);
        self.lend_cash(plan.lender, plan.borrower, plan.amount_out);
        if let Some(offer) = self.borrow_offers.get_mut(&plan.offer_id) {
            offer.fill(plan.amount_out);
        }
        self.emit_event(EventPayload::FolCreated(FolCreatedEvent {
            loan_id: fol_id,
            lender: plan.lender,
            borrower: plan.borrower,
            face_value: plan.face_value,
            due_date: plan.due_date,
            amount_out: plan.amount_out,
        }));

        Ok(MarketOrderResult {
            sols: Vec::new(),
            fol: Some(fol_id),
            face_value: plan.face_value,
            amount_out: plan.amount_out,
        })
    }

    fn plan_lend(
        &self,
        lender: UserId,
        offer_id: BorrowOfferId,
        due_date: Timestamp,
        amount: Decimal,
        exact_amount_in: bool,
    ) -> Result<LendPlan, LendingError> {
        check_positive(amount)?;
        self.user(lender)?;
        let offer = self
            .borrow_offers
            .get(&offer_id)
            .ok_or(LendingError::BorrowOfferNotFound(offer_id))?;
        self.check_due_date(due_date)?;
        let now = self.context.time();
        let rate = offer
            .rate_at(now, due_date)
            .ok_or(LendingError::RateNotFound { due_date })?;
        let r = Decimal::ONE + rate;
        let (face_value, amount_out) = if exact_amount_in {
            (amount * r, amount)
        } else {
            (amount, amount / r)
        };
        if amount_out > offer.max_amount {
            return Err(LendingError::OfferCapacityExceeded {
                requested: amount_out,
                available: offer.max_amount,
            });
        }
        self.check_lend_cash(lender, amount_out)?;
        if self.would_be_liquidatable(offer.borrower, face_value)? {
            return Err(LendingError::WouldBeLiquidatable(offer.borrower));
        }
        self.check_opening_collateral(offer.borrower, face_value)?;

        Ok(LendPlan {
            lender,
            offer_id,
            borrower: offer.borrower,
            due_date,
            face_value,
            amount_out,
        })
    }

    /// Hands the FOL's debt to the borrower behind `borrow_offer_id`.
    ///
    /// The exiting borrower pays `FV / (1 + rate)` from venue cash to the new
    /// borrower; the FOL keeps its lender, face value and due date.
    pub fn borrower_exit(&mut self, loan_id: LoanId, borrow_offer_id: BorrowOfferId) -> Result<(), LendingError> {
        let plan = self
            .plan_exit(loan_id, borrow_offer_id)
            .map_err(|e| self.rejected("borrower_exit", e))?;

        self.lend_cash(plan.previous_borrower, plan.new_borrower, plan.amount_in);
        user_mut(&mut self.users, plan.new_borrower).add_debt(plan.face_value);
        user_mut(&mut self.users, plan.previous_borrower).reduce_debt(plan.face_value);
        self.loans.get_mut(plan.loan_id).borrower = plan.new_borrower;
        if let Some(offer) = self.borrow_offers.get_mut(&plan.offer_id) {
            offer.fill(plan.amount_in);
        }

        self.emit_event(EventPayload::BorrowerExited(BorrowerExitedEvent {
            loan_id: plan.loan_id,
            previous_borrower: plan.previous_borrower,
            new_borrower: plan.new_borrower,
            amount_in: plan.amount_in,
        }));
        Ok(())
    }

    fn plan_exit(&self, loan_id: LoanId, offer_id: BorrowOfferId) -> Result<ExitPlan, LendingError> {
        let fol = self.loans.get_fol(loan_id)?;
        if self.loans.is_repaid(loan_id)? {
            return Err(LendingError::AlreadyRepaid(loan_id));
        }
        let offer = self
            .borrow_offers
            .get(&offer_id)
            .ok_or(LendingError::BorrowOfferNotFound(offer_id))?;
        let due_date = self.loans.due_date(loan_id)?;
        let now = self.context.time();
        if due_date <= now {
            return Err(LendingError::DueDateNotInFuture { due_date, now });
        }
        let rate = offer
            .rate_at(now, due_date)
            .ok_or(LendingError::RateNotFound { due_date })?;
        let face_value = fol.face_value;
        let amount_in = face_value / (Decimal::ONE + rate);
        if amount_in > offer.max_amount {
            return Err(LendingError::OfferCapacityExceeded {
                requested: amount_in,
                available: offer.max_amount,
            });
        }
        self.check_lend_cash(fol.borrower, amount_in)?;
        if self.would_be_liquidatable(offer.borrower, face_value)? {
            return Err(LendingError::WouldBeLiquidatable(offer.borrower));
        }
        self.check_opening_collateral(offer.borrower, face_value)?;

        Ok(ExitPlan {
            loan_id,
            offer_id,
            previous_borrower: fol.borrower,
            new_borrower: offer.borrower,
            face_value,
            amount_in,
        })
    }
}
