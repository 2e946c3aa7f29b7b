// 8.4 orderbook/liquidations.rs: the three ways an undercollateralized position is closed.
//
// liquidate_loan: a third party repays the FOL and takes its assigned collateral plus a premium.
// liquidate_loan_with_replacement: same, but the FOL stays alive under a new borrower drawn
// from a borrow offer, and the rate spread is the replacement profit.
// self_liquidate: a lender whose credit is underwater takes the pro-rata collateral and
// writes its credit off the tree.

use super::core::{user_mut, venue_mut, LendingOrderBook};
use super::results::{LendingError, LiquidationResult, ReplacementResult, SelfLiquidationResult};
use crate::events::{EventPayload, LiquidatedEvent, LiquidatedWithReplacementEvent, SelfLiquidatedEvent};
use crate::types::{BorrowOfferId, LoanId, UserId};
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
struct LiquidationPlan {
    loan_id: LoanId,
    liquidator: UserId,
    borrower: UserId,
    face_value: Decimal,
    assigned_collateral: Decimal,
    to_liquidator: Decimal,
    to_borrower: Decimal,
    to_protocol: Decimal,
}

#[derive(Debug, Clone)]
struct ReplacementPlan {
    liquidation: LiquidationPlan,
    offer_id: BorrowOfferId,
    new_borrower: UserId,
    amount_out: Decimal,
    profit_to_protocol: Decimal,
    profit_to_liquidator: Decimal,
}

#[derive(Debug, Clone)]
struct SelfLiquidationPlan {
    loan_id: LoanId,
    lender: UserId,
    borrower: UserId,
    collateral: Decimal,
    credit: Decimal,
    ancestors: Vec<LoanId>,
}

impl LendingOrderBook {
    /// Liquidates an unrepaid FOL whose borrower is below the liquidation ratio.
    ///
    /// The liquidator pays the face value from its personal cash and receives the
    /// collateral covering the debt plus its share of the remaining assigned
    /// collateral. The borrower keeps its rebate share, the protocol keeps the rest.
    pub fn liquidate_loan(&mut self, liquidator: UserId, loan_id: LoanId) -> Result<LiquidationResult, LendingError> {
        let plan = self
            .plan_liquidation(liquidator, loan_id)
            .map_err(|e| self.rejected("liquidate_loan", e))?;

        self.apply_liquidation(&plan);
        self.loans.get_mut(loan_id).mark_repaid();

        Ok(self.liquidation_result(&plan))
    }

    fn plan_liquidation(&self, liquidator: UserId, loan_id: LoanId) -> Result<LiquidationPlan, LendingError> {
        let fol = self.loans.get_fol(loan_id)?;
        if self.loans.is_repaid(loan_id)? {
            return Err(LendingError::AlreadyRepaid(loan_id));
        }
        if !self.is_borrower_liquidatable(fol.borrower)? {
            return Err(LendingError::NotLiquidatable(loan_id));
        }

        let assigned_collateral = self.get_fol_assigned_collateral(loan_id)?;
        let debt_coverage = fol.debt_in_collateral(self.context.price());
        if assigned_collateral < debt_coverage {
            return Err(LendingError::LiquidationAtLoss {
                assigned: assigned_collateral,
                required: debt_coverage,
            });
        }
        self.user(liquidator)?.cash.can_transfer(fol.face_value)?;

        let remaining = assigned_collateral - debt_coverage;
        let split = &self.market.liquidation;
        let to_liquidator = debt_coverage + remaining * split.collateral_perc_premium_to_liquidator;
        let to_borrower = remaining * split.collateral_perc_premium_to_borrower;
        let to_protocol = remaining * split.collateral_perc_to_protocol();
        self.collateral.can_transfer(to_liquidator)?;

        Ok(LiquidationPlan {
            loan_id,
            liquidator,
            borrower: fol.borrower,
            face_value: fol.face_value,
            assigned_collateral,
            to_liquidator,
            to_borrower,
            to_protocol,
        })
    }

    // settles the debt and splits the collateral. the caller decides what happens to the FOL
    fn apply_liquidation(&mut self, plan: &LiquidationPlan) {
        let liquidator = user_mut(&mut self.users, plan.liquidator);
        liquidator.cash.settle_transfer(&mut self.cash, plan.face_value);
        self.collateral
            .settle_transfer(&mut liquidator.collateral, plan.to_liquidator);

        venue_mut(&mut self.venue, plan.borrower).add_collateral(-(plan.to_liquidator + plan.to_protocol));
        self.liquidation_profit_collateral += plan.to_protocol;
        user_mut(&mut self.users, plan.borrower).reduce_debt(plan.face_value);

        tracing::info!(
            loan_id = %plan.loan_id,
            liquidator = %plan.liquidator,
            borrower = %plan.borrower,
            debt = %plan.face_value,
            collateral = %plan.to_liquidator,
            "loan liquidated"
        );
        self.emit_event(EventPayload::Liquidated(LiquidatedEvent {
            loan_id: plan.loan_id,
            liquidator: plan.liquidator,
            borrower: plan.borrower,
            debt: plan.face_value,
            collateral_to_liquidator: plan.to_liquidator,
            collateral_to_borrower: plan.to_borrower,
            collateral_to_protocol: plan.to_protocol,
        }));
    }

    fn liquidation_result(&self, plan: &LiquidationPlan) -> LiquidationResult {
        LiquidationResult {
            loan_id: plan.loan_id,
            liquidator: plan.liquidator,
            borrower: plan.borrower,
            debt: plan.face_value,
            assigned_collateral: plan.assigned_collateral,
            collateral_to_liquidator: plan.to_liquidator,
            collateral_to_borrower: plan.to_borrower,
            collateral_to_protocol: plan.to_protocol,
        }
    }

    /// Liquidates the FOL and hands its debt to the borrower of `borrow_offer_id`
    /// at the offer's rate for the remaining term. The FOL's lender is untouched.
    /// Both legs are validated before either is applied.
    pub fn liquidate_loan_with_replacement(
        &mut self,
        liquidator: UserId,
        loan_id: LoanId,
        borrow_offer_id: BorrowOfferId,
    ) -> Result<ReplacementResult, LendingError> {
        let plan = self
            .plan_replacement(liquidator, loan_id, borrow_offer_id)
            .map_err(|e| self.rejected("liquidate_loan_with_replacement", e))?;
        let liquidation = &plan.liquidation;

        self.apply_liquidation(liquidation);

        let face_value = liquidation.face_value;
        self.loans.get_mut(loan_id).borrower = plan.new_borrower;
        let new_borrower = user_mut(&mut self.users, plan.new_borrower);
        new_borrower.add_debt(face_value);
        self.cash.settle_transfer(&mut new_borrower.cash, plan.amount_out);
        if let Some(offer) = self.borrow_offers.get_mut(&plan.offer_id) {
            offer.fill(plan.amount_out);
        }

        self.liquidation_profit_cash += plan.profit_to_protocol;
        venue_mut(&mut self.venue, plan.liquidation.liquidator).add_cash(plan.profit_to_liquidator);

        let replacement_profit = face_value - plan.amount_out;
        self.emit_event(EventPayload::LiquidatedWithReplacement(LiquidatedWithReplacementEvent {
            loan_id,
            liquidator: plan.liquidation.liquidator,
            new_borrower: plan.new_borrower,
            amount_out: plan.amount_out,
            replacement_profit,
        }));

        Ok(ReplacementResult {
            liquidation: self.liquidation_result(&plan.liquidation),
            new_borrower: plan.new_borrower,
            amount_out: plan.amount_out,
            replacement_profit,
            profit_to_protocol: plan.profit_to_protocol,
        })
    }

    fn plan_replacement(
        &self,
        liquidator: UserId,
        loan_id: LoanId,
        offer_id: BorrowOfferId,
    ) -> Result<ReplacementPlan, LendingError> {
        let liquidation = self.plan_liquidation(liquidator, loan_id)?;
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

        let face_value = liquidation.face_value;
        let amount_out = face_value / (Decimal::ONE + rate);
        if amount_out > offer.max_amount {
            return Err(LendingError::OfferCapacityExceeded {
                requested: amount_out,
                available: offer.max_amount,
            });
        }
        if face_value < amount_out {
            return Err(LendingError::ReplacementAtLoss { face_value, amount_out });
        }
        // the liquidated borrower is below the liquidation ratio already, so it never passes here
        if self.would_be_liquidatable(offer.borrower, face_value)? {
            return Err(LendingError::WouldBeLiquidatable(offer.borrower));
        }
        self.check_opening_collateral(offer.borrower, face_value)?;

        let profit = face_value - amount_out;
        let profit_to_protocol = profit * self.market.liquidation.replacement_profit_perc_to_protocol;
        Ok(ReplacementPlan {
            liquidation,
            offer_id,
            new_borrower: offer.borrower,
            amount_out,
            profit_to_protocol,
            profit_to_liquidator: profit - profit_to_protocol,
        })
    }

    /// Lets the lender of an underwater loan take its pro-rata share of the
    /// borrower's collateral in exchange for writing off the loan's credit.
    /// The write-off propagates up to the root FOL and the borrower's debt.
    pub fn self_liquidate(&mut self, lender: UserId, loan_id: LoanId) -> Result<SelfLiquidationResult, LendingError> {
        let plan = self
            .plan_self_liquidation(lender, loan_id)
            .map_err(|e| self.rejected("self_liquidate", e))?;

        venue_mut(&mut self.venue, plan.borrower).add_collateral(-plan.collateral);
        venue_mut(&mut self.venue, plan.lender).add_collateral(plan.collateral);

        self.loans.get_mut(plan.loan_id).reduce_face_value(plan.credit);
        for ancestor in &plan.ancestors {
            self.loans.get_mut(*ancestor).unwind_exit(plan.credit);
        }
        user_mut(&mut self.users, plan.borrower).reduce_debt(plan.credit);

        self.emit_event(EventPayload::SelfLiquidated(SelfLiquidatedEvent {
            loan_id: plan.loan_id,
            lender: plan.lender,
            borrower: plan.borrower,
            collateral: plan.collateral,
            face_value_removed: plan.credit,
        }));
        Ok(SelfLiquidationResult {
            loan_id: plan.loan_id,
            collateral: plan.collateral,
            face_value_removed: plan.credit,
        })
    }

    fn plan_self_liquidation(&self, lender: UserId, loan_id: LoanId) -> Result<SelfLiquidationPlan, LendingError> {
        let loan = self.loans.get(loan_id)?;
        if loan.lender != lender {
            return Err(LendingError::NotLender { loan_id, user: lender });
        }
        if self.loans.is_repaid(loan_id)? {
            return Err(LendingError::AlreadyRepaid(loan_id));
        }
        let credit = loan.credit();
        if credit.is_zero() {
            return Err(LendingError::NoCredit(loan_id));
        }

        let collateral = self.get_pro_rata_assigned_collateral(loan_id)?;
        let required = self.context.price().to_collateral(credit);
        if collateral >= required {
            return Err(LendingError::NotUnderwater {
                loan_id,
                assigned: collateral,
                required,
            });
        }

        Ok(SelfLiquidationPlan {
            loan_id,
            lender,
            borrower: self.loans.root_of(loan_id)?.borrower,
            collateral,
            credit,
            ancestors: self.loans.ancestors(loan_id)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::curve::YieldCurve;
    use crate::offer::{BorrowOffer, LoanOffer};
    use crate::orderbook::{LendingError, LendingOrderBook};
    use crate::types::{Currency, LoanId, Price, Timestamp, UserId};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    // bob lends 100 at 3% to alice, who has 2 collateral at price 100
    fn setup() -> (LendingOrderBook, UserId, UserId, LoanId) {
        let mut ob = LendingOrderBook::with_defaults(Price::new_unchecked(dec!(100)));
        let alice = ob.create_user(dec!(0), dec!(2)).unwrap();
        let bob = ob.create_user(dec!(100), dec!(0)).unwrap();
        ob.deposit(alice, dec!(2), Currency::Collateral).unwrap();
        ob.deposit(bob, dec!(100), Currency::Cash).unwrap();
        ob.lend_as_limit_order(LoanOffer::new(bob, dec!(100), Timestamp(10), YieldCurve::flat(dec!(0.03), 0..12)))
            .unwrap();
        let fol = ob
            .borrow_as_market_order(alice, bob, Timestamp(6), dec!(100), false, &[])
            .unwrap()
            .fol
            .unwrap();
        (ob, alice, bob, fol)
    }

    #[test]
    fn healthy_loan_not_liquidatable() {
        let (mut ob, _, _, fol) = setup();
        let liquidator = ob.create_user(dec!(200), dec!(0)).unwrap();
        let before = ob.clone();
        assert!(matches!(ob.liquidate_loan(liquidator, fol), Err(LendingError::NotLiquidatable(_))));
        assert_eq!(ob, before);
    }

    #[test]
    fn liquidation_splits_collateral() {
        let (mut ob, alice, _, fol) = setup();
        let liquidator = ob.create_user(dec!(200), dec!(0)).unwrap();
        ob.advance(Timestamp(1), Price::new_unchecked(dec!(60))).unwrap();
        assert!(ob.is_loan_liquidatable(fol).unwrap());

        let result = ob.liquidate_loan(liquidator, fol).unwrap();
        let debt_coverage = dec!(103) / dec!(60);
        let remaining = dec!(2) - debt_coverage;
        assert_eq!(result.assigned_collateral, dec!(2));
        assert_eq!(result.collateral_to_liquidator, debt_coverage + remaining * dec!(0.3));
        assert_eq!(result.collateral_to_protocol, remaining * dec!(0.6));

        assert!(!ob.is_borrower_liquidatable(alice).unwrap());
        assert_eq!(ob.user(alice).unwrap().debt(), Decimal::ZERO);
        assert_eq!(ob.user(liquidator).unwrap().cash.free, dec!(97));
        assert_eq!(ob.user(liquidator).unwrap().collateral.free, result.collateral_to_liquidator);
        assert_eq!(ob.liquidation_profit_collateral(), result.collateral_to_protocol);
        assert_eq!(
            ob.user_deposited_collateral(alice),
            dec!(2) - (result.collateral_to_liquidator + result.collateral_to_protocol)
        );
        assert_eq!(ob.loan_state(fol).unwrap(), crate::loan::LoanState::Repaid);
        assert!(!ob.is_loan_liquidatable(fol).unwrap());
    }

    #[test]
    fn liquidation_at_loss_rejected() {
        let (mut ob, _, _, fol) = setup();
        let liquidator = ob.create_user(dec!(200), dec!(0)).unwrap();
        ob.advance(Timestamp(1), Price::new_unchecked(dec!(30))).unwrap();
        assert!(matches!(
            ob.liquidate_loan(liquidator, fol),
            Err(LendingError::LiquidationAtLoss { .. })
        ));
    }

    #[test]
    fn liquidator_needs_face_value_in_cash() {
        let (mut ob, _, _, fol) = setup();
        let liquidator = ob.create_user(dec!(100), dec!(0)).unwrap();
        ob.advance(Timestamp(1), Price::new_unchecked(dec!(60))).unwrap();
        assert!(matches!(ob.liquidate_loan(liquidator, fol), Err(LendingError::Ledger(_))));
    }

    #[test]
    fn replacement_moves_debt_to_new_borrower() {
        let (mut ob, alice, bob, fol) = setup();
        let liquidator = ob.create_user(dec!(200), dec!(0)).unwrap();
        let candy = ob.create_user(dec!(0), dec!(10)).unwrap();
        ob.deposit(candy, dec!(10), Currency::Collateral).unwrap();
        let offer = ob
            .borrow_as_limit_order(BorrowOffer::new(candy, dec!(200), YieldCurve::flat(dec!(0.03), 0..12)))
            .unwrap();
        ob.advance(Timestamp(1), Price::new_unchecked(dec!(60))).unwrap();

        let result = ob.liquidate_loan_with_replacement(liquidator, fol, offer).unwrap();
        assert_eq!(result.amount_out, dec!(100));
        assert_eq!(result.replacement_profit, dec!(3));
        assert_eq!(result.profit_to_protocol, Decimal::ZERO);

        let loan = ob.loan(fol).unwrap();
        assert_eq!(loan.borrower, candy);
        assert_eq!(loan.lender, bob);
        assert_eq!(ob.loan_state(fol).unwrap(), crate::loan::LoanState::Active);
        assert_eq!(ob.user(candy).unwrap().debt(), dec!(103));
        assert_eq!(ob.user(candy).unwrap().cash.free, dec!(100));
        assert_eq!(ob.user(alice).unwrap().debt(), Decimal::ZERO);
        assert_eq!(ob.user_cash(liquidator), dec!(3));
        assert_eq!(ob.borrow_offer(offer).unwrap().max_amount, dec!(100));
    }

    #[test]
    fn replacement_rejected_atomically() {
        let (mut ob, _, _, fol) = setup();
        let liquidator = ob.create_user(dec!(200), dec!(0)).unwrap();
        // not enough collateral to take over 103 of debt
        let poor = ob.create_user(dec!(0), dec!(1)).unwrap();
        ob.deposit(poor, dec!(1), Currency::Collateral).unwrap();
        let offer = ob
            .borrow_as_limit_order(BorrowOffer::new(poor, dec!(200), YieldCurve::flat(dec!(0.03), 0..12)))
            .unwrap();
        ob.advance(Timestamp(1), Price::new_unchecked(dec!(60))).unwrap();

        let before = ob.clone();
        assert!(matches!(
            ob.liquidate_loan_with_replacement(liquidator, fol, offer),
            Err(LendingError::WouldBeLiquidatable(_))
        ));
        assert_eq!(ob, before);
    }

    #[test]
    fn self_liquidation_of_underwater_fol() {
        let (mut ob, alice, bob, fol) = setup();
        // not underwater at the opening price
        assert!(matches!(ob.self_liquidate(bob, fol), Err(LendingError::NotUnderwater { .. })));
        assert!(matches!(ob.self_liquidate(alice, fol), Err(LendingError::NotLender { .. })));

        ob.advance(Timestamp(1), Price::new_unchecked(dec!(30))).unwrap();
        let result = ob.self_liquidate(bob, fol).unwrap();
        assert_eq!(result.collateral, dec!(2));
        assert_eq!(result.face_value_removed, dec!(103));
        assert_eq!(ob.loan(fol).unwrap().face_value, Decimal::ZERO);
        assert_eq!(ob.user(alice).unwrap().debt(), Decimal::ZERO);
        assert_eq!(ob.user_free_collateral(bob), dec!(2));
        assert_eq!(ob.user_free_collateral(alice), Decimal::ZERO);
    }

    #[test]
    fn self_liquidation_of_partially_exited_fol_weighs_remaining_credit() {
        let (mut ob, alice, bob, fol) = setup();
        let candy = ob.create_user(dec!(100), dec!(0)).unwrap();
        ob.deposit(candy, dec!(100), Currency::Cash).unwrap();
        ob.lend_as_limit_order(LoanOffer::new(candy, dec!(100), Timestamp(10), YieldCurve::flat(dec!(0.03), 0..12)))
            .unwrap();
        let sol = ob
            .borrow_as_market_order(bob, candy, Timestamp(6), dec!(51.5), true, &[fol])
            .unwrap()
            .sols[0];
        assert_eq!(ob.loan(fol).unwrap().credit(), dec!(51.5));
        assert_eq!(ob.get_pro_rata_assigned_collateral(fol).unwrap(), dec!(1));

        // 1 collateral still covers bob's 51.5 of credit at 60, though not the full 103
        ob.advance(Timestamp(1), Price::new_unchecked(dec!(60))).unwrap();
        let before = ob.clone();
        match ob.self_liquidate(bob, fol) {
            Err(LendingError::NotUnderwater { assigned, required, .. }) => {
                assert_eq!(assigned, dec!(1));
                assert_eq!(required, dec!(51.5) / dec!(60));
            }
            other => panic!("expected NotUnderwater, got {other:?}"),
        }
        assert_eq!(ob, before);

        ob.advance(Timestamp(2), Price::new_unchecked(dec!(50))).unwrap();
        let result = ob.self_liquidate(bob, fol).unwrap();
        assert_eq!(result.collateral, dec!(1));
        assert_eq!(result.face_value_removed, dec!(51.5));

        // only bob's part is written off, candy's SOL still resolves through the FOL
        let parent = ob.loan(fol).unwrap();
        assert_eq!(parent.face_value, dec!(51.5));
        assert_eq!(parent.amount_exited, dec!(51.5));
        assert_eq!(parent.credit(), Decimal::ZERO);
        assert_eq!(ob.loan(sol).unwrap().credit(), dec!(51.5));
        assert_eq!(ob.user(alice).unwrap().debt(), dec!(51.5));
        assert_eq!(ob.user_free_collateral(bob), dec!(1));
        assert!(matches!(ob.self_liquidate(bob, fol), Err(LendingError::NoCredit(_))));
    }

    #[test]
    fn self_liquidation_of_sol_unwinds_parent() {
        let (mut ob, alice, bob, fol) = setup();
        // bob borrows from candy against his credit on the FOL
        let candy = ob.create_user(dec!(100), dec!(0)).unwrap();
        ob.deposit(candy, dec!(100), Currency::Cash).unwrap();
        ob.lend_as_limit_order(LoanOffer::new(candy, dec!(100), Timestamp(10), YieldCurve::flat(dec!(0.03), 0..12)))
            .unwrap();
        let result = ob
            .borrow_as_market_order(bob, candy, Timestamp(6), dec!(51.5), true, &[fol])
            .unwrap();
        let sol = result.sols[0];
        assert_eq!(ob.loan(sol).unwrap().face_value, dec!(51.5));

        ob.advance(Timestamp(1), Price::new_unchecked(dec!(30))).unwrap();
        let before = ob.clone();
        assert!(matches!(ob.self_liquidate(bob, sol), Err(LendingError::NotLender { .. })));
        assert_eq!(ob, before);

        let result = ob.self_liquidate(candy, sol).unwrap();
        assert_eq!(result.face_value_removed, dec!(51.5));
        assert_eq!(result.collateral, dec!(1));
        assert_eq!(ob.loan(sol).unwrap().face_value, Decimal::ZERO);

        // the parent keeps bob's unexited half
        let parent = ob.loan(fol).unwrap();
        assert_eq!(parent.face_value, dec!(51.5));
        assert_eq!(parent.amount_exited, Decimal::ZERO);
        assert_eq!(parent.credit(), dec!(51.5));
        assert_eq!(ob.user(alice).unwrap().debt(), dec!(51.5));
        assert_eq!(ob.user_free_collateral(candy), dec!(1));
    }
}
