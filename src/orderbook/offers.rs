//! Limit orders: standing loan and borrow offers.

use super::core::{check_positive, LendingOrderBook};
use super::results::LendingError;
use crate::events::{BorrowOfferPostedEvent, EventPayload, LoanOfferPostedEvent};
use crate::offer::{BorrowOffer, LoanOffer};
use crate::types::BorrowOfferId;

impl LendingOrderBook {
    /// Posts the lender's standing offer. One offer per lender, a new one replaces the old.
    pub fn lend_as_limit_order(&mut self, offer: LoanOffer) -> Result<(), LendingError> {
        let check = self
            .user(offer.lender)
            .and_then(|_| check_positive(offer.max_amount));
        if let Err(e) = check {
            return Err(self.rejected("lend_as_limit_order", e));
        }

        let payload = EventPayload::LoanOfferPosted(LoanOfferPostedEvent {
            lender: offer.lender,
            max_amount: offer.max_amount,
            max_due_date: offer.max_due_date,
        });
        self.loan_offers.insert(offer.lender, offer);
        self.emit_event(payload);
        Ok(())
    }

    pub fn borrow_as_limit_order(&mut self, offer: BorrowOffer) -> Result<BorrowOfferId, LendingError> {
        let check = self
            .user(offer.borrower)
            .and_then(|_| check_positive(offer.max_amount));
        if let Err(e) = check {
            return Err(self.rejected("borrow_as_limit_order", e));
        }

        let id = BorrowOfferId(self.next_borrow_offer_id);
        self.next_borrow_offer_id += 1;
        let payload = EventPayload::BorrowOfferPosted(BorrowOfferPostedEvent {
            offer_id: id,
            borrower: offer.borrower,
            max_amount: offer.max_amount,
        });
        self.borrow_offers.insert(id, offer);
        self.emit_event(payload);
        Ok(id)
    }
}
