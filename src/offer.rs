// 3.0: standing limit orders. lenders post one LoanOffer each (keyed by lender),
// borrowers append BorrowOffers. max_amount is cash capacity and only ever shrinks.

use crate::curve::YieldCurve;
use crate::types::{Timestamp, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanOffer {
    pub lender: UserId,
    pub max_amount: Decimal,
    pub max_due_date: Timestamp,
    pub curve: YieldCurve,
}

impl LoanOffer {
    pub fn new(lender: UserId, max_amount: Decimal, max_due_date: Timestamp, curve: YieldCurve) -> Self {
        Self {
            lender,
            max_amount,
            max_due_date,
            curve,
        }
    }

    pub fn rate_at(&self, now: Timestamp, due_date: Timestamp) -> Option<Decimal> {
        self.curve.rate_at(now, due_date)
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_amount.is_zero()
    }

    pub(crate) fn fill(&mut self, amount: Decimal) {
        self.max_amount -= amount;
        assert!(
            self.max_amount >= Decimal::ZERO,
            "loan offer of {} overfilled: {}",
            self.lender,
            self.max_amount
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowOffer {
    pub borrower: UserId,
    pub max_amount: Decimal,
    pub curve: YieldCurve,
}

impl BorrowOffer {
    pub fn new(borrower: UserId, max_amount: Decimal, curve: YieldCurve) -> Self {
        Self {
            borrower,
            max_amount,
            curve,
        }
    }

    pub fn rate_at(&self, now: Timestamp, due_date: Timestamp) -> Option<Decimal> {
        self.curve.rate_at(now, due_date)
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_amount.is_zero()
    }

    pub(crate) fn fill(&mut self, amount: Decimal) {
        self.max_amount -= amount;
        assert!(
            self.max_amount >= Decimal::ZERO,
            "borrow offer of {} overfilled: {}",
            self.borrower,
            self.max_amount
        );
    }
}
