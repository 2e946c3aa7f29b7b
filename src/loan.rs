//! Fixed-rate loans and the loan table.
//!
//! A FOL (first-order loan) is an originated loan with its own due date and
//! repayment flag. A SOL (second-order loan) is a claim carved out of another
//! loan's credit; its due date and repayment status always resolve through the
//! root FOL. Loans never hold references to each other: a SOL stores the ids of
//! its root and of the loan it was carved from, and every cross-loan lookup
//! goes through [`LoanTable`].
//!
//! Lifecycle (derived, never stored):
//! `Active -> Overdue -> Repaid -> Claimed`, monotonic. `Claimed` means the
//! whole face value has been exited or claimed.

use crate::types::{LoanId, Price, Timestamp, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanState {
    Active,
    Overdue,
    Repaid,
    Claimed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanKind {
    Fol { due_date: Timestamp, repaid: bool },
    Sol { root: LoanId, parent: LoanId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub lender: UserId,
    pub borrower: UserId,
    pub face_value: Decimal,
    pub amount_exited: Decimal,
    pub kind: LoanKind,
}

impl Loan {
    pub fn is_fol(&self) -> bool {
        matches!(self.kind, LoanKind::Fol { .. })
    }

    /// Claimable future cashflow still owed to the current lender.
    pub fn credit(&self) -> Decimal {
        self.face_value - self.amount_exited
    }

    pub fn debt(&self) -> Decimal {
        self.face_value
    }

    pub fn debt_in_collateral(&self, price: Price) -> Decimal {
        price.to_collateral(self.face_value)
    }

    pub fn root_id(&self) -> LoanId {
        match self.kind {
            LoanKind::Fol { .. } => self.id,
            LoanKind::Sol { root, .. } => root,
        }
    }

    pub fn can_lock(&self, amount: Decimal) -> Result<(), LoanError> {
        if amount < Decimal::ZERO || amount > self.credit() {
            return Err(LoanError::CreditExceeded {
                loan_id: self.id,
                requested: amount,
                available: self.credit(),
            });
        }
        Ok(())
    }

    // marks part of the credit as exited (to a SOL or to a cash claim)
    pub(crate) fn lock(&mut self, amount: Decimal) {
        assert!(
            amount >= Decimal::ZERO && amount <= self.credit(),
            "lock of {} on {} exceeds credit {}",
            amount,
            self.id,
            self.credit()
        );
        self.amount_exited += amount;
        self.assert_invariants();
    }

    // face value reduction that keeps already-exited credit intact
    pub(crate) fn reduce_face_value(&mut self, amount: Decimal) {
        self.face_value -= amount;
        self.assert_invariants();
    }

    // face value reduction mirrored on amount_exited, so credit() stays unchanged
    pub(crate) fn unwind_exit(&mut self, amount: Decimal) {
        self.face_value -= amount;
        self.amount_exited -= amount;
        self.assert_invariants();
    }

    pub(crate) fn settle_claim(&mut self) -> Decimal {
        let credit = self.credit();
        self.amount_exited = self.face_value;
        credit
    }

    // repaid never clears
    pub(crate) fn mark_repaid(&mut self) {
        match &mut self.kind {
            LoanKind::Fol { repaid, .. } => {
                assert!(!*repaid, "{} repaid twice", self.id);
                *repaid = true;
            }
            LoanKind::Sol { .. } => panic!("repayment flag set on SOL {}", self.id),
        }
    }

    fn assert_invariants(&self) {
        assert!(
            self.amount_exited >= Decimal::ZERO && self.amount_exited <= self.face_value,
            "{}: amount_exited {} outside [0, {}]",
            self.id,
            self.amount_exited,
            self.face_value
        );
    }
}

/// Arena that owns every loan. Ids are sequential and never reused.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanTable {
    loans: BTreeMap<LoanId, Loan>,
    next_id: u64,
}

impl LoanTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.loans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loans.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Loan> {
        self.loans.values()
    }

    pub fn next_id(&self) -> LoanId {
        LoanId(self.next_id)
    }

    pub fn get(&self, id: LoanId) -> Result<&Loan, LoanError> {
        self.loans.get(&id).ok_or(LoanError::NotFound(id))
    }

    // mutation only happens on ids a validation pass already resolved
    pub(crate) fn get_mut(&mut self, id: LoanId) -> &mut Loan {
        match self.loans.get_mut(&id) {
            Some(loan) => loan,
            None => panic!("validated {id} missing from loan table"),
        }
    }

    pub fn get_fol(&self, id: LoanId) -> Result<&Loan, LoanError> {
        let loan = self.get(id)?;
        if !loan.is_fol() {
            return Err(LoanError::NotFol(id));
        }
        Ok(loan)
    }

    pub fn root_of(&self, id: LoanId) -> Result<&Loan, LoanError> {
        let loan = self.get(id)?;
        self.get(loan.root_id())
    }

    pub fn due_date(&self, id: LoanId) -> Result<Timestamp, LoanError> {
        match self.root_of(id)?.kind {
            LoanKind::Fol { due_date, .. } => Ok(due_date),
            LoanKind::Sol { .. } => unreachable!("root of a loan is always a FOL"),
        }
    }

    pub fn is_repaid(&self, id: LoanId) -> Result<bool, LoanError> {
        match self.root_of(id)?.kind {
            LoanKind::Fol { repaid, .. } => Ok(repaid),
            LoanKind::Sol { .. } => unreachable!("root of a loan is always a FOL"),
        }
    }

    pub fn is_overdue(&self, id: LoanId, now: Timestamp) -> Result<bool, LoanError> {
        Ok(now > self.due_date(id)?)
    }

    pub fn state(&self, id: LoanId, now: Timestamp) -> Result<LoanState, LoanError> {
        let loan = self.get(id)?;
        assert!(loan.amount_exited <= loan.face_value, "{id}: amount_exited > face_value");
        if loan.amount_exited == loan.face_value {
            return Ok(LoanState::Claimed);
        }
        if self.is_repaid(id)? {
            return Ok(LoanState::Repaid);
        }
        if self.is_overdue(id, now)? {
            Ok(LoanState::Overdue)
        } else {
            Ok(LoanState::Active)
        }
    }

    /// Ancestors of a SOL from its direct parent up to (and including) the root FOL.
    pub fn ancestors(&self, id: LoanId) -> Result<Vec<LoanId>, LoanError> {
        let mut chain = Vec::new();
        let mut current = self.get(id)?;
        while let LoanKind::Sol { parent, .. } = current.kind {
            chain.push(parent);
            current = self.get(parent)?;
        }
        Ok(chain)
    }

    pub(crate) fn create_fol(
        &mut self,
        lender: UserId,
        borrower: UserId,
        face_value: Decimal,
        due_date: Timestamp,
    ) -> LoanId {
        self.insert(lender, borrower, face_value, LoanKind::Fol { due_date, repaid: false })
    }

    pub(crate) fn create_sol(
        &mut self,
        parent: LoanId,
        lender: UserId,
        borrower: UserId,
        face_value: Decimal,
    ) -> LoanId {
        let root = match self.loans.get(&parent) {
            Some(loan) => loan.root_id(),
            None => panic!("SOL parent {parent} missing from loan table"),
        };
        self.insert(lender, borrower, face_value, LoanKind::Sol { root, parent })
    }

    fn insert(&mut self, lender: UserId, borrower: UserId, face_value: Decimal, kind: LoanKind) -> LoanId {
        assert!(face_value >= Decimal::ZERO, "negative face value {face_value}");
        let id = LoanId(self.next_id);
        self.next_id += 1;
        self.loans.insert(
            id,
            Loan {
                id,
                lender,
                borrower,
                face_value,
                amount_exited: Decimal::ZERO,
                kind,
            },
        );
        id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoanError {
    #[error("Loan {0} not found")]
    NotFound(LoanId),

    #[error("Loan {0} is not a FOL")]
    NotFol(LoanId),

    #[error("Credit exceeded on {loan_id}: requested {requested}, available {available}")]
    CreditExceeded {
        loan_id: LoanId,
        requested: Decimal,
        available: Decimal,
    },
}
