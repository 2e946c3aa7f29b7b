// 11.0: every successful state change produces an event. used for audit trails and
// state reconstruction. rejected calls never land here. the EventPayload enum lists all event types.

use crate::types::{BorrowOfferId, Currency, LoanId, Price, Timestamp, UserId, VariableLoanId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    // Clock events
    ClockAdvanced(ClockAdvancedEvent),

    // Account events
    UserCreated(UserCreatedEvent),
    Deposit(TransferEvent),
    Withdrawal(TransferEvent),

    // Offer events
    LoanOfferPosted(LoanOfferPostedEvent),
    BorrowOfferPosted(BorrowOfferPostedEvent),

    // Origination events
    FolCreated(FolCreatedEvent),
    SolCreated(SolCreatedEvent),
    BorrowerExited(BorrowerExitedEvent),

    // Settlement events
    Repaid(RepaidEvent),
    Claimed(ClaimedEvent),
    Compensated(CompensatedEvent),

    // Variable pool events
    MovedToVariablePool(MovedToVariablePoolEvent),
    VariablePoolSupplied(VariablePoolSuppliedEvent),
    VariableLoanRepaid(VariableLoanRepaidEvent),

    // Risk events
    Liquidated(LiquidatedEvent),
    LiquidatedWithReplacement(LiquidatedWithReplacementEvent),
    SelfLiquidated(SelfLiquidatedEvent),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockAdvancedEvent {
    pub time: Timestamp,
    pub price: Price,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCreatedEvent {
    pub user: UserId,
    pub cash: Decimal,
    pub collateral: Decimal,
}

// deposits and withdrawals share a shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub user: UserId,
    pub currency: Currency,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanOfferPostedEvent {
    pub lender: UserId,
    pub max_amount: Decimal,
    pub max_due_date: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowOfferPostedEvent {
    pub offer_id: BorrowOfferId,
    pub borrower: UserId,
    pub max_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolCreatedEvent {
    pub loan_id: LoanId,
    pub lender: UserId,
    pub borrower: UserId,
    pub face_value: Decimal,
    pub due_date: Timestamp,
    pub amount_out: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolCreatedEvent {
    pub loan_id: LoanId,
    pub parent: LoanId,
    pub root: LoanId,
    pub lender: UserId,
    pub borrower: UserId,
    pub face_value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowerExitedEvent {
    pub loan_id: LoanId,
    pub previous_borrower: UserId,
    pub new_borrower: UserId,
    pub amount_in: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepaidEvent {
    pub loan_id: LoanId,
    pub borrower: UserId,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimedEvent {
    pub loan_id: LoanId,
    pub lender: UserId,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensatedEvent {
    pub loan_to_repay: LoanId,
    pub loan_to_compensate: LoanId,
    pub amount: Decimal,
    pub new_loan: LoanId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovedToVariablePoolEvent {
    pub loan_id: LoanId,
    pub variable_loan_id: VariableLoanId,
    pub borrower: UserId,
    pub amount: Decimal,
    pub collateral: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariablePoolSuppliedEvent {
    pub user: UserId,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableLoanRepaidEvent {
    pub variable_loan_id: VariableLoanId,
    pub borrower: UserId,
    pub debt: Decimal,
    pub collateral: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidatedEvent {
    pub loan_id: LoanId,
    pub liquidator: UserId,
    pub borrower: UserId,
    pub debt: Decimal,
    pub collateral_to_liquidator: Decimal,
    pub collateral_to_borrower: Decimal,
    pub collateral_to_protocol: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidatedWithReplacementEvent {
    pub loan_id: LoanId,
    pub liquidator: UserId,
    pub new_borrower: UserId,
    pub amount_out: Decimal,
    pub replacement_profit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfLiquidatedEvent {
    pub loan_id: LoanId,
    pub lender: UserId,
    pub borrower: UserId,
    pub collateral: Decimal,
    pub face_value_removed: Decimal,
}
