// 8.0.2: result types and errors for order book operations.

use crate::config::ConfigError;
use crate::context::ClockError;
use crate::ledger::LedgerError;
use crate::loan::{LoanError, LoanState};
use crate::oracle::OracleError;
use crate::types::{BorrowOfferId, LoanId, Timestamp, UserId};
use crate::variable_pool::VariablePoolError;
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketOrderResult {
    // SOLs carved from virtual collateral, in the order they were consumed
    pub sols: Vec<LoanId>,
    pub fol: Option<LoanId>,
    pub face_value: Decimal,
    pub amount_out: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompensationResult {
    pub amount: Decimal,
    pub new_loan: LoanId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationResult {
    pub loan_id: LoanId,
    pub liquidator: UserId,
    pub borrower: UserId,
    pub debt: Decimal,
    pub assigned_collateral: Decimal,
    // debt coverage plus premium
    pub collateral_to_liquidator: Decimal,
    pub collateral_to_borrower: Decimal,
    pub collateral_to_protocol: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementResult {
    pub liquidation: LiquidationResult,
    pub new_borrower: UserId,
    pub amount_out: Decimal,
    pub replacement_profit: Decimal,
    pub profit_to_protocol: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfLiquidationResult {
    pub loan_id: LoanId,
    pub collateral: Decimal,
    pub face_value_removed: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LendingError {
    #[error("User {0} not found")]
    UserNotFound(UserId),

    #[error("No loan offer posted by {0}")]
    LoanOfferNotFound(UserId),

    #[error("Borrow offer {0:?} not found")]
    BorrowOfferNotFound(BorrowOfferId),

    #[error("Amount must be positive: {0}")]
    NonPositiveAmount(Decimal),

    #[error("Due date {due_date} is not in the future (now {now})")]
    DueDateNotInFuture { due_date: Timestamp, now: Timestamp },

    #[error("Due date {due_date} beyond the market horizon {max_time}")]
    DueDateBeyondHorizon { due_date: Timestamp, max_time: Timestamp },

    #[error("Due date {due_date} beyond offer max due date {max_due_date}")]
    DueDateBeyondOffer { due_date: Timestamp, max_due_date: Timestamp },

    #[error("No rate for due date {due_date} on the offer curve")]
    RateNotFound { due_date: Timestamp },

    #[error("Offer capacity exceeded: requested {requested}, available {available}")]
    OfferCapacityExceeded { requested: Decimal, available: Decimal },

    #[error("{user} has insufficient cash: requested {requested}, available {available}")]
    InsufficientCash {
        user: UserId,
        requested: Decimal,
        available: Decimal,
    },

    #[error("{user} has insufficient collateral: requested {requested}, available {available}")]
    InsufficientCollateral {
        user: UserId,
        requested: Decimal,
        available: Decimal,
    },

    #[error("{0} would be liquidatable")]
    WouldBeLiquidatable(UserId),

    #[error("Opening collateral not met: required {required}, free {available}")]
    OpeningCollateralNotMet { required: Decimal, available: Decimal },

    #[error("{loan_id} is {state:?}")]
    InvalidLoanState { loan_id: LoanId, state: LoanState },

    #[error("{0} already repaid")]
    AlreadyRepaid(LoanId),

    #[error("{0} is not overdue")]
    NotOverdue(LoanId),

    #[error("{user} is not the lender of {loan_id}")]
    NotLender { loan_id: LoanId, user: UserId },

    #[error("Lender of {loan_to_compensate} is not the borrower of {loan_to_repay}")]
    CompensationMismatch {
        loan_to_repay: LoanId,
        loan_to_compensate: LoanId,
    },

    #[error("Repay due date {repay_due} earlier than compensate due date {compensate_due}")]
    DueDateIncompatible {
        repay_due: Timestamp,
        compensate_due: Timestamp,
    },

    #[error("Compensation too large: requested {requested}, available {available}")]
    CompensationTooLarge { requested: Decimal, available: Decimal },

    #[error("Borrower of {0} is not liquidatable")]
    NotLiquidatable(LoanId),

    #[error("Liquidation at a loss: assigned {assigned}, debt coverage {required}")]
    LiquidationAtLoss { assigned: Decimal, required: Decimal },

    #[error("Replacement at a loss: face value {face_value}, amount out {amount_out}")]
    ReplacementAtLoss { face_value: Decimal, amount_out: Decimal },

    #[error("{loan_id} is not underwater: assigned {assigned}, credit coverage {required}")]
    NotUnderwater {
        loan_id: LoanId,
        assigned: Decimal,
        required: Decimal,
    },

    #[error("{0} has no credit left")]
    NoCredit(LoanId),

    #[error("Loan error: {0}")]
    Loan(#[from] LoanError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),

    #[error("Variable pool error: {0}")]
    VariablePool(#[from] VariablePoolError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),
}
