// lending-core: fixed/variable rate peer-to-peer lending core.
// ledger-first architecture: every balance is a free/locked pair and every
// operation either applies in full or leaves the book untouched.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: UserId, LoanId, Price, Timestamp, Currency
//   1.2  ledger.rs: free/locked balance pair with guarded transfers
//   1.3  user.rs: actors, personal wallets, aggregate debt
//   2.x  curve.rs: yield curves over relative ticks
//   3.x  offer.rs: loan and borrow limit orders
//   4.x  loan.rs: FOL/SOL records and the loan table
//   5.x  variable_pool.rs: index-accruing variable rate pool
//   6.x  oracle.rs: price oracle trait and AMM reference price
//   6.2  context.rs: clock and price snapshot
//   7.x  config.rs: collateral ratios, liquidation split, pool rate curve
//   8.x  orderbook/: deposits, matching, settlement, liquidations
//   11.x events.rs: state transition events for audit

// core lending modules
pub mod curve;
pub mod ledger;
pub mod loan;
pub mod offer;
pub mod orderbook;
pub mod types;
pub mod user;
pub mod variable_pool;

// environment
pub mod config;
pub mod context;
pub mod events;
pub mod oracle;

// re exports for convenience
pub use config::*;
pub use context::*;
pub use curve::*;
pub use events::*;
pub use ledger::*;
pub use loan::*;
pub use offer::*;
pub use oracle::*;
pub use orderbook::*;
pub use types::*;
pub use user::*;
pub use variable_pool::*;
