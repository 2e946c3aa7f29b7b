// 8.0: lending order book. owns venue balances, offers, loans and the variable pool.
// every mutation is validated into a plan before any balance moves, so a rejected
// call leaves the book untouched. deterministic with no external I/O.

mod config;
mod core;
mod offers;
mod matching;
mod settlement;
mod liquidations;
mod queries;
mod results;

pub use config::OrderBookConfig;
pub use core::{LendingOrderBook, VenueAccount};
pub use results::{
    CompensationResult, LendingError, LiquidationResult, MarketOrderResult, ReplacementResult, SelfLiquidationResult,
};
