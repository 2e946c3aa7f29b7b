// Price oracle
//
// The order book never fetches prices itself. Whatever drives the clock asks a
// PriceOracle for the instant price and hands it to the order book together with the
// new time.

use crate::ledger::LedgerAccount;
use crate::types::Price;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Anything able to quote collateral in cash right now.
pub trait PriceOracle {
    fn instant_price(&self) -> Result<Price, OracleError>;
}

/// Constant-product style pool used as a price reference. Quotes the reserve
/// ratio unless a fixed price override is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amm {
    pub cash: LedgerAccount,
    pub collateral: LedgerAccount,
    pub fixed_price: Option<Price>,
}

impl Amm {
    pub fn new(cash: Decimal, collateral: Decimal) -> Self {
        Self {
            cash: LedgerAccount::new(cash),
            collateral: LedgerAccount::new(collateral),
            fixed_price: None,
        }
    }

    pub fn with_fixed_price(price: Price) -> Self {
        Self {
            cash: LedgerAccount::default(),
            collateral: LedgerAccount::default(),
            fixed_price: Some(price),
        }
    }

    pub fn set_fixed_price(&mut self, price: Option<Price>) {
        self.fixed_price = price;
    }
}

impl PriceOracle for Amm {
    fn instant_price(&self) -> Result<Price, OracleError> {
        if let Some(price) = self.fixed_price {
            return Ok(price);
        }
        if self.collateral.free.is_zero() {
            return Err(OracleError::EmptyReserves);
        }
        Price::new(self.cash.free / self.collateral.free).ok_or(OracleError::EmptyReserves)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("AMM reserves are empty")]
    EmptyReserves,
}
