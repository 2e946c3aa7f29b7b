//! Authoritative clock and price snapshot.
//!
//! Order book operations read time and price from the one `Context` the order book
//! owns; it only moves forward through [`Context::update`].

use crate::config::Params;
use crate::types::{Price, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub params: Params,
    time: Timestamp,
    price: Price,
}

impl Context {
    pub fn new(params: Params, time: Timestamp, price: Price) -> Self {
        Self { params, time, price }
    }

    pub fn time(&self) -> Timestamp {
        self.time
    }

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn update(&mut self, new_time: Timestamp, new_price: Price) -> Result<(), ClockError> {
        if new_time <= self.time {
            return Err(ClockError::NonIncreasingTime {
                current: self.time,
                requested: new_time,
            });
        }
        self.time = new_time;
        self.price = new_price;
        Ok(())
    }

    // collateral units needed to open `face_value` of debt
    pub fn opening_collateral_for(&self, face_value: Decimal) -> Decimal {
        self.price.to_collateral(face_value) * self.params.cr_opening
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClockError {
    #[error("Time must increase: current {current}, requested {requested}")]
    NonIncreasingTime { current: Timestamp, requested: Timestamp },
}
