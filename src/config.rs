// 7.0 config.rs: market-wide risk settings in one place.
// 7.1 Params holds the collateral ratio thresholds, LiquidationParams the surplus split,
// VariablePoolParams the utilization rate curve.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    // Latest due date, in ticks, a new loan may be originated with
    pub max_time: i64,
    // Minimum collateral ratio to originate debt
    pub cr_opening: Decimal,
    // Below this ratio a borrower is liquidatable
    pub cr_liquidation: Decimal,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            max_time: 12,
            cr_opening: dec!(1.5),
            cr_liquidation: dec!(1.3),
        }
    }
}

/** 7.2: how the collateral surplus of a liquidation is split. the protocol keeps the rest */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationParams {
    pub collateral_perc_premium_to_liquidator: Decimal,
    pub collateral_perc_premium_to_borrower: Decimal,
    // Share of the replacement profit kept by the protocol
    pub replacement_profit_perc_to_protocol: Decimal,
}

impl Default for LiquidationParams {
    fn default() -> Self {
        Self {
            collateral_perc_premium_to_liquidator: dec!(0.3),
            collateral_perc_premium_to_borrower: dec!(0.1),
            replacement_profit_perc_to_protocol: Decimal::ZERO,
        }
    }
}

impl LiquidationParams {
    pub fn collateral_perc_to_protocol(&self) -> Decimal {
        Decimal::ONE - self.collateral_perc_premium_to_liquidator - self.collateral_perc_premium_to_borrower
    }
}

/** 7.3: two-slope utilization curve. rates are per tick */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariablePoolParams {
    pub min_rate: Decimal,
    pub max_rate: Decimal,
    // Slope below the turning point
    pub slope: Decimal,
    // Utilization at which the steep slope starts
    pub turning_point: Decimal,
}

impl Default for VariablePoolParams {
    fn default() -> Self {
        Self {
            min_rate: dec!(0.1),
            max_rate: Decimal::ONE,
            slope: dec!(0.1),
            turning_point: dec!(0.9),
        }
    }
}

impl VariablePoolParams {
    // rate reached at the turning point
    pub fn kink_rate(&self) -> Decimal {
        self.min_rate + self.slope * self.turning_point
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConfig {
    pub params: Params,
    pub liquidation: LiquidationParams,
    pub variable_pool: VariablePoolParams,
}

impl MarketConfig {
    // Tighter thresholds, smaller liquidator premium
    pub fn conservative() -> Self {
        let mut config = Self::default();
        config.params.cr_opening = dec!(2);
        config.params.cr_liquidation = dec!(1.5);
        config.liquidation.collateral_perc_premium_to_liquidator = dec!(0.2);
        config.variable_pool.min_rate = dec!(0.05);
        config
    }

    // Looser thresholds, bigger incentive for liquidators
    pub fn aggressive() -> Self {
        let mut config = Self::default();
        config.params.cr_opening = dec!(1.2);
        config.params.cr_liquidation = dec!(1.1);
        config.liquidation.collateral_perc_premium_to_liquidator = dec!(0.5);
        config.liquidation.replacement_profit_perc_to_protocol = dec!(0.1);
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.params;
        if p.max_time <= 0 {
            return Err(ConfigError::InvalidParams {
                reason: "max_time must be positive".to_string(),
            });
        }
        if p.cr_liquidation <= Decimal::ONE {
            return Err(ConfigError::InvalidParams {
                reason: "liquidation ratio must be above 1".to_string(),
            });
        }
        if p.cr_opening < p.cr_liquidation {
            return Err(ConfigError::InvalidParams {
                reason: "opening ratio must not be below liquidation ratio".to_string(),
            });
        }

        let l = &self.liquidation;
        let percs = [
            l.collateral_perc_premium_to_liquidator,
            l.collateral_perc_premium_to_borrower,
            l.replacement_profit_perc_to_protocol,
        ];
        if percs.iter().any(|x| *x < Decimal::ZERO || *x > Decimal::ONE) {
            return Err(ConfigError::InvalidLiquidation {
                reason: "percentages must be in [0, 1]".to_string(),
            });
        }
        if l.collateral_perc_to_protocol() < Decimal::ZERO {
            return Err(ConfigError::InvalidLiquidation {
                reason: "liquidator and borrower premiums exceed 100%".to_string(),
            });
        }

        let v = &self.variable_pool;
        if v.min_rate < Decimal::ZERO || v.slope < Decimal::ZERO {
            return Err(ConfigError::InvalidVariablePool {
                reason: "rates and slope must not be negative".to_string(),
            });
        }
        if v.turning_point <= Decimal::ZERO || v.turning_point >= Decimal::ONE {
            return Err(ConfigError::InvalidVariablePool {
                reason: "turning point must be in (0, 1)".to_string(),
            });
        }
        if v.max_rate < v.kink_rate() {
            return Err(ConfigError::InvalidVariablePool {
                reason: "max rate below the rate at the turning point".to_string(),
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid params: {reason}")]
    InvalidParams { reason: String },

    #[error("Invalid liquidation params: {reason}")]
    InvalidLiquidation { reason: String },

    #[error("Invalid variable pool params: {reason}")]
    InvalidVariablePool { reason: String },
}
