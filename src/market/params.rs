use crate::core::denom::Denom;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected market parameter sets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamsError {
    #[error("invalid denom '{0}'")]
    InvalidDenom(Denom),
    #[error("reserve denom {0} must differ from the reference denom")]
    ReserveIsReference(Denom),
    #[error("base pool must be positive, got {0}")]
    BasePool(Decimal),
    #[error("spreads must satisfy 0 <= min ({min}) <= max ({max}) < 1")]
    SpreadRange { min: Decimal, max: Decimal },
    #[error("pool factor must be non-negative, got {0}")]
    PoolFactor(Decimal),
    #[error("pool recovery period must be at least one block")]
    RecoveryPeriod,
    #[error("max swap fraction must be in (0, 1], got {0}")]
    MaxSwapFraction(Decimal),
}

/// Governance-tunable configuration of the market.
///
/// All ratios are exact decimals; `base_pool` is expressed in reference
/// units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    /// Unit every exchange rate is quoted against.
    pub reference_denom: Denom,
    /// The network's base asset; swaps touching it move the virtual pool.
    pub reserve_denom: Denom,
    /// Denom seigniorage is accounted and paid out in.
    pub seigniorage_denom: Denom,
    /// Equilibrium size of each pool side.
    pub base_pool: Decimal,
    /// Spread charged on stable-to-stable swaps and the floor for pool swaps.
    pub min_spread: Decimal,
    /// Ceiling for the dynamic spread.
    pub max_spread: Decimal,
    /// Weight of the pool imbalance in the dynamic spread.
    pub pool_factor: Decimal,
    /// Blocks over which a pool deviation decays by a factor of (P-1)/P per block.
    pub pool_recovery_period: u64,
    /// Largest single swap, as a fraction of `base_pool`.
    pub max_swap_fraction: Decimal,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            reference_denom: Denom::new("usdr"),
            reserve_denom: Denom::new("uluna"),
            seigniorage_denom: Denom::new("uluna"),
            base_pool: dec!(1_000_000),
            min_spread: dec!(0.005),
            max_spread: dec!(0.02),
            pool_factor: Decimal::ONE,
            pool_recovery_period: 100,
            max_swap_fraction: dec!(0.1),
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<(), ParamsError> {
        for denom in [
            &self.reference_denom,
            &self.reserve_denom,
            &self.seigniorage_denom,
        ] {
            if !denom.is_valid() {
                return Err(ParamsError::InvalidDenom(denom.clone()));
            }
        }
        if self.reserve_denom == self.reference_denom {
            return Err(ParamsError::ReserveIsReference(self.reserve_denom.clone()));
        }
        if self.base_pool <= Decimal::ZERO {
            return Err(ParamsError::BasePool(self.base_pool));
        }
        if self.min_spread < Decimal::ZERO
            || self.min_spread > self.max_spread
            || self.max_spread >= Decimal::ONE
        {
            return Err(ParamsError::SpreadRange {
                min: self.min_spread,
                max: self.max_spread,
            });
        }
        if self.pool_factor < Decimal::ZERO {
            return Err(ParamsError::PoolFactor(self.pool_factor));
        }
        if self.pool_recovery_period == 0 {
            return Err(ParamsError::RecoveryPeriod);
        }
        if self.max_swap_fraction <= Decimal::ZERO || self.max_swap_fraction > Decimal::ONE {
            return Err(ParamsError::MaxSwapFraction(self.max_swap_fraction));
        }
        Ok(())
    }

    pub fn is_reserve(&self, denom: &Denom) -> bool {
        *denom == self.reserve_denom
    }

    /// Largest offer value, in reference units, a pool swap may carry.
    pub fn max_swap_value(&self) -> Decimal {
        self.base_pool * self.max_swap_fraction
    }
}
