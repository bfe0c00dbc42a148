use crate::core::denom::Denom;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Read-only view of the exchange rates published for the current block.
///
/// A rate is the number of reference units one unit of `denom` is worth.
/// Implementations must return the same answer for the whole block.
pub trait RateSource {
    fn rate(&self, denom: &Denom) -> Option<Decimal>;
}

/// Errors arising from publishing rates.
#[derive(Debug, Error)]
pub enum RateError {
    #[error("exchange rate must be positive, got {rate} for {denom}")]
    InvalidRate { denom: Denom, rate: Decimal },
    #[error("the reference denom {0} is fixed at 1 and cannot be published")]
    ReferenceDenom(Denom),
}

/// In-memory rate table standing in for the oracle.
///
/// The reference denom is always worth exactly one reference unit; every
/// other denom only has a rate once one is published.
///
/// # Examples
///
/// ```
/// use market_engine::core::denom::Denom;
/// use market_engine::core::rates::{RateSource, RateTable};
/// use rust_decimal_macros::dec;
///
/// let mut rates = RateTable::new(Denom::new("usdr"));
/// rates.set_rate(Denom::new("uluna"), dec!(2.5)).unwrap();
///
/// assert_eq!(rates.rate(&Denom::new("uluna")), Some(dec!(2.5)));
/// assert_eq!(rates.rate(&Denom::new("usdr")), Some(dec!(1)));
/// assert_eq!(rates.rate(&Denom::new("ukrw")), None);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateTable {
    /// The unit all rates are quoted against.
    pub reference_denom: Denom,
    rates: BTreeMap<Denom, Decimal>,
}

impl RateTable {
    pub fn new(reference_denom: Denom) -> Self {
        Self {
            reference_denom,
            rates: BTreeMap::new(),
        }
    }

    /// Publish `rate` reference units per unit of `denom`.
    pub fn set_rate(&mut self, denom: Denom, rate: Decimal) -> Result<(), RateError> {
        if denom == self.reference_denom {
            return Err(RateError::ReferenceDenom(denom));
        }
        if rate <= Decimal::ZERO {
            return Err(RateError::InvalidRate { denom, rate });
        }
        self.rates.insert(denom, rate);
        Ok(())
    }

    /// Withdraw a published rate, e.g. when the oracle fails to reach
    /// consensus on it.
    pub fn clear_rate(&mut self, denom: &Denom) {
        self.rates.remove(denom);
    }

    pub fn denoms(&self) -> impl Iterator<Item = &Denom> {
        self.rates.keys()
    }
}

impl RateSource for RateTable {
    fn rate(&self, denom: &Denom) -> Option<Decimal> {
        if *denom == self.reference_denom {
            return Some(Decimal::ONE);
        }
        self.rates.get(denom).copied()
    }
}
