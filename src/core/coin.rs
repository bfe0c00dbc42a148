use crate::core::denom::Denom;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Raised when an integer amount cannot be represented exactly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("amount {0} is out of range for exact arithmetic")]
pub struct AmountOverflow(pub String);

/// A non-negative integer quantity of one denomination, in its smallest unit.
///
/// # Examples
///
/// ```
/// use market_engine::core::coin::Coin;
///
/// let coin = Coin::new("uusd", 1_000_000);
/// assert_eq!(coin.amount, 1_000_000);
/// assert_eq!(coin.to_string(), "1000000uusd");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: Denom,
    #[serde(with = "amount_str")]
    pub amount: u128,
}

// u128 does not survive a trip through serde_json numbers, so amounts travel
// as decimal strings like the rest of the wire format.
mod amount_str {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<u128>()
            .map_err(|e| de::Error::custom(format!("invalid amount '{raw}': {e}")))
    }
}

impl Coin {
    pub fn new(denom: impl Into<Denom>, amount: u128) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Lift an integer amount into a `Decimal` without losing precision.
pub fn amount_to_decimal(amount: u128) -> Result<Decimal, AmountOverflow> {
    i128::try_from(amount)
        .ok()
        .and_then(|v| Decimal::try_from_i128_with_scale(v, 0).ok())
        .ok_or_else(|| AmountOverflow(amount.to_string()))
}

/// Floor a non-negative `Decimal` to an integer amount.
///
/// Negative values are a caller bug on every consensus path, so they are
/// reported the same way as overflow instead of being clamped.
pub fn floor_to_amount(value: Decimal) -> Result<u128, AmountOverflow> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(AmountOverflow(value.to_string()));
    }
    value
        .floor()
        .to_u128()
        .ok_or_else(|| AmountOverflow(value.to_string()))
}
