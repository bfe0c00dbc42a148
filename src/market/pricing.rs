//! Swap pricing against the virtual pool.
//!
//! Quoting is pure: it reads the pool and the block's rates and returns
//! what a swap would yield, without touching any state.
//!
//! # Algorithm
//!
//! 1. `base = offer * rate(offer) / rate(ask)`, multiplied before dividing.
//! 2. Stable-to-stable swaps pay `min_spread`. Swaps touching the reserve
//!    asset pay `min_spread + pool_factor * |ask side delta| / base_pool`,
//!    clamped to `[min_spread, max_spread]`.
//! 3. `ask = floor(base * (1 - spread))`. The withheld fee is
//!    `floor(base) - ask`, so rounding dust is never paid out.
//!
//! Coin amounts that leave the engine are floored from the exact rational
//! value in 512-bit integers. `Decimal` keeps only 28 significant digits and
//! rounds to nearest past that, which could lift a quotient just below an
//! integer over it and pay out a unit that was never offered.

use crate::core::coin::{amount_to_decimal, Coin};
use crate::core::denom::Denom;
use crate::core::rates::RateSource;
use crate::market::error::MarketError;
use crate::market::params::Params;
use crate::market::pool::{PoolSide, PoolState};
use primitive_types::U512;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Result of pricing a swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapQuote {
    /// Coin the receiver gets.
    pub ask: Coin,
    /// Spread fraction applied.
    pub spread: Decimal,
    /// Converted amount before the spread, in ask units.
    pub base_amount: Decimal,
    /// Ask-denom units withheld as fee.
    pub fee: u128,
    /// Value of the offer in reference units.
    pub offer_value: Decimal,
    /// Whether the swap moves the virtual pool.
    pub touches_pool: bool,
}

fn rate_of(rates: &impl RateSource, denom: &Denom) -> Result<Decimal, MarketError> {
    rates
        .rate(denom)
        .ok_or_else(|| MarketError::NoEffectivePrice(denom.clone()))
}

fn overflow(what: impl std::fmt::Display) -> MarketError {
    MarketError::Overflow(what.to_string())
}

/// `floor(amount * Π numerators / Π denominators)` without intermediate
/// rounding. Every factor must be positive.
fn floor_ratio(
    amount: u128,
    numerators: &[Decimal],
    denominators: &[Decimal],
) -> Result<u128, MarketError> {
    fn mantissa(factor: &Decimal) -> Result<U512, MarketError> {
        u128::try_from(factor.mantissa())
            .map(U512::from)
            .map_err(|_| overflow(format!("negative factor {factor}")))
    }

    let too_wide = || overflow(format!("{amount} scaled past 512 bits"));
    let mut num = U512::from(amount);
    let mut den = U512::one();
    for factor in numerators {
        num = num.checked_mul(mantissa(factor)?).ok_or_else(too_wide)?;
        den = den
            .checked_mul(U512::exp10(factor.scale() as usize))
            .ok_or_else(too_wide)?;
    }
    for factor in denominators {
        den = den.checked_mul(mantissa(factor)?).ok_or_else(too_wide)?;
        num = num
            .checked_mul(U512::exp10(factor.scale() as usize))
            .ok_or_else(too_wide)?;
    }
    if den.is_zero() {
        return Err(overflow(format!("{amount} divided by zero")));
    }
    let quotient = num / den;
    if quotient.bits() > 128 {
        return Err(overflow(format!("{amount} converts past u128")));
    }
    Ok(quotient.low_u128())
}

/// Convert a whole `amount` of `from` into whole `to` units, rounding down.
pub fn convert_floor(
    amount: u128,
    from: &Denom,
    to: &Denom,
    rates: &impl RateSource,
) -> Result<u128, MarketError> {
    if from == to {
        return Ok(amount);
    }
    let from_rate = rate_of(rates, from)?;
    let to_rate = rate_of(rates, to)?;
    floor_ratio(amount, &[from_rate], &[to_rate])
}

/// Spread for swapping `offer_denom` into `ask_denom` at the current pool.
pub fn compute_spread(
    offer_denom: &Denom,
    ask_denom: &Denom,
    pool: &PoolState,
    params: &Params,
    rates: &impl RateSource,
) -> Result<Decimal, MarketError> {
    if !params.is_reserve(offer_denom) && !params.is_reserve(ask_denom) {
        return Ok(params.min_spread);
    }

    let side = PoolSide::of(ask_denom, params);
    let deviation = pool.deviation_value(side, params, rates)?;
    let imbalance = deviation
        .checked_div(params.base_pool)
        .and_then(|ratio| ratio.checked_mul(params.pool_factor))
        .ok_or_else(|| overflow(format!("pool imbalance {deviation}")))?;

    // anything past max_spread is clamped anyway
    let spread = params
        .min_spread
        .checked_add(imbalance)
        .unwrap_or(params.max_spread);
    Ok(spread.clamp(params.min_spread, params.max_spread))
}

/// Price swapping `offer` into `ask_denom`.
///
/// # Errors
///
/// - [`MarketError::InvalidSwapAmount`] for a zero offer
/// - [`MarketError::RecursiveSwap`] when both denoms match
/// - [`MarketError::NoEffectivePrice`] when either denom has no rate
/// - [`MarketError::ZeroSwapOutput`] when the output floors to zero
/// - [`MarketError::Overflow`] when the amounts leave the exact range
///
/// # Examples
///
/// ```
/// use market_engine::core::coin::Coin;
/// use market_engine::core::denom::Denom;
/// use market_engine::core::rates::RateTable;
/// use market_engine::market::params::Params;
/// use market_engine::market::pool::PoolState;
/// use market_engine::market::pricing::quote;
/// use rust_decimal_macros::dec;
///
/// let params = Params::default();
/// let mut rates = RateTable::new(Denom::new("usdr"));
/// rates.set_rate(Denom::new("uusd"), dec!(1)).unwrap();
/// rates.set_rate(Denom::new("uluna"), dec!(2)).unwrap();
///
/// let offer = Coin::new("uusd", 100);
/// let q = quote(&offer, &Denom::new("uluna"), &PoolState::new(), &params, &rates).unwrap();
/// assert_eq!(q.ask, Coin::new("uluna", 49));
/// assert_eq!(q.spread, dec!(0.005));
/// ```
pub fn quote(
    offer: &Coin,
    ask_denom: &Denom,
    pool: &PoolState,
    params: &Params,
    rates: &impl RateSource,
) -> Result<SwapQuote, MarketError> {
    if offer.is_zero() {
        return Err(MarketError::InvalidSwapAmount);
    }
    if offer.denom == *ask_denom {
        return Err(MarketError::RecursiveSwap(offer.denom.clone()));
    }

    let offer_rate = rate_of(rates, &offer.denom)?;
    let ask_rate = rate_of(rates, ask_denom)?;

    let offer_amount = amount_to_decimal(offer.amount)?;
    let offer_value = offer_amount
        .checked_mul(offer_rate)
        .ok_or_else(|| overflow(format!("value of {offer}")))?;
    let base_amount = offer_value
        .checked_div(ask_rate)
        .ok_or_else(|| overflow(format!("{offer} -> {ask_denom}")))?;

    let spread = compute_spread(&offer.denom, ask_denom, pool, params, rates)?;
    let ask_amount = floor_ratio(
        offer.amount,
        &[offer_rate, Decimal::ONE - spread],
        &[ask_rate],
    )?;
    if ask_amount == 0 {
        return Err(MarketError::ZeroSwapOutput(ask_denom.clone()));
    }
    let fee = floor_ratio(offer.amount, &[offer_rate], &[ask_rate])?
        .checked_sub(ask_amount)
        .ok_or_else(|| overflow(format!("fee on {offer} -> {ask_denom}")))?;

    log::debug!(
        "quote {} -> {}{} (spread {}, fee {})",
        offer,
        ask_amount,
        ask_denom,
        spread,
        fee
    );

    Ok(SwapQuote {
        ask: Coin::new(ask_denom.clone(), ask_amount),
        spread,
        base_amount,
        fee,
        offer_value,
        touches_pool: params.is_reserve(&offer.denom) || params.is_reserve(ask_denom),
    })
}
