//! Virtual liquidity pool state and its per-block replenishment.
//!
//! The pool has two sides. The reserve side tracks deviation in units of
//! the reserve asset; the stable side tracks deviation in reference units,
//! so every stable denom shares one side. Both deltas start at zero and
//! decay back toward zero every block.

use crate::core::denom::Denom;
use crate::core::rates::RateSource;
use crate::market::error::MarketError;
use crate::market::params::Params;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Fixed-point precision pool deltas are kept at.
pub const DELTA_PRECISION: u32 = 18;

/// One side of the virtual pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolSide {
    Reserve,
    Stable,
}

impl PoolSide {
    pub fn of(denom: &Denom, params: &Params) -> Self {
        if params.is_reserve(denom) {
            PoolSide::Reserve
        } else {
            PoolSide::Stable
        }
    }
}

/// Signed deviation of each pool side from the base pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    /// Deviation of the reserve side, in reserve-denom units.
    pub reserve_delta: Decimal,
    /// Deviation of the stable side, in reference units.
    pub stable_delta: Decimal,
}

impl PoolState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delta(&self, side: PoolSide) -> Decimal {
        match side {
            PoolSide::Reserve => self.reserve_delta,
            PoolSide::Stable => self.stable_delta,
        }
    }

    fn delta_mut(&mut self, side: PoolSide) -> &mut Decimal {
        match side {
            PoolSide::Reserve => &mut self.reserve_delta,
            PoolSide::Stable => &mut self.stable_delta,
        }
    }

    /// Magnitude of a side's deviation, in reference units.
    pub fn deviation_value(
        &self,
        side: PoolSide,
        params: &Params,
        rates: &impl RateSource,
    ) -> Result<Decimal, MarketError> {
        let delta = self.delta(side).abs();
        match side {
            PoolSide::Stable => Ok(delta),
            PoolSide::Reserve => {
                let rate = rates
                    .rate(&params.reserve_denom)
                    .ok_or_else(|| MarketError::NoEffectivePrice(params.reserve_denom.clone()))?;
                delta
                    .checked_mul(rate)
                    .ok_or_else(|| MarketError::Overflow(format!("{delta} * {rate}")))
            }
        }
    }

    /// Return a copy with `amount` added to `side` (negative to subtract).
    pub fn shifted(&self, side: PoolSide, amount: Decimal) -> Result<PoolState, MarketError> {
        let current = self.delta(side);
        let updated = current
            .checked_add(amount)
            .map(truncate_delta)
            .ok_or_else(|| MarketError::Overflow(format!("pool delta {current} + {amount}")))?;
        let mut next = *self;
        *next.delta_mut(side) = updated;
        Ok(next)
    }

    /// Decay both deltas toward zero for `elapsed_blocks` blocks.
    ///
    /// Each elapsed block keeps `(P - 1) / P` of the deviation. The whole
    /// span is applied at once as `delta * (P - 1)^e / P^e`, truncated toward
    /// zero at [`DELTA_PRECISION`] places, so the sign never flips and a
    /// non-zero delta always shrinks. `elapsed_blocks == 0` returns the state
    /// as is.
    pub fn replenish(&self, recovery_period: u64, elapsed_blocks: u64) -> PoolState {
        PoolState {
            reserve_delta: decay(self.reserve_delta, recovery_period, elapsed_blocks),
            stable_delta: decay(self.stable_delta, recovery_period, elapsed_blocks),
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.reserve_delta.is_zero() && self.stable_delta.is_zero()
    }
}

fn truncate_delta(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DELTA_PRECISION, RoundingStrategy::ToZero)
}

fn decay(delta: Decimal, recovery_period: u64, elapsed_blocks: u64) -> Decimal {
    if elapsed_blocks == 0 || delta.is_zero() {
        return delta;
    }
    if recovery_period <= 1 {
        return Decimal::ZERO;
    }
    let delta = truncate_delta(delta);
    exact_decay(delta, recovery_period, elapsed_blocks)
        .unwrap_or_else(|| approximate_decay(delta, recovery_period, elapsed_blocks))
}

/// `delta * (P-1)^e / P^e` in integer units of 10^-18, with a single
/// truncating division. `None` once any intermediate leaves `i128`.
fn exact_decay(delta: Decimal, recovery_period: u64, elapsed_blocks: u64) -> Option<Decimal> {
    let exp = u32::try_from(elapsed_blocks).ok()?;
    let kept = i128::from(recovery_period - 1).checked_pow(exp)?;
    let whole = i128::from(recovery_period).checked_pow(exp)?;
    let units = delta
        .mantissa()
        .checked_mul(10i128.checked_pow(DELTA_PRECISION - delta.scale())?)?;
    // integer division truncates toward zero
    let decayed = units.checked_mul(kept)? / whole;
    Decimal::try_from_i128_with_scale(decayed, DELTA_PRECISION)
        .ok()
        .map(|d| d.normalize())
}

/// Fallback for spans whose powers don't fit: the factor is raised by
/// squaring in `Decimal`, which rounds past 28 digits and underflows to
/// zero for long gaps.
fn approximate_decay(delta: Decimal, recovery_period: u64, elapsed_blocks: u64) -> Decimal {
    let mut base = Decimal::from(recovery_period - 1) / Decimal::from(recovery_period);
    let mut factor = Decimal::ONE;
    let mut exp = elapsed_blocks;
    while exp > 0 && !factor.is_zero() {
        if exp & 1 == 1 {
            factor = factor.checked_mul(base).unwrap_or(Decimal::ZERO);
        }
        exp >>= 1;
        base = base.checked_mul(base).unwrap_or(Decimal::ZERO);
    }

    // factor < 1, so the product can't overflow
    let next = truncate_delta(delta.checked_mul(factor).unwrap_or(Decimal::ZERO));
    if next.abs() < delta.abs() {
        return next;
    }
    // rounding kept the value; step one unit toward zero
    let step = Decimal::new(1, DELTA_PRECISION);
    if delta.is_sign_negative() {
        delta + step
    } else {
        delta - step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_zero_elapsed_is_identity() {
        let pool = PoolState {
            reserve_delta: dec!(123.456),
            stable_delta: dec!(-99),
        };
        assert_eq!(pool.replenish(100, 0), pool);
    }

    #[test]
    fn test_single_block_decay() {
        let pool = PoolState {
            reserve_delta: dec!(1000),
            stable_delta: dec!(-1000),
        };
        let next = pool.replenish(100, 1);
        assert_eq!(next.reserve_delta, dec!(990));
        assert_eq!(next.stable_delta, dec!(-990));
    }

    #[test]
    fn test_multi_block_matches_power_formula() {
        let pool = PoolState {
            reserve_delta: dec!(10000),
            stable_delta: Decimal::ZERO,
        };
        // 10000 * (9/10)^3 = 7290
        assert_eq!(pool.replenish(10, 3).reserve_delta, dec!(7290));
    }

    #[test]
    fn test_decay_truncates_toward_zero() {
        let pool = PoolState {
            reserve_delta: dec!(0.000000000000000001),
            stable_delta: dec!(-0.000000000000000001),
        };
        let next = pool.replenish(100, 1);
        assert!(next.is_balanced());
    }

    #[test]
    fn test_recovery_period_one_clears_pool() {
        let pool = PoolState {
            reserve_delta: dec!(5),
            stable_delta: dec!(-5),
        };
        assert!(pool.replenish(1, 1).is_balanced());
        assert_eq!(pool.replenish(1, 0), pool);
    }

    #[test]
    fn test_decay_never_flips_sign() {
        let mut pool = PoolState {
            reserve_delta: dec!(-7.5),
            stable_delta: dec!(3),
        };
        for _ in 0..500 {
            let next = pool.replenish(2, 1);
            assert!(next.reserve_delta <= Decimal::ZERO);
            assert!(next.stable_delta >= Decimal::ZERO);
            pool = next;
        }
    }

    #[test]
    fn test_multi_block_truncates_once() {
        let pool = PoolState {
            reserve_delta: dec!(0.000000000000000007),
            stable_delta: dec!(-0.000000000000000007),
        };
        // 7e-18 * 4/9 = 3.11e-18
        let next = pool.replenish(3, 2);
        assert_eq!(next.reserve_delta, dec!(0.000000000000000003));
        assert_eq!(next.stable_delta, dec!(-0.000000000000000003));
    }

    #[test]
    fn test_span_matches_closed_form() {
        let pool = PoolState {
            reserve_delta: dec!(123.456789),
            stable_delta: dec!(-1),
        };
        // 6^5 / 7^5 = 7776 / 16807
        let next = pool.replenish(7, 5);
        assert_eq!(next.reserve_delta, dec!(57.11905701576723984));
        assert_eq!(next.stable_delta, dec!(-0.462664366037960373));
    }

    #[test]
    fn test_long_gap_returns_promptly() {
        let pool = PoolState {
            reserve_delta: dec!(5000),
            stable_delta: dec!(-5000),
        };
        assert!(pool.replenish(100, u64::MAX).is_balanced());

        let slow = pool.replenish(1_000_000_000, 1_000);
        assert!(slow.reserve_delta < dec!(5000));
        assert!(slow.reserve_delta > dec!(4999));
        assert!(slow.stable_delta > dec!(-5000));
    }

    #[test]
    fn test_shifted_updates_one_side() {
        let pool = PoolState::new()
            .shifted(PoolSide::Stable, dec!(-100))
            .unwrap()
            .shifted(PoolSide::Reserve, dec!(50))
            .unwrap();
        assert_eq!(pool.stable_delta, dec!(-100));
        assert_eq!(pool.reserve_delta, dec!(50));
    }

    #[test]
    fn test_shifted_overflow() {
        let pool = PoolState {
            reserve_delta: Decimal::MAX,
            stable_delta: Decimal::ZERO,
        };
        assert!(pool.shifted(PoolSide::Reserve, Decimal::MAX).is_err());
    }

    #[test]
    fn test_side_of_denom() {
        let params = Params::default();
        assert_eq!(PoolSide::of(&Denom::new("uluna"), &params), PoolSide::Reserve);
        assert_eq!(PoolSide::of(&Denom::new("uusd"), &params), PoolSide::Stable);
    }
}
