use serde::{Deserialize, Serialize};

/// Signed running total of seigniorage for the current block.
///
/// Swaps accrue into it in transaction order; the block-end router drains
/// it. The engine owns the only instance, so every update goes through
/// `&mut self` and no reader can observe a half-applied accrual.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeigniorageAccrual {
    #[serde(with = "signed_str")]
    total: i128,
}

mod signed_str {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i128, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<i128>().map_err(de::Error::custom)
    }
}

impl SeigniorageAccrual {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> i128 {
        self.total
    }

    /// Add `amount` (negative for burned value). Fails without changing the
    /// total if the sum would overflow.
    pub fn accrue(&mut self, amount: i128) -> Result<(), AccrualOverflow> {
        self.total = self
            .total
            .checked_add(amount)
            .ok_or(AccrualOverflow { total: self.total, amount })?;
        Ok(())
    }

    /// Read the total and reset it to zero.
    pub fn drain_and_reset(&mut self) -> i128 {
        std::mem::take(&mut self.total)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("seigniorage accrual overflow: {total} + {amount}")]
pub struct AccrualOverflow {
    pub total: i128,
    pub amount: i128,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accrue_and_drain() {
        let mut accrual = SeigniorageAccrual::new();
        accrual.accrue(40).unwrap();
        accrual.accrue(-15).unwrap();
        assert_eq!(accrual.current(), 25);
        assert_eq!(accrual.drain_and_reset(), 25);
        assert_eq!(accrual.current(), 0);
        assert_eq!(accrual.drain_and_reset(), 0);
    }

    #[test]
    fn test_overflow_leaves_total_untouched() {
        let mut accrual = SeigniorageAccrual::new();
        accrual.accrue(i128::MAX).unwrap();
        assert_eq!(
            accrual.accrue(1),
            Err(AccrualOverflow {
                total: i128::MAX,
                amount: 1
            })
        );
        assert_eq!(accrual.current(), i128::MAX);
    }
}
