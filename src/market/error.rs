use crate::core::coin::AmountOverflow;
use crate::core::denom::Denom;
use crate::core::ledger::LedgerError;
use crate::market::params::ParamsError;
use crate::seigniorage::accrual::AccrualOverflow;
use crate::seigniorage::routes::{RouteError, Unauthorized};
use rust_decimal::Decimal;
use thiserror::Error;

/// Every way a market operation can fail.
///
/// All variants are terminal for the operation that raised them; the
/// engine never retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarketError {
    #[error("no effective price for {0}")]
    NoEffectivePrice(Denom),
    #[error("swap amount must be positive")]
    InvalidSwapAmount,
    #[error("offer and ask denom are both {0}")]
    RecursiveSwap(Denom),
    #[error("swap produces zero {0}")]
    ZeroSwapOutput(Denom),
    #[error("offer worth {value} reference units exceeds the swap limit of {limit}")]
    ExceedsSwapLimit { value: Decimal, limit: Decimal },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("invalid route weights: {0}")]
    InvalidRouteWeights(#[from] RouteError),
    #[error("{0} is not authorized to change seigniorage routes")]
    UnauthorizedRouteChange(String),
    #[error("arithmetic overflow: {0}")]
    Overflow(String),
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error("block height {height} does not follow {last}")]
    BlockHeight { height: u64, last: u64 },
    #[error("invalid params: {0}")]
    InvalidParams(#[from] ParamsError),
}

impl From<AmountOverflow> for MarketError {
    fn from(err: AmountOverflow) -> Self {
        MarketError::Overflow(err.0)
    }
}

impl From<AccrualOverflow> for MarketError {
    fn from(err: AccrualOverflow) -> Self {
        MarketError::Overflow(err.to_string())
    }
}

impl From<Unauthorized> for MarketError {
    fn from(err: Unauthorized) -> Self {
        MarketError::UnauthorizedRouteChange(err.caller.to_string())
    }
}

impl MarketError {
    /// True when the ledger refused the sender's debit.
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(
            self,
            MarketError::Ledger(LedgerError::InsufficientFunds { .. })
        )
    }
}
