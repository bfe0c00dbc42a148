//! # market-engine
//!
//! Deterministic market module for a replicated ledger.
//!
//! Prices swaps between a reserve asset and oracle-priced stable assets
//! with a spread that grows as a virtual liquidity pool drifts from
//! equilibrium, lets that pool recover block by block, and routes the
//! collected seigniorage to weighted destinations chosen by governance.
//!
//! ## Architecture
//!
//! - **core** — Foundational types: denoms, accounts, coins, oracle rates, ledger
//! - **market** — Params, virtual pool, swap pricing and atomic execution
//! - **seigniorage** — Accrual, weighted routes and block-end distribution
//! - **engine** — Message delivery and the end-of-block lifecycle
//! - **codec** — JSON wire format for messages, proposals and genesis
//! - **simulation** — Random swap traffic for stress testing

pub mod codec;
pub mod core;
pub mod engine;
pub mod market;
pub mod seigniorage;
pub mod simulation;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::core::account::AccountId;
    pub use crate::core::coin::Coin;
    pub use crate::core::denom::Denom;
    pub use crate::core::ledger::{BankLedger, Ledger};
    pub use crate::core::rates::{RateSource, RateTable};
    pub use crate::engine::{BlockSummary, GenesisState, MarketEngine};
    pub use crate::market::error::MarketError;
    pub use crate::market::msgs::{MarketMsg, MsgRouteChange, MsgSwap, MsgSwapSend, SwapRequest};
    pub use crate::market::params::Params;
    pub use crate::market::pool::PoolState;
    pub use crate::seigniorage::routes::{RouteSet, SeigniorageRoute};
}
