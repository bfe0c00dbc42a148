//! Ledger primitives shared by the market and seigniorage layers.

pub mod account;
pub mod coin;
pub mod denom;
pub mod ledger;
pub mod rates;
