//! The currency-exchange market: configuration, pool, pricing and swaps.

pub mod error;
pub mod msgs;
pub mod params;
pub mod pool;
pub mod pricing;
pub mod swap;
