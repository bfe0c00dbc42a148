//! Seigniorage accounting and routing.
//!
//! - **accrual** — per-block running total fed by swap fees
//! - **routes** — governance-approved weighted destinations
//! - **router** — block-end split of the accrual across the routes

pub mod accrual;
pub mod router;
pub mod routes;
