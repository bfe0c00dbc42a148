//! Random swap traffic for stress testing the engine.
//!
//! Generates blocks of swap messages from a pool of funded traders and
//! drives them through an engine. Randomness stays here: the engine itself
//! only ever sees the resulting, fixed message order.

use crate::core::account::AccountId;
use crate::core::coin::Coin;
use crate::core::denom::Denom;
use crate::core::ledger::{BankLedger, LedgerError};
use crate::core::rates::RateSource;
use crate::engine::{DeliverResponse, MarketEngine};
use crate::market::error::MarketError;
use crate::market::msgs::{MarketMsg, MsgSwap, MsgSwapSend};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Configuration for generating random swap traffic.
#[derive(Debug, Clone)]
pub struct SwapStreamConfig {
    /// Number of distinct traders.
    pub trader_count: usize,
    /// Denoms traders hold and swap between.
    pub denoms: Vec<Denom>,
    /// Swaps generated per block.
    pub swaps_per_block: usize,
    /// Number of blocks.
    pub blocks: u64,
    /// Smallest offer amount.
    pub min_amount: u128,
    /// Largest offer amount.
    pub max_amount: u128,
    /// Starting balance of every trader in every denom.
    pub initial_balance: u128,
    /// Seed for reproducible streams.
    pub seed: u64,
}

impl Default for SwapStreamConfig {
    fn default() -> Self {
        Self {
            trader_count: 10,
            denoms: vec![
                Denom::new("uluna"),
                Denom::new("uusd"),
                Denom::new("ukrw"),
            ],
            swaps_per_block: 20,
            blocks: 10,
            min_amount: 1_000,
            max_amount: 10_000,
            initial_balance: 10_000_000_000,
            seed: 42,
        }
    }
}

/// Totals from driving a stream through an engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub blocks: u64,
    pub executed: usize,
    pub rejected: usize,
    /// Seigniorage paid out over all blocks, in the seigniorage denom.
    pub distributed: u128,
}

fn trader(i: usize) -> AccountId {
    AccountId::new(format!("trader-{:03}", i))
}

/// Ledger where every trader holds `initial_balance` of every denom.
pub fn fund_traders(config: &SwapStreamConfig) -> Result<BankLedger, LedgerError> {
    let mut ledger = BankLedger::new();
    for i in 0..config.trader_count {
        for denom in &config.denoms {
            let coin = Coin::new(denom.clone(), config.initial_balance);
            ledger = ledger.with_balance(&trader(i), coin)?;
        }
    }
    Ok(ledger)
}

/// Generate `config.blocks` blocks of swap messages.
pub fn generate_blocks(config: &SwapStreamConfig) -> Vec<Vec<MarketMsg>> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    (0..config.blocks)
        .map(|_| {
            (0..config.swaps_per_block)
                .filter_map(|_| random_swap(config, &mut rng))
                .collect()
        })
        .collect()
}

fn random_swap(config: &SwapStreamConfig, rng: &mut StdRng) -> Option<MarketMsg> {
    if config.denoms.len() < 2 || config.trader_count == 0 {
        return None;
    }
    let offer_idx = rng.gen_range(0..config.denoms.len());
    let mut ask_idx = rng.gen_range(0..config.denoms.len());
    while ask_idx == offer_idx {
        ask_idx = rng.gen_range(0..config.denoms.len());
    }
    let amount = rng.gen_range(config.min_amount..=config.max_amount.max(config.min_amount));
    let offer = Coin::new(config.denoms[offer_idx].clone(), amount);
    let ask = config.denoms[ask_idx].clone();
    let sender = trader(rng.gen_range(0..config.trader_count));

    // roughly one in four swaps pays someone else
    if rng.gen_bool(0.25) {
        let receiver = trader(rng.gen_range(0..config.trader_count));
        Some(MarketMsg::SwapSend(MsgSwapSend::new(sender, receiver, offer, ask)))
    } else {
        Some(MarketMsg::Swap(MsgSwap::new(sender, offer, ask)))
    }
}

/// Deliver every generated block to `engine`, ending each block in turn.
///
/// Rejected swaps are counted, not fatal; a failing block end is.
pub fn run_stream(
    engine: &mut MarketEngine,
    blocks: &[Vec<MarketMsg>],
    rates: &impl RateSource,
    ledger: &mut BankLedger,
) -> Result<SimulationReport, MarketError> {
    let mut report = SimulationReport::default();
    for block in blocks {
        for msg in block {
            match engine.deliver(msg, rates, ledger) {
                Ok(DeliverResponse::Swap(_)) | Ok(DeliverResponse::RouteChangeAccepted) => {
                    report.executed += 1
                }
                Err(_) => report.rejected += 1,
            }
        }
        let summary = engine.end_block(engine.height() + 1, ledger)?;
        report.distributed += summary.distributed.map(|c| c.amount).unwrap_or(0);
        report.blocks += 1;
    }
    Ok(report)
}
