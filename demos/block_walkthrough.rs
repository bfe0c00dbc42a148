//! Two-block walkthrough of the market module.
//!
//! Shows a swap moving the virtual pool, the spread widening for the next
//! trader, seigniorage paid out at block end, and a governance route change
//! that only takes effect from the following block.

use market_engine::core::account::AccountId;
use market_engine::core::coin::Coin;
use market_engine::core::denom::Denom;
use market_engine::core::ledger::{BankLedger, Ledger};
use market_engine::core::rates::RateTable;
use market_engine::engine::{DeliverResponse, GenesisState, MarketEngine};
use market_engine::market::msgs::{MarketMsg, MsgRouteChange, MsgSwap, RouteChangeProposal};
use market_engine::seigniorage::routes::SeigniorageRoute;
use rust_decimal_macros::dec;

fn main() {
    println!("╔═══════════════════════════════════════════╗");
    println!("║  market-engine: Two Blocks of Swaps       ║");
    println!("╚═══════════════════════════════════════════╝\n");

    let mut rates = RateTable::new(Denom::new("usdr"));
    rates.set_rate(Denom::new("uusd"), dec!(1)).unwrap();
    rates.set_rate(Denom::new("uluna"), dec!(2)).unwrap();

    let alice = AccountId::new("alice");
    let bob = AccountId::new("bob");
    let mut ledger = BankLedger::new()
        .with_balance(&alice, Coin::new("uusd", 1_000_000))
        .unwrap()
        .with_balance(&bob, Coin::new("uusd", 1_000_000))
        .unwrap();

    let mut engine = MarketEngine::from_genesis(GenesisState::default()).unwrap();
    let uluna = Denom::new("uluna");

    println!("Rates: 1 uusd = 1 usdr, 1 uluna = 2 usdr");
    println!("Base pool: {} usdr\n", engine.params().base_pool);

    // Block 1: two traders buy uluna back to back
    println!("── Block 1 ──");
    for trader in [&alice, &bob] {
        let msg = MarketMsg::Swap(MsgSwap::new(
            trader.clone(),
            Coin::new("uusd", 20_000),
            uluna.clone(),
        ));
        if let DeliverResponse::Swap(outcome) = engine.deliver(&msg, &rates, &mut ledger).unwrap() {
            println!(
                "  {:<6} 20000uusd → {:<12} spread {}",
                trader.to_string(),
                outcome.ask.to_string(),
                outcome.spread
            );
        }
    }
    println!(
        "  Pool after swaps: reserve {} / stable {}",
        engine.pool().reserve_delta,
        engine.pool().stable_delta
    );

    let proposal = RouteChangeProposal::new(
        "Fund the oracle",
        "Send 30% of seigniorage to the oracle reward pool",
        vec![
            SeigniorageRoute::new("oracle_pool", dec!(0.3)),
            SeigniorageRoute::new("community_pool", dec!(0.7)),
        ],
    );
    engine
        .deliver(
            &MarketMsg::RouteChange(MsgRouteChange {
                authority: AccountId::new("gov"),
                proposal,
            }),
            &rates,
            &mut ledger,
        )
        .unwrap();
    println!("  Route change accepted (pending)");

    let summary = engine.end_block(1, &mut ledger).unwrap();
    println!("  End block: distributed {:?}", summary.distributed.map(|c| c.to_string()));
    for payout in &summary.payouts {
        println!("    {} ← {}", payout.address, payout.coin);
    }
    println!(
        "  Pool replenished: reserve {} / stable {}\n",
        summary.pool.reserve_delta, summary.pool.stable_delta
    );

    // Block 2: the new routes are active
    println!("── Block 2 ──");
    let msg = MarketMsg::Swap(MsgSwap::new(
        alice.clone(),
        Coin::new("uusd", 20_000),
        uluna.clone(),
    ));
    if let DeliverResponse::Swap(outcome) = engine.deliver(&msg, &rates, &mut ledger).unwrap() {
        println!(
            "  alice  20000uusd → {:<12} spread {}",
            outcome.ask.to_string(),
            outcome.spread
        );
    }
    let summary = engine.end_block(2, &mut ledger).unwrap();
    for payout in &summary.payouts {
        println!("    {} ← {}", payout.address, payout.coin);
    }

    println!("\nFinal uluna balances:");
    for account in ["alice", "bob", "oracle_pool", "community_pool"] {
        println!(
            "  {:<15} {}",
            account,
            ledger.balance(&AccountId::new(account), &uluna)
        );
    }
    println!("  total supply    {}", ledger.supply(&uluna));
}
