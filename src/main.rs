//! market-engine CLI
//!
//! Drive the market module from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Print the default genesis state
//! market-engine genesis
//!
//! # Price a swap without executing it
//! market-engine quote --rates rates.json --offer 100uusd --ask uluna
//!
//! # Replay a scenario of blocks
//! market-engine simulate --input scenario.json --format json
//!
//! # Push random swap traffic through a fresh engine
//! market-engine stress --blocks 100 --swaps 50
//! ```
//!
//! Set `RUST_LOG=info` to see swaps, payouts and route changes as they happen.

use market_engine::codec::{decode_genesis, encode_genesis};
use market_engine::core::account::AccountId;
use market_engine::core::coin::Coin;
use market_engine::core::denom::Denom;
use market_engine::core::ledger::{BankLedger, Ledger};
use market_engine::core::rates::RateTable;
use market_engine::engine::{BlockSummary, DeliverResponse, GenesisState, MarketEngine};
use market_engine::market::msgs::{MarketMsg, SwapRequest};
use market_engine::simulation::swap_stream::{
    fund_traders, generate_blocks, run_stream, SwapStreamConfig,
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fs;
use std::process;

fn print_usage() {
    eprintln!(
        r#"market-engine — deterministic swap market and seigniorage routing

USAGE:
    market-engine <COMMAND> [OPTIONS]

COMMANDS:
    genesis     Print the default genesis state
    quote       Price a swap against a genesis state without executing it
    simulate    Replay blocks of messages from a scenario file
    stress      Run random swap traffic through a fresh engine
    help        Show this message

OPTIONS (genesis):
    --output <FILE>     Write to file instead of stdout

OPTIONS (quote):
    --rates <FILE>      Path to JSON rates file (required)
    --offer <COIN>      Offer coin, e.g. 100uusd (required)
    --ask <DENOM>       Denom to receive (required)
    --genesis <FILE>    Genesis state to quote against (default: built-in)

OPTIONS (simulate):
    --input <FILE>      Path to JSON scenario file
    --format <FORMAT>   Output format: text (default) or json

OPTIONS (stress):
    --blocks <N>        Number of blocks (default: 10)
    --swaps <N>         Swaps per block (default: 20)
    --traders <N>       Number of traders (default: 10)
    --seed <N>          RNG seed (default: 42)
    --format <FORMAT>   Output format: text (default) or json

EXAMPLES:
    market-engine genesis --output genesis.json
    market-engine quote --rates rates.json --offer 100uusd --ask uluna
    market-engine simulate --input scenario.json
    market-engine stress --blocks 100 --swaps 50 --seed 7"#
    );
}

/// Published rates, keyed by denom, in reference units per unit.
#[derive(serde::Deserialize)]
struct RatesFile {
    rates: BTreeMap<String, String>,
}

/// One transaction in a scenario: a tagged message or a REST-style request.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum ScenarioTx {
    Msg(MarketMsg),
    Request(SwapRequest),
}

#[derive(serde::Deserialize)]
struct ScenarioBlock {
    height: Option<u64>,
    #[serde(default)]
    txs: Vec<ScenarioTx>,
}

#[derive(serde::Deserialize)]
struct BalanceInput {
    account: String,
    denom: String,
    amount: String,
}

#[derive(serde::Deserialize)]
struct ScenarioFile {
    #[serde(default)]
    genesis: GenesisState,
    rates: BTreeMap<String, String>,
    #[serde(default)]
    balances: Vec<BalanceInput>,
    blocks: Vec<ScenarioBlock>,
}

/// JSON output schema for one delivered transaction.
#[derive(serde::Serialize)]
struct TxOutput {
    kind: &'static str,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    ask: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    spread: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(serde::Serialize)]
struct BlockOutput {
    txs: Vec<TxOutput>,
    summary: BlockSummary,
}

#[derive(serde::Serialize)]
struct SimulationOutput {
    blocks: Vec<BlockOutput>,
    final_state: GenesisState,
    balances: Vec<BalanceOutput>,
}

#[derive(serde::Serialize)]
struct BalanceOutput {
    account: String,
    denom: String,
    amount: String,
}

fn fail(message: String) -> ! {
    eprintln!("{}", message);
    process::exit(1);
}

fn read_file(path: &str) -> String {
    fs::read_to_string(path)
        .unwrap_or_else(|e| fail(format!("Error reading file '{}': {}", path, e)))
}

fn build_rates(reference: &Denom, raw: &BTreeMap<String, String>) -> RateTable {
    let mut rates = RateTable::new(reference.clone());
    for (denom, rate) in raw {
        if Denom::new(denom.as_str()) == *reference {
            continue;
        }
        let value: Decimal = rate
            .parse()
            .unwrap_or_else(|e| fail(format!("Invalid rate '{}' for {}: {}", rate, denom, e)));
        rates
            .set_rate(Denom::new(denom.as_str()), value)
            .unwrap_or_else(|e| fail(format!("Error: {}", e)));
    }
    rates
}

/// Parse "100uusd" into a coin.
fn parse_coin(text: &str) -> Option<Coin> {
    let split = text.find(|c: char| !c.is_ascii_digit())?;
    let (amount, denom) = text.split_at(split);
    let amount: u128 = amount.parse().ok()?;
    let denom = Denom::new(denom);
    denom.is_valid().then(|| Coin::new(denom, amount))
}

fn option_value(args: &[String], i: usize, what: &str) -> String {
    args.get(i)
        .cloned()
        .unwrap_or_else(|| fail(format!("{} requires {}", args[i - 1], what)))
}

fn numeric_option<T: std::str::FromStr>(args: &[String], i: usize) -> T {
    args.get(i)
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| fail(format!("{} requires a number", args[i - 1])))
}

fn cmd_genesis(args: &[String]) {
    let mut output_path: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--output" => {
                i += 1;
                output_path = Some(option_value(args, i, "a file path"));
            }
            _ => fail(format!("Unknown option: {}", args[i])),
        }
        i += 1;
    }

    let json = encode_genesis(&GenesisState::default())
        .unwrap_or_else(|e| fail(format!("Error: {}", e)));
    match output_path {
        Some(path) => {
            fs::write(&path, &json)
                .unwrap_or_else(|e| fail(format!("Error writing to '{}': {}", path, e)));
            eprintln!("Wrote default genesis → {}", path);
        }
        None => println!("{}", json),
    }
}

fn cmd_quote(args: &[String]) {
    let mut rates_path = None;
    let mut genesis_path = None;
    let mut offer = None;
    let mut ask = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--rates" => {
                i += 1;
                rates_path = Some(option_value(args, i, "a file path"));
            }
            "--genesis" => {
                i += 1;
                genesis_path = Some(option_value(args, i, "a file path"));
            }
            "--offer" => {
                i += 1;
                let text = option_value(args, i, "a coin such as 100uusd");
                offer = Some(
                    parse_coin(&text)
                        .unwrap_or_else(|| fail(format!("Invalid coin '{}'", text))),
                );
            }
            "--ask" => {
                i += 1;
                ask = Some(Denom::new(option_value(args, i, "a denom")));
            }
            _ => fail(format!("Unknown option: {}", args[i])),
        }
        i += 1;
    }

    let rates_path = rates_path.unwrap_or_else(|| fail("Error: --rates <FILE> is required".into()));
    let offer = offer.unwrap_or_else(|| fail("Error: --offer <COIN> is required".into()));
    let ask = ask.unwrap_or_else(|| fail("Error: --ask <DENOM> is required".into()));

    let genesis = match genesis_path {
        Some(path) => decode_genesis(&read_file(&path))
            .unwrap_or_else(|e| fail(format!("Error parsing genesis: {}", e))),
        None => GenesisState::default(),
    };
    let engine =
        MarketEngine::from_genesis(genesis).unwrap_or_else(|e| fail(format!("Error: {}", e)));

    let file: RatesFile = serde_json::from_str(&read_file(&rates_path)).unwrap_or_else(|e| {
        eprintln!("Error parsing JSON: {}", e);
        eprintln!("Expected format:");
        eprintln!(r#"{{ "rates": {{ "uusd": "1", "uluna": "2" }} }}"#);
        process::exit(1);
    });
    let rates = build_rates(&engine.params().reference_denom, &file.rates);

    match engine.quote(&offer, &ask, &rates) {
        Ok(quote) => {
            println!("Offer:        {}", offer);
            println!("Receive:      {}", quote.ask);
            println!("Spread:       {}", quote.spread);
            println!("Fee:          {}{}", quote.fee, ask);
            println!("Offer value:  {} {}", quote.offer_value, engine.params().reference_denom);
            println!("Moves pool:   {}", if quote.touches_pool { "yes" } else { "no" });
        }
        Err(e) => fail(format!("Quote failed: {}", e)),
    }
}

fn tx_output(msg: &MarketMsg, result: &Result<DeliverResponse, String>) -> TxOutput {
    let mut out = TxOutput {
        kind: msg.kind(),
        ok: result.is_ok(),
        ask: None,
        spread: None,
        fee: None,
        error: None,
    };
    match result {
        Ok(DeliverResponse::Swap(outcome)) => {
            out.ask = Some(outcome.ask.to_string());
            out.spread = Some(outcome.spread.to_string());
            out.fee = Some(outcome.fee.to_string());
        }
        Ok(DeliverResponse::RouteChangeAccepted) => {}
        Err(e) => out.error = Some(e.clone()),
    }
    out
}

fn cmd_simulate(args: &[String]) {
    let mut input_path = None;
    let mut format = "text".to_string();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input_path = Some(option_value(args, i, "a file path"));
            }
            "--format" => {
                i += 1;
                format = option_value(args, i, "'text' or 'json'");
            }
            _ => fail(format!("Unknown option: {}", args[i])),
        }
        i += 1;
    }

    let path = input_path.unwrap_or_else(|| fail("Error: --input <FILE> is required".into()));
    let scenario: ScenarioFile = serde_json::from_str(&read_file(&path)).unwrap_or_else(|e| {
        eprintln!("Error parsing JSON: {}", e);
        eprintln!("Expected format:");
        eprintln!(r#"{{
  "rates": {{ "uusd": "1", "uluna": "2" }},
  "balances": [ {{ "account": "alice", "denom": "uusd", "amount": "1000000" }} ],
  "blocks": [
    {{ "txs": [ {{ "sender": "alice",
                 "offer_coin": {{ "denom": "uusd", "amount": "100" }},
                 "ask_denom": "uluna" }} ] }}
  ]
}}"#);
        process::exit(1);
    });

    let mut engine = MarketEngine::from_genesis(scenario.genesis)
        .unwrap_or_else(|e| fail(format!("Error: {}", e)));
    let rates = build_rates(&engine.params().reference_denom, &scenario.rates);

    let mut ledger = BankLedger::new();
    for balance in scenario.balances {
        let amount: u128 = balance.amount.parse().unwrap_or_else(|e| {
            fail(format!("Invalid amount '{}': {}", balance.amount, e))
        });
        ledger = ledger
            .with_balance(
                &AccountId::new(balance.account),
                Coin::new(balance.denom, amount),
            )
            .unwrap_or_else(|e| fail(format!("Error: {}", e)));
    }

    let mut blocks = Vec::new();
    for block in scenario.blocks {
        let height = block.height.unwrap_or(engine.height() + 1);
        let mut txs = Vec::new();
        for tx in block.txs {
            let msg = match tx {
                ScenarioTx::Msg(msg) => msg,
                ScenarioTx::Request(request) => request.into_msg(),
            };
            let result = engine
                .deliver(&msg, &rates, &mut ledger)
                .map_err(|e| e.to_string());
            txs.push(tx_output(&msg, &result));
        }
        let summary = engine
            .end_block(height, &mut ledger)
            .unwrap_or_else(|e| fail(format!("Block {} failed: {}", height, e)));
        blocks.push(BlockOutput { txs, summary });
    }

    if format == "json" {
        let balances = ledger
            .all_balances()
            .iter()
            .map(|((account, denom), amount)| BalanceOutput {
                account: account.to_string(),
                denom: denom.to_string(),
                amount: amount.to_string(),
            })
            .collect();
        let output = SimulationOutput {
            blocks,
            final_state: engine.export_genesis(),
            balances,
        };
        let json = serde_json::to_string_pretty(&output)
            .unwrap_or_else(|e| fail(format!("Error: {}", e)));
        println!("{}", json);
    } else {
        for block in &blocks {
            let summary = &block.summary;
            println!("Block {}", summary.height);
            for tx in &block.txs {
                match (&tx.ask, &tx.error) {
                    (Some(ask), _) => println!(
                        "  {:<14} ok     → {} (spread {}, fee {})",
                        tx.kind,
                        ask,
                        tx.spread.as_deref().unwrap_or("-"),
                        tx.fee.as_deref().unwrap_or("-")
                    ),
                    (None, Some(err)) => println!("  {:<14} failed → {}", tx.kind, err),
                    (None, None) => println!("  {:<14} ok", tx.kind),
                }
            }
            println!(
                "  Pool:         reserve {} / stable {}",
                summary.pool.reserve_delta, summary.pool.stable_delta
            );
            if let Some(coin) = &summary.distributed {
                println!("  Distributed:  {}", coin);
                for payout in &summary.payouts {
                    println!("    {:<20} {}", payout.address.to_string(), payout.coin);
                }
            }
            if summary.routes_changed {
                println!("  Routes:       new routes active from next block");
            }
        }
        let seigniorage = &engine.params().seigniorage_denom;
        println!(
            "\nModule {} holds {}{}",
            engine.module_account(),
            ledger.balance(engine.module_account(), seigniorage),
            seigniorage
        );
    }
}

fn cmd_stress(args: &[String]) {
    let mut config = SwapStreamConfig::default();
    let mut format = "text".to_string();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--blocks" => {
                i += 1;
                config.blocks = numeric_option(args, i);
            }
            "--swaps" => {
                i += 1;
                config.swaps_per_block = numeric_option(args, i);
            }
            "--traders" => {
                i += 1;
                config.trader_count = numeric_option(args, i);
            }
            "--seed" => {
                i += 1;
                config.seed = numeric_option(args, i);
            }
            "--format" => {
                i += 1;
                format = option_value(args, i, "'text' or 'json'");
            }
            _ => fail(format!("Unknown option: {}", args[i])),
        }
        i += 1;
    }

    let mut rates = RateTable::new(Denom::new("usdr"));
    let prices = [
        ("uluna", Decimal::from(2)),
        ("uusd", Decimal::ONE),
        ("ukrw", Decimal::new(1, 3)),
    ];
    for (denom, rate) in prices {
        rates
            .set_rate(Denom::new(denom), rate)
            .unwrap_or_else(|e| fail(format!("Error: {}", e)));
    }

    let mut engine = MarketEngine::from_genesis(GenesisState::default())
        .unwrap_or_else(|e| fail(format!("Error: {}", e)));
    let mut ledger = fund_traders(&config).unwrap_or_else(|e| fail(format!("Error: {}", e)));
    let blocks = generate_blocks(&config);
    let report = run_stream(&mut engine, &blocks, &rates, &mut ledger)
        .unwrap_or_else(|e| fail(format!("Error: {}", e)));

    if format == "json" {
        let json = serde_json::to_string_pretty(&report)
            .unwrap_or_else(|e| fail(format!("Error: {}", e)));
        println!("{}", json);
    } else {
        println!("Blocks:       {}", report.blocks);
        println!("Executed:     {}", report.executed);
        println!("Rejected:     {}", report.rejected);
        println!("Distributed:  {}{}", report.distributed, engine.params().seigniorage_denom);
        println!(
            "Final pool:   reserve {} / stable {}",
            engine.pool().reserve_delta,
            engine.pool().stable_delta
        );
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "genesis" => cmd_genesis(rest),
        "quote" => cmd_quote(rest),
        "simulate" => cmd_simulate(rest),
        "stress" => cmd_stress(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}
