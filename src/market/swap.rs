//! Atomic swap execution.
//!
//! A swap either commits every effect (ledger movements, pool update,
//! seigniorage accrual) or none of them. All fallible work happens against
//! copies and a [`CacheLedger`]; state is only written once nothing can fail.

use crate::core::account::AccountId;
use crate::core::coin::{amount_to_decimal, Coin};
use crate::core::ledger::{CacheLedger, Ledger};
use crate::core::rates::RateSource;
use crate::market::error::MarketError;
use crate::market::msgs::SwapRequest;
use crate::market::params::Params;
use crate::market::pool::{PoolSide, PoolState};
use crate::market::pricing::{convert_floor, quote, SwapQuote};
use crate::seigniorage::accrual::SeigniorageAccrual;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Observable record of an executed swap, for indexers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapEvent {
    pub sender: AccountId,
    pub receiver: AccountId,
    pub offer: Coin,
    pub ask: Coin,
    pub spread: Decimal,
    /// Fee withheld, in the ask denom.
    pub fee: Coin,
}

/// What an executed swap did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapOutcome {
    pub ask: Coin,
    pub spread: Decimal,
    /// Fee withheld, in the ask denom.
    pub fee: Coin,
    /// The fee re-expressed in the seigniorage denom and accrued.
    pub seigniorage: Coin,
    pub pool: PoolState,
    pub event: SwapEvent,
}

/// Mutable market state a swap touches.
pub struct SwapState<'a> {
    pub pool: &'a mut PoolState,
    pub accrual: &'a mut SeigniorageAccrual,
}

/// Pool after applying a priced swap: the offer side shrinks by what was
/// offered and the ask side grows by the pre-spread converted amount, each
/// in its own side's units.
pub fn apply_to_pool(
    pool: &PoolState,
    offer: &Coin,
    quote: &SwapQuote,
    params: &Params,
) -> Result<PoolState, MarketError> {
    if !quote.touches_pool {
        return Ok(*pool);
    }
    let offer_side = PoolSide::of(&offer.denom, params);
    let ask_side = PoolSide::of(&quote.ask.denom, params);

    let outflow = match offer_side {
        PoolSide::Reserve => amount_to_decimal(offer.amount)?,
        PoolSide::Stable => quote.offer_value,
    };
    let inflow = match ask_side {
        PoolSide::Reserve => quote.base_amount,
        PoolSide::Stable => quote.offer_value,
    };

    pool.shifted(offer_side, -outflow)?.shifted(ask_side, inflow)
}

/// Run one swap end to end.
///
/// `module` is the market's own account: it receives and burns the offer,
/// mints the ask coin before paying it out, and holds minted seigniorage
/// until the block-end distribution.
pub fn execute<R: RateSource, L: Ledger + ?Sized>(
    request: &SwapRequest,
    module: &AccountId,
    params: &Params,
    state: SwapState<'_>,
    rates: &R,
    ledger: &mut L,
) -> Result<SwapOutcome, MarketError> {
    let SwapState { pool, accrual } = state;
    let offer = &request.offer_coin;
    let quote = quote(offer, &request.ask_denom, pool, params, rates)?;

    if quote.touches_pool {
        let limit = params.max_swap_value();
        if quote.offer_value > limit {
            return Err(MarketError::ExceedsSwapLimit {
                value: quote.offer_value,
                limit,
            });
        }
    }

    let next_pool = apply_to_pool(pool, offer, &quote, params)?;

    let fee = Coin::new(request.ask_denom.clone(), quote.fee);
    let seigniorage = Coin::new(
        params.seigniorage_denom.clone(),
        convert_floor(quote.fee, &request.ask_denom, &params.seigniorage_denom, rates)?,
    );

    let mut next_accrual = *accrual;
    let accrued = i128::try_from(seigniorage.amount)
        .map_err(|_| MarketError::Overflow(format!("seigniorage {seigniorage}")))?;
    next_accrual.accrue(accrued)?;

    let receiver = request.receiver();
    let mut cache = CacheLedger::new(ledger);
    cache.transfer(&request.sender, module, offer)?;
    cache.burn(module, offer)?;
    cache.mint(module, &quote.ask)?;
    cache.transfer(module, receiver, &quote.ask)?;
    if !seigniorage.is_zero() {
        cache.mint(module, &seigniorage)?;
    }
    cache.commit()?;

    *pool = next_pool;
    *accrual = next_accrual;

    let event = SwapEvent {
        sender: request.sender.clone(),
        receiver: receiver.clone(),
        offer: offer.clone(),
        ask: quote.ask.clone(),
        spread: quote.spread,
        fee: fee.clone(),
    };
    log::info!(
        "swap {} -> {} by {} to {} (spread {}, fee {})",
        event.offer,
        event.ask,
        event.sender,
        event.receiver,
        event.spread,
        event.fee
    );

    Ok(SwapOutcome {
        ask: quote.ask,
        spread: quote.spread,
        fee,
        seigniorage,
        pool: next_pool,
        event,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::denom::Denom;
    use crate::core::ledger::BankLedger;
    use crate::core::rates::RateTable;
    use rust_decimal_macros::dec;

    fn module() -> AccountId {
        AccountId::new("market")
    }

    fn trader() -> AccountId {
        AccountId::new("trader")
    }

    fn rates() -> RateTable {
        let mut rates = RateTable::new(Denom::new("usdr"));
        rates.set_rate(Denom::new("uusd"), dec!(1)).unwrap();
        rates.set_rate(Denom::new("ukrw"), dec!(0.001)).unwrap();
        rates.set_rate(Denom::new("uluna"), dec!(2)).unwrap();
        rates
    }

    fn ledger() -> BankLedger {
        BankLedger::new()
            .with_balance(&trader(), Coin::new("uusd", 1_000_000))
            .unwrap()
            .with_balance(&trader(), Coin::new("uluna", 1_000_000))
            .unwrap()
    }

    fn request(offer: Coin, ask: &str) -> SwapRequest {
        SwapRequest {
            sender: trader(),
            offer_coin: offer,
            ask_denom: Denom::new(ask),
            receiver: None,
        }
    }

    fn run(
        req: &SwapRequest,
        pool: &mut PoolState,
        accrual: &mut SeigniorageAccrual,
        ledger: &mut BankLedger,
    ) -> Result<SwapOutcome, MarketError> {
        execute(
            req,
            &module(),
            &Params::default(),
            SwapState { pool, accrual },
            &rates(),
            ledger,
        )
    }

    #[test]
    fn test_scenario_updates_pool_and_balances() {
        let mut pool = PoolState::new();
        let mut accrual = SeigniorageAccrual::new();
        let mut ledger = ledger();

        let outcome = run(
            &request(Coin::new("uusd", 100), "uluna"),
            &mut pool,
            &mut accrual,
            &mut ledger,
        )
        .unwrap();

        assert_eq!(outcome.ask, Coin::new("uluna", 49));
        assert_eq!(pool.stable_delta, dec!(-100));
        assert_eq!(pool.reserve_delta, dec!(50));
        assert_eq!(outcome.fee, Coin::new("uluna", 1));
        assert_eq!(accrual.current(), 1);

        let uusd = Denom::new("uusd");
        let uluna = Denom::new("uluna");
        assert_eq!(ledger.balance(&trader(), &uusd), 999_900);
        assert_eq!(ledger.balance(&trader(), &uluna), 1_000_049);
        // offer burned, fee held by the module for distribution
        assert_eq!(ledger.supply(&uusd), 999_900);
        assert_eq!(ledger.balance(&module(), &uluna), 1);
        assert_eq!(ledger.balance(&module(), &uusd), 0);
    }

    #[test]
    fn test_selling_reserve_moves_pool_the_other_way() {
        let mut pool = PoolState::new();
        let mut accrual = SeigniorageAccrual::new();
        let mut ledger = ledger();

        let outcome = run(
            &request(Coin::new("uluna", 1000), "uusd"),
            &mut pool,
            &mut accrual,
            &mut ledger,
        )
        .unwrap();

        // 1000 uluna = 2000 uusd, minus 0.5%
        assert_eq!(outcome.ask, Coin::new("uusd", 1990));
        assert_eq!(pool.reserve_delta, dec!(-1000));
        assert_eq!(pool.stable_delta, dec!(2000));
        // 10 uusd fee is worth 5 uluna
        assert_eq!(outcome.seigniorage, Coin::new("uluna", 5));
        assert_eq!(accrual.current(), 5);
    }

    #[test]
    fn test_stable_swap_leaves_pool_alone() {
        let mut pool = PoolState::new();
        let mut accrual = SeigniorageAccrual::new();
        let mut ledger = ledger();

        run(
            &request(Coin::new("uusd", 1000), "ukrw"),
            &mut pool,
            &mut accrual,
            &mut ledger,
        )
        .unwrap();
        assert!(pool.is_balanced());
        // 5000 ukrw fee = 2.5 uluna, floored
        assert_eq!(accrual.current(), 2);
    }

    #[test]
    fn test_swap_limit_rejects_without_mutation() {
        let mut pool = PoolState::new();
        let mut accrual = SeigniorageAccrual::new();
        let mut ledger = ledger();

        // 60_000 uluna = 120_000 reference units > 100_000 limit
        let err = run(
            &request(Coin::new("uluna", 60_000), "uusd"),
            &mut pool,
            &mut accrual,
            &mut ledger,
        )
        .unwrap_err();
        assert!(matches!(err, MarketError::ExceedsSwapLimit { .. }));
        assert!(pool.is_balanced());
        assert_eq!(accrual.current(), 0);
        assert_eq!(ledger, self::ledger());
    }

    #[test]
    fn test_insufficient_funds_rolls_back() {
        let mut pool = PoolState::new();
        let mut accrual = SeigniorageAccrual::new();
        let mut ledger = BankLedger::new()
            .with_balance(&trader(), Coin::new("uusd", 50))
            .unwrap();
        let before = ledger.clone();

        let err = run(
            &request(Coin::new("uusd", 100), "uluna"),
            &mut pool,
            &mut accrual,
            &mut ledger,
        )
        .unwrap_err();
        assert!(err.is_insufficient_funds());
        assert!(pool.is_balanced());
        assert_eq!(accrual.current(), 0);
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_swap_send_pays_receiver() {
        let mut pool = PoolState::new();
        let mut accrual = SeigniorageAccrual::new();
        let mut ledger = ledger();
        let mut req = request(Coin::new("uusd", 100), "uluna");
        req.receiver = Some(AccountId::new("friend"));

        let outcome = run(&req, &mut pool, &mut accrual, &mut ledger).unwrap();
        assert_eq!(outcome.event.receiver, AccountId::new("friend"));
        assert_eq!(ledger.balance(&AccountId::new("friend"), &Denom::new("uluna")), 49);
        assert_eq!(ledger.balance(&trader(), &Denom::new("uluna")), 1_000_000);
    }

    #[test]
    fn test_later_swap_sees_earlier_pool_effect() {
        let mut pool = PoolState::new();
        let mut accrual = SeigniorageAccrual::new();
        let mut ledger = ledger();

        let first = run(
            &request(Coin::new("uusd", 20_000), "uluna"),
            &mut pool,
            &mut accrual,
            &mut ledger,
        )
        .unwrap();
        let second = run(
            &request(Coin::new("uusd", 20_000), "uluna"),
            &mut pool,
            &mut accrual,
            &mut ledger,
        )
        .unwrap();

        assert_eq!(first.spread, dec!(0.005));
        // 10_000 uluna of reserve delta = 20_000 reference = 2% of base pool
        assert_eq!(second.spread, dec!(0.02));
        assert!(second.ask.amount < first.ask.amount);
    }
}
