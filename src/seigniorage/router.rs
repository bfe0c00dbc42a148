use crate::core::account::AccountId;
use crate::core::coin::{amount_to_decimal, floor_to_amount, Coin};
use crate::core::denom::Denom;
use crate::core::ledger::{CacheLedger, Ledger};
use crate::market::error::MarketError;
use crate::seigniorage::routes::RouteSet;
use serde::{Deserialize, Serialize};

/// One transfer issued by a distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub address: AccountId,
    pub coin: Coin,
}

/// Split `amount` of `denom` held by `source` across `routes`.
///
/// Routes are paid in order, each `floor(amount * weight)` capped at what is
/// left; the last route takes whatever remains, so the payouts always sum
/// to `amount` exactly. A zero or negative amount pays nothing.
///
/// The route set is trusted as validated. All transfers commit together or
/// not at all.
///
/// # Examples
///
/// ```
/// use market_engine::core::account::AccountId;
/// use market_engine::core::coin::Coin;
/// use market_engine::core::denom::Denom;
/// use market_engine::core::ledger::{BankLedger, Ledger};
/// use market_engine::seigniorage::router::distribute;
/// use market_engine::seigniorage::routes::{RouteSet, SeigniorageRoute};
/// use rust_decimal_macros::dec;
///
/// let market = AccountId::new("market");
/// let mut ledger = BankLedger::new().with_balance(&market, Coin::new("uluna", 101)).unwrap();
/// let routes = RouteSet::new(vec![
///     SeigniorageRoute::new("r1", dec!(0.5)),
///     SeigniorageRoute::new("r2", dec!(0.5)),
/// ]).unwrap();
///
/// let payouts = distribute(101, &routes, &market, &Denom::new("uluna"), &mut ledger).unwrap();
/// assert_eq!(payouts[0].coin.amount, 50);
/// assert_eq!(payouts[1].coin.amount, 51);
/// ```
pub fn distribute<L: Ledger + ?Sized>(
    amount: i128,
    routes: &RouteSet,
    source: &AccountId,
    denom: &Denom,
    ledger: &mut L,
) -> Result<Vec<Payout>, MarketError> {
    if amount <= 0 {
        return Ok(Vec::new());
    }
    let total = amount as u128;
    let total_dec = amount_to_decimal(total)?;

    let mut remaining = total;
    let mut payouts = Vec::with_capacity(routes.len());
    let last = routes.len().saturating_sub(1);
    for (i, route) in routes.routes().iter().enumerate() {
        let share = if i == last {
            remaining
        } else {
            let share = total_dec
                .checked_mul(route.weight)
                .ok_or_else(|| MarketError::Overflow(format!("{total} * {}", route.weight)))?;
            floor_to_amount(share)?.min(remaining)
        };
        remaining -= share;
        payouts.push(Payout {
            address: route.address.clone(),
            coin: Coin::new(denom.clone(), share),
        });
    }

    let mut cache = CacheLedger::new(ledger);
    for payout in payouts.iter().filter(|p| !p.coin.is_zero()) {
        cache.transfer(source, &payout.address, &payout.coin)?;
    }
    cache.commit()?;

    for payout in &payouts {
        log::info!("seigniorage {} -> {}", payout.coin, payout.address);
    }
    Ok(payouts)
}
