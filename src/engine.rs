//! The market state machine.
//!
//! [`MarketEngine`] owns every piece of market state: parameters, pool,
//! seigniorage accrual and route registry. Requests are applied one at a
//! time in block order through `&mut self`; nothing is shared or global, so
//! each replica (and each test) works on its own instance.
//!
//! # Block lifecycle
//!
//! 1. [`MarketEngine::deliver`] each transaction's message in order.
//! 2. [`MarketEngine::end_block`] once: replenish the pool, distribute the
//!    block's seigniorage through the active routes, then activate any route
//!    set accepted during the block.

use crate::core::account::AccountId;
use crate::core::coin::Coin;
use crate::core::denom::Denom;
use crate::core::ledger::Ledger;
use crate::core::rates::RateSource;
use crate::market::error::MarketError;
use crate::market::msgs::{MarketMsg, RouteChangeProposal, SwapRequest};
use crate::market::params::Params;
use crate::market::pool::PoolState;
use crate::market::pricing::{quote, SwapQuote};
use crate::market::swap::{execute, SwapEvent, SwapOutcome, SwapState};
use crate::seigniorage::accrual::SeigniorageAccrual;
use crate::seigniorage::router::{distribute, Payout};
use crate::seigniorage::routes::{RouteRegistry, RouteSet};
use serde::{Deserialize, Serialize};

/// Persisted market state, used to start an engine and to export one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    pub params: Params,
    /// The market's own ledger account.
    pub module_account: AccountId,
    pub routes: RouteRegistry,
    #[serde(default)]
    pub pool: PoolState,
    #[serde(default)]
    pub accrual: SeigniorageAccrual,
    /// Height of the last block whose end was processed.
    #[serde(default)]
    pub height: u64,
}

impl Default for GenesisState {
    fn default() -> Self {
        Self {
            params: Params::default(),
            module_account: AccountId::new("market"),
            routes: RouteRegistry::new(
                AccountId::new("gov"),
                RouteSet::single("community_pool"),
            ),
            pool: PoolState::default(),
            accrual: SeigniorageAccrual::default(),
            height: 0,
        }
    }
}

/// Something indexers may want to observe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MarketEvent {
    Swap(SwapEvent),
    RouteChangeAccepted {
        title: String,
        routes: RouteSet,
    },
    Replenish {
        height: u64,
        pool: PoolState,
    },
    SeigniorageDistributed {
        height: u64,
        payouts: Vec<Payout>,
    },
    RoutesActivated {
        height: u64,
        routes: RouteSet,
    },
}

/// Result of delivering one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliverResponse {
    Swap(SwapOutcome),
    RouteChangeAccepted,
}

/// What happened at the end of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub height: u64,
    pub pool: PoolState,
    pub distributed: Option<Coin>,
    pub payouts: Vec<Payout>,
    pub routes_changed: bool,
}

#[derive(Debug, Clone)]
pub struct MarketEngine {
    params: Params,
    module_account: AccountId,
    pool: PoolState,
    accrual: SeigniorageAccrual,
    routes: RouteRegistry,
    height: u64,
    events: Vec<MarketEvent>,
}

impl MarketEngine {
    pub fn from_genesis(genesis: GenesisState) -> Result<Self, MarketError> {
        genesis.params.validate()?;
        if !genesis.module_account.is_valid() {
            return Err(MarketError::InvalidMessage(format!(
                "invalid module account '{}'",
                genesis.module_account
            )));
        }
        Ok(Self {
            params: genesis.params,
            module_account: genesis.module_account,
            pool: genesis.pool,
            accrual: genesis.accrual,
            routes: genesis.routes,
            height: genesis.height,
            events: Vec::new(),
        })
    }

    pub fn export_genesis(&self) -> GenesisState {
        GenesisState {
            params: self.params.clone(),
            module_account: self.module_account.clone(),
            routes: self.routes.clone(),
            pool: self.pool,
            accrual: self.accrual,
            height: self.height,
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn module_account(&self) -> &AccountId {
        &self.module_account
    }

    pub fn pool(&self) -> &PoolState {
        &self.pool
    }

    pub fn accrual(&self) -> &SeigniorageAccrual {
        &self.accrual
    }

    pub fn routes(&self) -> &RouteRegistry {
        &self.routes
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    /// Take every event emitted since the last call.
    pub fn drain_events(&mut self) -> Vec<MarketEvent> {
        std::mem::take(&mut self.events)
    }

    /// Price a swap against the current pool without executing it.
    pub fn quote(
        &self,
        offer: &Coin,
        ask_denom: &Denom,
        rates: &impl RateSource,
    ) -> Result<SwapQuote, MarketError> {
        quote(offer, ask_denom, &self.pool, &self.params, rates)
    }

    /// Validate and apply one message.
    ///
    /// A route change from anyone but the route authority is refused before
    /// its content is looked at.
    pub fn deliver<R: RateSource, L: Ledger + ?Sized>(
        &mut self,
        msg: &MarketMsg,
        rates: &R,
        ledger: &mut L,
    ) -> Result<DeliverResponse, MarketError> {
        let result = self
            .check_authority(msg)
            .and_then(|()| msg.validate_basic())
            .and_then(|()| match msg {
                MarketMsg::Swap(swap) => self
                    .swap(&swap.to_request(), rates, ledger)
                    .map(DeliverResponse::Swap),
                MarketMsg::SwapSend(swap) => self
                    .swap(&swap.to_request(), rates, ledger)
                    .map(DeliverResponse::Swap),
                MarketMsg::RouteChange(change) => self
                    .change_routes(&change.authority, &change.proposal)
                    .map(|()| DeliverResponse::RouteChangeAccepted),
            });
        if let Err(err) = &result {
            log::warn!("{} rejected: {}", msg.kind(), err);
        }
        result
    }

    fn check_authority(&self, msg: &MarketMsg) -> Result<(), MarketError> {
        match msg {
            MarketMsg::RouteChange(change) if change.authority != *self.routes.authority() => Err(
                MarketError::UnauthorizedRouteChange(change.authority.to_string()),
            ),
            _ => Ok(()),
        }
    }

    /// Execute a swap against the engine's state.
    ///
    /// The module account can't swap: its balance backs the pending
    /// seigniorage payout.
    pub fn swap<R: RateSource, L: Ledger + ?Sized>(
        &mut self,
        request: &SwapRequest,
        rates: &R,
        ledger: &mut L,
    ) -> Result<SwapOutcome, MarketError> {
        if request.sender == self.module_account {
            return Err(MarketError::InvalidMessage(format!(
                "module account {} cannot swap",
                self.module_account
            )));
        }
        let outcome = execute(
            request,
            &self.module_account,
            &self.params,
            SwapState {
                pool: &mut self.pool,
                accrual: &mut self.accrual,
            },
            rates,
            ledger,
        )?;
        self.events.push(MarketEvent::Swap(outcome.event.clone()));
        Ok(outcome)
    }

    /// Accept a passed route-change proposal on behalf of `authority`.
    ///
    /// The new routes take effect after the current block's distribution.
    pub fn change_routes(
        &mut self,
        authority: &AccountId,
        proposal: &RouteChangeProposal,
    ) -> Result<(), MarketError> {
        if authority != self.routes.authority() {
            return Err(MarketError::UnauthorizedRouteChange(authority.to_string()));
        }
        let routes = proposal.route_set()?;
        self.routes.replace(authority, routes.clone())?;
        log::info!(
            "route change '{}' accepted: {}",
            proposal.title,
            routes
                .routes()
                .iter()
                .map(|r| r.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        self.events.push(MarketEvent::RouteChangeAccepted {
            title: proposal.title.clone(),
            routes,
        });
        Ok(())
    }

    /// Close block `height`: replenish, distribute, activate pending routes.
    ///
    /// Nothing is written unless every step succeeds. The payout is drawn
    /// from the module account, so the ledger must not let anything else
    /// spend the seigniorage minted there during the block.
    pub fn end_block<L: Ledger + ?Sized>(
        &mut self,
        height: u64,
        ledger: &mut L,
    ) -> Result<BlockSummary, MarketError> {
        if height <= self.height {
            return Err(MarketError::BlockHeight {
                height,
                last: self.height,
            });
        }
        let elapsed = height - self.height;
        let pool = self
            .pool
            .replenish(self.params.pool_recovery_period, elapsed);
        log::debug!(
            "block {}: pool replenished over {} blocks to reserve {} / stable {}",
            height,
            elapsed,
            pool.reserve_delta,
            pool.stable_delta
        );

        let amount = self.accrual.current();
        let payouts = distribute(
            amount,
            self.routes.active(),
            &self.module_account,
            &self.params.seigniorage_denom,
            ledger,
        )?;

        self.pool = pool;
        self.accrual.drain_and_reset();
        self.height = height;
        self.events.push(MarketEvent::Replenish { height, pool });
        if !payouts.is_empty() {
            self.events.push(MarketEvent::SeigniorageDistributed {
                height,
                payouts: payouts.clone(),
            });
        }

        let routes_changed = self.routes.activate_pending();
        if routes_changed {
            log::info!("block {}: new seigniorage routes active", height);
            self.events.push(MarketEvent::RoutesActivated {
                height,
                routes: self.routes.active().clone(),
            });
        }

        let distributed = (amount > 0).then(|| {
            Coin::new(self.params.seigniorage_denom.clone(), amount as u128)
        });
        Ok(BlockSummary {
            height,
            pool,
            distributed,
            payouts,
            routes_changed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ledger::BankLedger;
    use crate::core::rates::RateTable;
    use crate::market::msgs::{MsgRouteChange, MsgSwap};
    use crate::seigniorage::routes::SeigniorageRoute;
    use rust_decimal_macros::dec;

    fn rates() -> RateTable {
        let mut rates = RateTable::new(Denom::new("usdr"));
        rates.set_rate(Denom::new("uusd"), dec!(1)).unwrap();
        rates.set_rate(Denom::new("uluna"), dec!(2)).unwrap();
        rates
    }

    fn trader() -> AccountId {
        AccountId::new("trader")
    }

    fn ledger() -> BankLedger {
        BankLedger::new()
            .with_balance(&trader(), Coin::new("uusd", 1_000_000))
            .unwrap()
    }

    fn swap_msg(amount: u128) -> MarketMsg {
        MarketMsg::Swap(MsgSwap::new(
            trader(),
            Coin::new("uusd", amount),
            Denom::new("uluna"),
        ))
    }

    fn halves_msg(authority: &str) -> MarketMsg {
        MarketMsg::RouteChange(MsgRouteChange {
            authority: AccountId::new(authority),
            proposal: RouteChangeProposal::new(
                "Split",
                "Split seigniorage",
                vec![
                    SeigniorageRoute::new("r1", dec!(0.5)),
                    SeigniorageRoute::new("r2", dec!(0.5)),
                ],
            ),
        })
    }

    #[test]
    fn test_end_block_distributes_accrual() {
        let mut engine = MarketEngine::from_genesis(GenesisState::default()).unwrap();
        let mut ledger = ledger();

        // 20_000 uusd -> 10_000 uluna base, 50 uluna fee
        engine.deliver(&swap_msg(20_000), &rates(), &mut ledger).unwrap();
        assert_eq!(engine.accrual().current(), 50);

        let summary = engine.end_block(1, &mut ledger).unwrap();
        assert_eq!(summary.distributed, Some(Coin::new("uluna", 50)));
        assert_eq!(engine.accrual().current(), 0);
        assert_eq!(
            ledger.balance(&AccountId::new("community_pool"), &Denom::new("uluna")),
            50
        );
        assert_eq!(ledger.balance(engine.module_account(), &Denom::new("uluna")), 0);
        // 10_000 * 0.99
        assert_eq!(engine.pool().reserve_delta, dec!(9900));
    }

    #[test]
    fn test_route_change_applies_from_next_block() {
        let mut engine = MarketEngine::from_genesis(GenesisState::default()).unwrap();
        let mut ledger = ledger();

        engine.deliver(&swap_msg(20_000), &rates(), &mut ledger).unwrap();
        engine.deliver(&halves_msg("gov"), &rates(), &mut ledger).unwrap();
        let summary = engine.end_block(1, &mut ledger).unwrap();
        assert!(summary.routes_changed);
        assert_eq!(summary.payouts.len(), 1);
        assert_eq!(
            ledger.balance(&AccountId::new("community_pool"), &Denom::new("uluna")),
            50
        );

        engine.deliver(&swap_msg(20_000), &rates(), &mut ledger).unwrap();
        let summary = engine.end_block(2, &mut ledger).unwrap();
        assert_eq!(summary.payouts.len(), 2);
        assert!(ledger.balance(&AccountId::new("r1"), &Denom::new("uluna")) > 0);
    }

    #[test]
    fn test_unauthorized_route_change() {
        let mut engine = MarketEngine::from_genesis(GenesisState::default()).unwrap();
        let mut ledger = ledger();
        let err = engine
            .deliver(&halves_msg("mallory"), &rates(), &mut ledger)
            .unwrap_err();
        assert_eq!(err, MarketError::UnauthorizedRouteChange("mallory".into()));
        assert!(engine.routes().pending().is_none());
    }

    #[test]
    fn test_unauthorized_caller_refused_before_weights_checked() {
        let mut engine = MarketEngine::from_genesis(GenesisState::default()).unwrap();
        let mut ledger = ledger();
        let msg = MarketMsg::RouteChange(MsgRouteChange {
            authority: AccountId::new("mallory"),
            proposal: RouteChangeProposal::new(
                "Overweight",
                "Sums to 1.2",
                vec![
                    SeigniorageRoute::new("r1", dec!(0.6)),
                    SeigniorageRoute::new("r2", dec!(0.6)),
                ],
            ),
        });
        let err = engine.deliver(&msg, &rates(), &mut ledger).unwrap_err();
        assert_eq!(err, MarketError::UnauthorizedRouteChange("mallory".into()));
    }

    #[test]
    fn test_module_account_cannot_swap() {
        let mut engine = MarketEngine::from_genesis(GenesisState::default()).unwrap();
        let mut ledger = ledger();
        engine.deliver(&swap_msg(20_000), &rates(), &mut ledger).unwrap();

        // the module holds the 50 uluna fee; spending it would starve the payout
        let drain = MarketMsg::Swap(MsgSwap::new(
            AccountId::new("market"),
            Coin::new("uluna", 50),
            Denom::new("uusd"),
        ));
        let err = engine.deliver(&drain, &rates(), &mut ledger).unwrap_err();
        assert!(matches!(err, MarketError::InvalidMessage(_)));

        let summary = engine.end_block(1, &mut ledger).unwrap();
        assert_eq!(summary.distributed, Some(Coin::new("uluna", 50)));
        assert!(engine.end_block(2, &mut ledger).is_ok());
    }

    #[test]
    fn test_invalid_proposal_leaves_registry_unchanged() {
        let mut engine = MarketEngine::from_genesis(GenesisState::default()).unwrap();
        let before = engine.routes().clone();
        let proposal = RouteChangeProposal::new(
            "Overweight",
            "Sums to 1.2",
            vec![
                SeigniorageRoute::new("r1", dec!(0.6)),
                SeigniorageRoute::new("r2", dec!(0.6)),
            ],
        );
        let err = engine
            .change_routes(&AccountId::new("gov"), &proposal)
            .unwrap_err();
        assert!(matches!(err, MarketError::InvalidRouteWeights(_)));
        assert_eq!(engine.routes(), &before);
    }

    #[test]
    fn test_heights_must_advance() {
        let mut engine = MarketEngine::from_genesis(GenesisState::default()).unwrap();
        let mut ledger = ledger();
        engine.end_block(3, &mut ledger).unwrap();
        assert!(matches!(
            engine.end_block(3, &mut ledger),
            Err(MarketError::BlockHeight { height: 3, last: 3 })
        ));
    }

    #[test]
    fn test_genesis_round_trip() {
        let mut engine = MarketEngine::from_genesis(GenesisState::default()).unwrap();
        let mut ledger = ledger();
        engine.deliver(&swap_msg(1_000), &rates(), &mut ledger).unwrap();

        let exported = engine.export_genesis();
        let restored = MarketEngine::from_genesis(exported.clone()).unwrap();
        assert_eq!(restored.export_genesis(), exported);
        assert_eq!(restored.pool(), engine.pool());
    }

    #[test]
    fn test_events_are_recorded_in_order() {
        let mut engine = MarketEngine::from_genesis(GenesisState::default()).unwrap();
        let mut ledger = ledger();
        engine.deliver(&swap_msg(1_000), &rates(), &mut ledger).unwrap();
        engine.end_block(1, &mut ledger).unwrap();

        let events = engine.drain_events();
        assert!(matches!(events[0], MarketEvent::Swap(_)));
        assert!(matches!(events[1], MarketEvent::Replenish { height: 1, .. }));
        assert!(matches!(
            events[2],
            MarketEvent::SeigniorageDistributed { height: 1, .. }
        ));
        assert!(engine.drain_events().is_empty());
    }
}
