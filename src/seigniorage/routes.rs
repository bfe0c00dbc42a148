use crate::core::account::AccountId;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// How far the weights of a route set may drift from exactly one.
pub const WEIGHT_SUM_TOLERANCE: Decimal = dec!(0.000000001);

/// Reasons a set of seigniorage routes is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("route set must not be empty")]
    Empty,
    #[error("route to {address} has weight {weight} outside [0, 1]")]
    WeightOutOfRange { address: AccountId, weight: Decimal },
    #[error("route weights sum to {0}, expected 1")]
    WeightSum(Decimal),
    #[error("malformed route address '{0}'")]
    MalformedAddress(AccountId),
    #[error("duplicate route address {0}")]
    DuplicateAddress(AccountId),
}

/// A weighted seigniorage destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeigniorageRoute {
    pub address: AccountId,
    pub weight: Decimal,
}

impl SeigniorageRoute {
    pub fn new(address: impl Into<AccountId>, weight: Decimal) -> Self {
        Self {
            address: address.into(),
            weight,
        }
    }
}

impl fmt::Display for SeigniorageRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.address, self.weight)
    }
}

/// Ordered, validated list of seigniorage routes.
///
/// A `RouteSet` can only be built through [`RouteSet::new`], so holding one
/// proves the weights were checked. Distribution relies on that and never
/// validates again.
///
/// # Examples
///
/// ```
/// use market_engine::seigniorage::routes::{RouteSet, SeigniorageRoute};
/// use rust_decimal_macros::dec;
///
/// let routes = RouteSet::new(vec![
///     SeigniorageRoute::new("oracle_pool", dec!(0.5)),
///     SeigniorageRoute::new("community_pool", dec!(0.5)),
/// ]).unwrap();
/// assert_eq!(routes.len(), 2);
///
/// assert!(RouteSet::new(vec![SeigniorageRoute::new("oracle_pool", dec!(1.2))]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RouteSet(Vec<SeigniorageRoute>);

impl RouteSet {
    pub fn new(routes: Vec<SeigniorageRoute>) -> Result<Self, RouteError> {
        validate_routes(&routes)?;
        Ok(Self(routes))
    }

    /// Everything to a single destination.
    pub fn single(address: impl Into<AccountId>) -> Self {
        Self(vec![SeigniorageRoute::new(address, Decimal::ONE)])
    }

    pub fn routes(&self) -> &[SeigniorageRoute] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a validated set; kept for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total_weight(&self) -> Decimal {
        self.0.iter().map(|r| r.weight).sum()
    }
}

impl<'de> Deserialize<'de> for RouteSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let routes = Vec::<SeigniorageRoute>::deserialize(deserializer)?;
        RouteSet::new(routes).map_err(serde::de::Error::custom)
    }
}

/// Check a candidate route list.
pub fn validate_routes(routes: &[SeigniorageRoute]) -> Result<(), RouteError> {
    if routes.is_empty() {
        return Err(RouteError::Empty);
    }

    let mut seen = BTreeSet::new();
    let mut total = Decimal::ZERO;
    for route in routes {
        if !route.address.is_valid() {
            return Err(RouteError::MalformedAddress(route.address.clone()));
        }
        if !seen.insert(&route.address) {
            return Err(RouteError::DuplicateAddress(route.address.clone()));
        }
        if route.weight < Decimal::ZERO || route.weight > Decimal::ONE {
            return Err(RouteError::WeightOutOfRange {
                address: route.address.clone(),
                weight: route.weight,
            });
        }
        // each weight is in [0, 1] so the sum can't overflow
        total += route.weight;
    }

    if (total - Decimal::ONE).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(RouteError::WeightSum(total));
    }
    Ok(())
}

/// Governance-owned seigniorage destinations.
///
/// Only the configured authority may replace the routes. A replacement is
/// staged as pending and becomes active when the block ends, after that
/// block's distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRegistry {
    authority: AccountId,
    active: RouteSet,
    #[serde(default)]
    pending: Option<RouteSet>,
}

/// Raised when someone other than the governance authority calls
/// [`RouteRegistry::replace`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{caller} is not the route authority")]
pub struct Unauthorized {
    pub caller: AccountId,
}

impl RouteRegistry {
    pub fn new(authority: AccountId, active: RouteSet) -> Self {
        Self {
            authority,
            active,
            pending: None,
        }
    }

    pub fn authority(&self) -> &AccountId {
        &self.authority
    }

    pub fn active(&self) -> &RouteSet {
        &self.active
    }

    pub fn pending(&self) -> Option<&RouteSet> {
        self.pending.as_ref()
    }

    /// Stage `routes` as the next active set.
    ///
    /// A later replacement within the same block overrides an earlier one.
    pub fn replace(&mut self, caller: &AccountId, routes: RouteSet) -> Result<(), Unauthorized> {
        if *caller != self.authority {
            return Err(Unauthorized {
                caller: caller.clone(),
            });
        }
        self.pending = Some(routes);
        Ok(())
    }

    /// Swap in the pending set, if any. Returns true when the active set changed.
    pub fn activate_pending(&mut self) -> bool {
        match self.pending.take() {
            Some(routes) => {
                self.active = routes;
                true
            }
            None => false,
        }
    }
}
