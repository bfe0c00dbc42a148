//! Messages the market accepts.
//!
//! [`MarketMsg`] is the closed set of request kinds. Each variant carries its
//! own stateless `validate_basic`, and the engine dispatches on the variant
//! with an exhaustive `match`.

use crate::core::account::AccountId;
use crate::core::coin::Coin;
use crate::core::denom::Denom;
use crate::market::error::MarketError;
use crate::seigniorage::routes::{RouteSet, SeigniorageRoute};
use serde::{Deserialize, Serialize};

pub const MAX_TITLE_LEN: usize = 140;
pub const MAX_DESCRIPTION_LEN: usize = 10_000;

fn invalid(reason: impl Into<String>) -> MarketError {
    MarketError::InvalidMessage(reason.into())
}

fn check_account(role: &str, account: &AccountId) -> Result<(), MarketError> {
    if account.is_valid() {
        Ok(())
    } else {
        Err(invalid(format!("invalid {role} address '{account}'")))
    }
}

fn check_swap(offer: &Coin, ask_denom: &Denom) -> Result<(), MarketError> {
    if !offer.denom.is_valid() {
        return Err(invalid(format!("invalid offer denom '{}'", offer.denom)));
    }
    if !ask_denom.is_valid() {
        return Err(invalid(format!("invalid ask denom '{ask_denom}'")));
    }
    if offer.is_zero() {
        return Err(MarketError::InvalidSwapAmount);
    }
    if offer.denom == *ask_denom {
        return Err(MarketError::RecursiveSwap(ask_denom.clone()));
    }
    Ok(())
}

/// A swap ready for execution. The receiver defaults to the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub sender: AccountId,
    pub offer_coin: Coin,
    pub ask_denom: Denom,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<AccountId>,
}

impl SwapRequest {
    pub fn receiver(&self) -> &AccountId {
        match &self.receiver {
            Some(receiver) if !receiver.as_str().is_empty() => receiver,
            _ => &self.sender,
        }
    }

    /// Translate into the message kind matching the receiver field: no (or
    /// an empty) receiver makes a [`MsgSwap`], anything else a [`MsgSwapSend`].
    pub fn into_msg(self) -> MarketMsg {
        match self.receiver {
            Some(receiver) if !receiver.as_str().is_empty() => MarketMsg::SwapSend(MsgSwapSend {
                from_address: self.sender,
                to_address: receiver,
                offer_coin: self.offer_coin,
                ask_denom: self.ask_denom,
            }),
            _ => MarketMsg::Swap(MsgSwap {
                trader: self.sender,
                offer_coin: self.offer_coin,
                ask_denom: self.ask_denom,
            }),
        }
    }
}

/// Swap and keep the proceeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSwap {
    pub trader: AccountId,
    pub offer_coin: Coin,
    pub ask_denom: Denom,
}

impl MsgSwap {
    pub fn new(trader: AccountId, offer_coin: Coin, ask_denom: Denom) -> Self {
        Self {
            trader,
            offer_coin,
            ask_denom,
        }
    }

    pub fn validate_basic(&self) -> Result<(), MarketError> {
        check_account("trader", &self.trader)?;
        check_swap(&self.offer_coin, &self.ask_denom)
    }

    pub fn to_request(&self) -> SwapRequest {
        SwapRequest {
            sender: self.trader.clone(),
            offer_coin: self.offer_coin.clone(),
            ask_denom: self.ask_denom.clone(),
            receiver: None,
        }
    }
}

/// Swap and send the proceeds to another account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSwapSend {
    pub from_address: AccountId,
    pub to_address: AccountId,
    pub offer_coin: Coin,
    pub ask_denom: Denom,
}

impl MsgSwapSend {
    pub fn new(
        from_address: AccountId,
        to_address: AccountId,
        offer_coin: Coin,
        ask_denom: Denom,
    ) -> Self {
        Self {
            from_address,
            to_address,
            offer_coin,
            ask_denom,
        }
    }

    pub fn validate_basic(&self) -> Result<(), MarketError> {
        check_account("from", &self.from_address)?;
        check_account("to", &self.to_address)?;
        check_swap(&self.offer_coin, &self.ask_denom)
    }

    pub fn to_request(&self) -> SwapRequest {
        SwapRequest {
            sender: self.from_address.clone(),
            offer_coin: self.offer_coin.clone(),
            ask_denom: self.ask_denom.clone(),
            receiver: Some(self.to_address.clone()),
        }
    }
}

/// Governance proposal content replacing the seigniorage routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteChangeProposal {
    pub title: String,
    pub description: String,
    pub routes: Vec<SeigniorageRoute>,
}

impl RouteChangeProposal {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        routes: Vec<SeigniorageRoute>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            routes,
        }
    }

    /// Metadata limits plus full route validation. Title and description
    /// are otherwise passed through untouched.
    pub fn validate_basic(&self) -> Result<(), MarketError> {
        if self.title.trim().is_empty() {
            return Err(invalid("proposal title cannot be blank"));
        }
        if self.title.len() > MAX_TITLE_LEN {
            return Err(invalid(format!(
                "proposal title is longer than {MAX_TITLE_LEN} bytes"
            )));
        }
        if self.description.trim().is_empty() {
            return Err(invalid("proposal description cannot be blank"));
        }
        if self.description.len() > MAX_DESCRIPTION_LEN {
            return Err(invalid(format!(
                "proposal description is longer than {MAX_DESCRIPTION_LEN} bytes"
            )));
        }
        self.route_set().map(|_| ())
    }

    pub fn route_set(&self) -> Result<RouteSet, MarketError> {
        Ok(RouteSet::new(self.routes.clone())?)
    }
}

/// A passed route-change proposal, executed on behalf of `authority`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRouteChange {
    pub authority: AccountId,
    pub proposal: RouteChangeProposal,
}

impl MsgRouteChange {
    pub fn validate_basic(&self) -> Result<(), MarketError> {
        check_account("authority", &self.authority)?;
        self.proposal.validate_basic()
    }
}

/// Every request the market handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketMsg {
    Swap(MsgSwap),
    SwapSend(MsgSwapSend),
    RouteChange(MsgRouteChange),
}

impl MarketMsg {
    pub fn validate_basic(&self) -> Result<(), MarketError> {
        match self {
            MarketMsg::Swap(msg) => msg.validate_basic(),
            MarketMsg::SwapSend(msg) => msg.validate_basic(),
            MarketMsg::RouteChange(msg) => msg.validate_basic(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MarketMsg::Swap(_) => "swap",
            MarketMsg::SwapSend(_) => "swap_send",
            MarketMsg::RouteChange(_) => "route_change",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seigniorage::routes::RouteError;
    use rust_decimal_macros::dec;

    fn swap() -> MsgSwap {
        MsgSwap::new(
            AccountId::new("terra1trader"),
            Coin::new("uusd", 100),
            Denom::new("uluna"),
        )
    }

    fn proposal(routes: Vec<SeigniorageRoute>) -> RouteChangeProposal {
        RouteChangeProposal::new("Reroute", "Send half to the oracle pool", routes)
    }

    #[test]
    fn test_valid_swap() {
        assert!(swap().validate_basic().is_ok());
    }

    #[test]
    fn test_swap_rejects_empty_sender_and_zero_amount() {
        let mut msg = swap();
        msg.trader = AccountId::new("");
        assert!(matches!(
            msg.validate_basic(),
            Err(MarketError::InvalidMessage(_))
        ));

        let mut msg = swap();
        msg.offer_coin.amount = 0;
        assert_eq!(msg.validate_basic(), Err(MarketError::InvalidSwapAmount));
    }

    #[test]
    fn test_swap_rejects_same_denom() {
        let mut msg = swap();
        msg.ask_denom = Denom::new("uusd");
        assert_eq!(
            msg.validate_basic(),
            Err(MarketError::RecursiveSwap(Denom::new("uusd")))
        );
    }

    #[test]
    fn test_swap_send_checks_receiver() {
        let msg = MsgSwapSend::new(
            AccountId::new("terra1from"),
            AccountId::new("bad address"),
            Coin::new("uusd", 100),
            Denom::new("uluna"),
        );
        assert!(msg.validate_basic().is_err());
    }

    #[test]
    fn test_request_adapter_picks_message_kind() {
        let request = SwapRequest {
            sender: AccountId::new("terra1from"),
            offer_coin: Coin::new("uusd", 5),
            ask_denom: Denom::new("uluna"),
            receiver: None,
        };
        assert!(matches!(request.clone().into_msg(), MarketMsg::Swap(_)));

        let with_empty = SwapRequest {
            receiver: Some(AccountId::new("")),
            ..request.clone()
        };
        assert!(matches!(with_empty.into_msg(), MarketMsg::Swap(_)));

        let with_receiver = SwapRequest {
            receiver: Some(AccountId::new("terra1to")),
            ..request
        };
        match with_receiver.into_msg() {
            MarketMsg::SwapSend(msg) => assert_eq!(msg.to_address, AccountId::new("terra1to")),
            other => panic!("expected swap_send, got {}", other.kind()),
        }
    }

    #[test]
    fn test_receiver_defaults_to_sender() {
        let request = swap().to_request();
        assert_eq!(request.receiver(), &AccountId::new("terra1trader"));
    }

    #[test]
    fn test_proposal_validation() {
        let ok = proposal(vec![
            SeigniorageRoute::new("oracle_pool", dec!(0.5)),
            SeigniorageRoute::new("community_pool", dec!(0.5)),
        ]);
        assert!(ok.validate_basic().is_ok());

        let over = proposal(vec![
            SeigniorageRoute::new("oracle_pool", dec!(0.6)),
            SeigniorageRoute::new("community_pool", dec!(0.6)),
        ]);
        assert_eq!(
            over.validate_basic(),
            Err(MarketError::InvalidRouteWeights(RouteError::WeightSum(
                dec!(1.2)
            )))
        );

        assert_eq!(
            proposal(vec![]).validate_basic(),
            Err(MarketError::InvalidRouteWeights(RouteError::Empty))
        );

        let mut untitled = ok.clone();
        untitled.title = "  ".into();
        assert!(untitled.validate_basic().is_err());

        let mut long = ok;
        long.description = "x".repeat(MAX_DESCRIPTION_LEN + 1);
        assert!(long.validate_basic().is_err());
    }

    #[test]
    fn test_msg_json_is_tagged() {
        let json = serde_json::to_value(MarketMsg::Swap(swap())).unwrap();
        assert_eq!(json["type"], "swap");
        assert_eq!(json["offer_coin"]["amount"], "100");
    }
}
