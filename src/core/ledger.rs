use crate::core::account::AccountId;
use crate::core::coin::Coin;
use crate::core::denom::Denom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors signaled by the bank ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("insufficient funds: {account} has {available}, needs {required}")]
    InsufficientFunds {
        account: AccountId,
        required: Coin,
        available: u128,
    },
    #[error("balance or supply overflow for {denom} at {account}")]
    Overflow { account: AccountId, denom: Denom },
}

/// Account balance storage and transfer primitives.
///
/// The market only moves value through this interface. Every method either
/// applies fully or returns an error without changing anything.
pub trait Ledger {
    fn balance(&self, account: &AccountId, denom: &Denom) -> u128;

    fn supply(&self, denom: &Denom) -> u128;

    fn transfer(&mut self, from: &AccountId, to: &AccountId, coin: &Coin)
        -> Result<(), LedgerError>;

    /// Create `coin` out of thin air and credit it to `to`.
    fn mint(&mut self, to: &AccountId, coin: &Coin) -> Result<(), LedgerError>;

    /// Destroy `coin` held by `from`.
    fn burn(&mut self, from: &AccountId, coin: &Coin) -> Result<(), LedgerError>;
}

fn insufficient(account: &AccountId, coin: &Coin, available: u128) -> LedgerError {
    LedgerError::InsufficientFunds {
        account: account.clone(),
        required: coin.clone(),
        available,
    }
}

fn overflow(account: &AccountId, denom: &Denom) -> LedgerError {
    LedgerError::Overflow {
        account: account.clone(),
        denom: denom.clone(),
    }
}

/// In-memory bank: balances per (account, denom) plus total supply per denom.
///
/// Ordered maps keep iteration and serialized output identical on every
/// replica.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankLedger {
    /// (AccountId, Denom) -> balance. Zero balances are not stored.
    #[serde(with = "balances_serde")]
    balances: BTreeMap<(AccountId, Denom), u128>,
    #[serde(with = "supply_serde")]
    supply: BTreeMap<Denom, u128>,
}

mod balances_serde {
    use super::*;
    use serde::de::{self, MapAccess, Visitor};
    use serde::ser::SerializeMap;

    pub fn serialize<S: serde::Serializer>(
        balances: &BTreeMap<(AccountId, Denom), u128>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(balances.len()))?;
        for ((account, denom), amount) in balances {
            map.serialize_entry(&format!("{}:{}", account, denom), &amount.to_string())?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<(AccountId, Denom), u128>, D::Error> {
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = BTreeMap<(AccountId, Denom), u128>;
            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a map with \"account:denom\" keys")
            }
            fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Self::Value, M::Error> {
                let mut map = BTreeMap::new();
                while let Some((key, value)) = access.next_entry::<String, String>()? {
                    // denoms never contain ':', accounts may
                    let (account, denom) = key
                        .rsplit_once(':')
                        .ok_or_else(|| de::Error::custom(format!("invalid key: {key}")))?;
                    let amount = value
                        .parse::<u128>()
                        .map_err(|e| de::Error::custom(format!("invalid amount '{value}': {e}")))?;
                    map.insert((AccountId::new(account), Denom::new(denom)), amount);
                }
                Ok(map)
            }
        }
        deserializer.deserialize_map(V)
    }
}

mod supply_serde {
    use super::*;

    pub fn serialize<S: serde::Serializer>(
        supply: &BTreeMap<Denom, u128>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let as_str: BTreeMap<&Denom, String> =
            supply.iter().map(|(d, a)| (d, a.to_string())).collect();
        serde::Serialize::serialize(&as_str, serializer)
    }

    pub fn deserialize<'de, D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<Denom, u128>, D::Error> {
        let raw = BTreeMap::<Denom, String>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(denom, amount)| {
                amount
                    .parse::<u128>()
                    .map(|a| (denom, a))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}

impl BankLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Genesis helper: mint `coin` directly into `account`.
    pub fn with_balance(mut self, account: &AccountId, coin: Coin) -> Result<Self, LedgerError> {
        self.mint(account, &coin)?;
        Ok(self)
    }

    /// All non-zero balances.
    pub fn all_balances(&self) -> &BTreeMap<(AccountId, Denom), u128> {
        &self.balances
    }

    /// Sum of every stored balance of `denom`. Equals [`Ledger::supply`]
    /// whenever the ledger is consistent.
    pub fn sum_balances(&self, denom: &Denom) -> u128 {
        self.balances
            .iter()
            .filter(|((_, d), _)| d == denom)
            .map(|(_, amount)| *amount)
            .sum()
    }

    fn set_balance(&mut self, account: &AccountId, denom: &Denom, amount: u128) {
        let key = (account.clone(), denom.clone());
        if amount == 0 {
            self.balances.remove(&key);
        } else {
            self.balances.insert(key, amount);
        }
    }
}

impl Ledger for BankLedger {
    fn balance(&self, account: &AccountId, denom: &Denom) -> u128 {
        self.balances
            .get(&(account.clone(), denom.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn supply(&self, denom: &Denom) -> u128 {
        self.supply.get(denom).copied().unwrap_or(0)
    }

    fn transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        coin: &Coin,
    ) -> Result<(), LedgerError> {
        let from_balance = self.balance(from, &coin.denom);
        if from_balance < coin.amount {
            return Err(insufficient(from, coin, from_balance));
        }
        if from == to {
            return Ok(());
        }
        let to_balance = self
            .balance(to, &coin.denom)
            .checked_add(coin.amount)
            .ok_or_else(|| overflow(to, &coin.denom))?;
        self.set_balance(from, &coin.denom, from_balance - coin.amount);
        self.set_balance(to, &coin.denom, to_balance);
        Ok(())
    }

    fn mint(&mut self, to: &AccountId, coin: &Coin) -> Result<(), LedgerError> {
        if coin.is_zero() {
            return Ok(());
        }
        let supply = self
            .supply(&coin.denom)
            .checked_add(coin.amount)
            .ok_or_else(|| overflow(to, &coin.denom))?;
        let balance = self
            .balance(to, &coin.denom)
            .checked_add(coin.amount)
            .ok_or_else(|| overflow(to, &coin.denom))?;
        self.set_balance(to, &coin.denom, balance);
        self.supply.insert(coin.denom.clone(), supply);
        Ok(())
    }

    fn burn(&mut self, from: &AccountId, coin: &Coin) -> Result<(), LedgerError> {
        let balance = self.balance(from, &coin.denom);
        if balance < coin.amount {
            return Err(insufficient(from, coin, balance));
        }
        let supply = self.supply(&coin.denom).saturating_sub(coin.amount);
        self.set_balance(from, &coin.denom, balance - coin.amount);
        if supply == 0 {
            self.supply.remove(&coin.denom);
        } else {
            self.supply.insert(coin.denom.clone(), supply);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum LedgerOp {
    Transfer {
        from: AccountId,
        to: AccountId,
        coin: Coin,
    },
    Mint {
        to: AccountId,
        coin: Coin,
    },
    Burn {
        from: AccountId,
        coin: Coin,
    },
}

/// Write-buffering view over another ledger.
///
/// Operations are checked against the buffered view and only reach the
/// underlying ledger on [`CacheLedger::commit`]. Dropping the cache
/// discards everything, which is how a failed swap rolls back.
pub struct CacheLedger<'a, L: Ledger + ?Sized> {
    inner: &'a mut L,
    balances: BTreeMap<(AccountId, Denom), u128>,
    supply: BTreeMap<Denom, u128>,
    ops: Vec<LedgerOp>,
}

impl<'a, L: Ledger + ?Sized> CacheLedger<'a, L> {
    pub fn new(inner: &'a mut L) -> Self {
        Self {
            inner,
            balances: BTreeMap::new(),
            supply: BTreeMap::new(),
            ops: Vec::new(),
        }
    }

    /// Number of staged operations.
    pub fn pending(&self) -> usize {
        self.ops.len()
    }

    /// Replay every staged operation on the underlying ledger.
    ///
    /// Each op was already validated against the same view, so replay only
    /// fails if the underlying ledger changed in between, which the borrow
    /// makes impossible.
    pub fn commit(self) -> Result<(), LedgerError> {
        let CacheLedger { inner, ops, .. } = self;
        for op in &ops {
            match op {
                LedgerOp::Transfer { from, to, coin } => inner.transfer(from, to, coin)?,
                LedgerOp::Mint { to, coin } => inner.mint(to, coin)?,
                LedgerOp::Burn { from, coin } => inner.burn(from, coin)?,
            }
        }
        Ok(())
    }

    fn stage_balance(&mut self, account: &AccountId, denom: &Denom, amount: u128) {
        self.balances
            .insert((account.clone(), denom.clone()), amount);
    }
}

impl<L: Ledger + ?Sized> Ledger for CacheLedger<'_, L> {
    fn balance(&self, account: &AccountId, denom: &Denom) -> u128 {
        self.balances
            .get(&(account.clone(), denom.clone()))
            .copied()
            .unwrap_or_else(|| self.inner.balance(account, denom))
    }

    fn supply(&self, denom: &Denom) -> u128 {
        self.supply
            .get(denom)
            .copied()
            .unwrap_or_else(|| self.inner.supply(denom))
    }

    fn transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        coin: &Coin,
    ) -> Result<(), LedgerError> {
        let from_balance = self.balance(from, &coin.denom);
        if from_balance < coin.amount {
            return Err(insufficient(from, coin, from_balance));
        }
        if from != to {
            let to_balance = self
                .balance(to, &coin.denom)
                .checked_add(coin.amount)
                .ok_or_else(|| overflow(to, &coin.denom))?;
            self.stage_balance(from, &coin.denom, from_balance - coin.amount);
            self.stage_balance(to, &coin.denom, to_balance);
        }
        self.ops.push(LedgerOp::Transfer {
            from: from.clone(),
            to: to.clone(),
            coin: coin.clone(),
        });
        Ok(())
    }

    fn mint(&mut self, to: &AccountId, coin: &Coin) -> Result<(), LedgerError> {
        let supply = self
            .supply(&coin.denom)
            .checked_add(coin.amount)
            .ok_or_else(|| overflow(to, &coin.denom))?;
        let balance = self
            .balance(to, &coin.denom)
            .checked_add(coin.amount)
            .ok_or_else(|| overflow(to, &coin.denom))?;
        self.stage_balance(to, &coin.denom, balance);
        self.supply.insert(coin.denom.clone(), supply);
        self.ops.push(LedgerOp::Mint {
            to: to.clone(),
            coin: coin.clone(),
        });
        Ok(())
    }

    fn burn(&mut self, from: &AccountId, coin: &Coin) -> Result<(), LedgerError> {
        let balance = self.balance(from, &coin.denom);
        if balance < coin.amount {
            return Err(insufficient(from, coin, balance));
        }
        let supply = self.supply(&coin.denom).saturating_sub(coin.amount);
        self.stage_balance(from, &coin.denom, balance - coin.amount);
        self.supply.insert(coin.denom.clone(), supply);
        self.ops.push(LedgerOp::Burn {
            from: from.clone(),
            coin: coin.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> AccountId {
        AccountId::new("alice")
    }

    fn bob() -> AccountId {
        AccountId::new("bob")
    }

    fn funded() -> BankLedger {
        BankLedger::new()
            .with_balance(&alice(), Coin::new("uusd", 100))
            .unwrap()
    }

    #[test]
    fn test_transfer_moves_balance() {
        let mut ledger = funded();
        ledger.transfer(&alice(), &bob(), &Coin::new("uusd", 40)).unwrap();
        assert_eq!(ledger.balance(&alice(), &Denom::new("uusd")), 60);
        assert_eq!(ledger.balance(&bob(), &Denom::new("uusd")), 40);
        assert_eq!(ledger.supply(&Denom::new("uusd")), 100);
    }

    #[test]
    fn test_transfer_insufficient_funds() {
        let mut ledger = funded();
        let err = ledger
            .transfer(&alice(), &bob(), &Coin::new("uusd", 101))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { available: 100, .. }));
        assert_eq!(ledger.balance(&alice(), &Denom::new("uusd")), 100);
    }

    #[test]
    fn test_mint_and_burn_track_supply() {
        let mut ledger = funded();
        ledger.mint(&bob(), &Coin::new("uusd", 5)).unwrap();
        ledger.burn(&alice(), &Coin::new("uusd", 30)).unwrap();
        assert_eq!(ledger.supply(&Denom::new("uusd")), 75);
        assert_eq!(ledger.sum_balances(&Denom::new("uusd")), 75);
    }

    #[test]
    fn test_mint_overflow_rejected() {
        let mut ledger = BankLedger::new()
            .with_balance(&alice(), Coin::new("uusd", u128::MAX))
            .unwrap();
        let err = ledger.mint(&bob(), &Coin::new("uusd", 1)).unwrap_err();
        assert!(matches!(err, LedgerError::Overflow { .. }));
    }

    #[test]
    fn test_cache_discarded_on_drop() {
        let mut ledger = funded();
        {
            let mut cache = CacheLedger::new(&mut ledger);
            cache.transfer(&alice(), &bob(), &Coin::new("uusd", 50)).unwrap();
            assert_eq!(cache.balance(&bob(), &Denom::new("uusd")), 50);
        }
        assert_eq!(ledger, funded());
    }

    #[test]
    fn test_cache_commit_applies_in_order() {
        let mut ledger = funded();
        let mut cache = CacheLedger::new(&mut ledger);
        cache.transfer(&alice(), &bob(), &Coin::new("uusd", 50)).unwrap();
        cache.burn(&bob(), &Coin::new("uusd", 50)).unwrap();
        cache.mint(&bob(), &Coin::new("uluna", 7)).unwrap();
        // second spend of the same funds is caught by the buffered view
        assert!(cache.transfer(&bob(), &alice(), &Coin::new("uusd", 1)).is_err());
        assert_eq!(cache.pending(), 3);
        cache.commit().unwrap();

        assert_eq!(ledger.balance(&alice(), &Denom::new("uusd")), 50);
        assert_eq!(ledger.balance(&bob(), &Denom::new("uusd")), 0);
        assert_eq!(ledger.balance(&bob(), &Denom::new("uluna")), 7);
        assert_eq!(ledger.supply(&Denom::new("uusd")), 50);
    }

    #[test]
    fn test_ledger_json_keys() {
        let ledger = funded();
        let json = serde_json::to_value(&ledger).unwrap();
        assert_eq!(json["balances"]["alice:uusd"], "100");
        let back: BankLedger = serde_json::from_value(json).unwrap();
        assert_eq!(back, ledger);
    }
}
