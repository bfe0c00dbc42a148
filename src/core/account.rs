use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of an account on the ledger.
///
/// An account can be a trader, the market module itself, a governance
/// authority, or any seigniorage destination (oracle reward pool,
/// community pool, ...).
///
/// # Examples
///
/// ```
/// use market_engine::core::account::AccountId;
///
/// let trader = AccountId::new("terra1trader");
/// let pool = AccountId::new("community_pool");
/// assert_ne!(trader, pool);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub const MAX_LEN: usize = 128;

    /// Create a new account identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string representation of this account.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Non-empty, at most [`AccountId::MAX_LEN`] characters, no whitespace
    /// or control characters.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= Self::MAX_LEN
            && self.0.chars().all(|c| c.is_ascii_graphic())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_equality() {
        let a = AccountId::new("terra1abc");
        let b = AccountId::new("terra1abc");
        let c = AccountId::new("terra1xyz");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_account_validation() {
        assert!(AccountId::new("terra1abc").is_valid());
        assert!(!AccountId::new("").is_valid());
        assert!(!AccountId::new("terra 1abc").is_valid());
        assert!(!AccountId::new("x".repeat(129)).is_valid());
    }

    #[test]
    fn test_account_from_owned_string() {
        let id: AccountId = format!("route-{}", 3).into();
        assert_eq!(id, AccountId::from("route-3"));
    }

    #[test]
    fn test_account_ordering() {
        assert!(AccountId::new("a-bank") < AccountId::new("b-bank"));
    }
}
