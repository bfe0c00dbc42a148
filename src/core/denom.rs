use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a unit of account traded by the market.
///
/// Denominations are opaque symbols compared by exact string equality:
/// the network's reserve asset (`uluna`), stable units (`uusd`, `ukrw`)
/// and the reference unit rates are quoted against (`usdr`).
///
/// # Examples
///
/// ```
/// use market_engine::core::denom::Denom;
///
/// let usd = Denom::new("uusd");
/// let krw = Denom::new("ukrw");
/// assert_ne!(usd, krw);
/// assert!(usd.is_valid());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Denom(String);

impl Denom {
    pub const MIN_LEN: usize = 2;
    pub const MAX_LEN: usize = 64;

    pub fn new(denom: impl Into<String>) -> Self {
        Self(denom.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A denom is 2-64 characters, starts with an ASCII letter and
    /// otherwise contains only ASCII alphanumerics or `/ . _ -`.
    pub fn is_valid(&self) -> bool {
        let len = self.0.len();
        if !(Self::MIN_LEN..=Self::MAX_LEN).contains(&len) {
            return false;
        }
        let mut chars = self.0.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-'))
    }
}

impl fmt::Display for Denom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Denom {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Denom {
    fn from(s: String) -> Self {
        Self(s)
    }
}
