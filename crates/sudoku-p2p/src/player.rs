//! Player identities.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

static NICKNAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._-]{3,24}$").expect("valid nickname pattern")
});

/// A validated player nickname: 3 to 24 letters, digits, `.`, `_` or `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nickname(String);

impl Nickname {
    pub fn parse(raw: &str) -> Option<Self> {
        NICKNAME.is_match(raw).then(|| Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Nickname {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw).ok_or_else(|| format!("invalid nickname {raw:?}"))
    }
}

impl From<Nickname> for String {
    fn from(nickname: Nickname) -> Self {
        nickname.0
    }
}

impl fmt::Display for Nickname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for Nickname {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Nickname {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Opaque endpoint a peer receives notifications on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerAddress(String);

impl PeerAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A logged-in player. Two identities are the same player when their
/// nicknames match, whatever endpoint they carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerIdentity {
    nickname: Nickname,
    address: PeerAddress,
}

impl PlayerIdentity {
    pub fn new(nickname: Nickname, address: PeerAddress) -> Self {
        Self { nickname, address }
    }

    pub fn nickname(&self) -> &Nickname {
        &self.nickname
    }

    pub fn address(&self) -> &PeerAddress {
        &self.address
    }
}

impl PartialEq for PlayerIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.nickname == other.nickname
    }
}

impl Eq for PlayerIdentity {}

impl Hash for PlayerIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.nickname.hash(state);
    }
}

impl PartialOrd for PlayerIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PlayerIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.nickname.cmp(&other.nickname)
    }
}

impl fmt::Display for PlayerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.nickname, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_nickname_validation() {
        assert!(Nickname::parse("Alice").is_some());
        assert!(Nickname::parse("a.b_c-d").is_some());
        assert!(Nickname::parse("Alice!").is_none());
        assert!(Nickname::parse("Al").is_none());
        assert!(Nickname::parse(&"x".repeat(25)).is_none());
        assert!(Nickname::parse("Al ice").is_none());
    }

    #[test]
    fn test_identity_equality_ignores_address() {
        let alice = Nickname::parse("Alice").unwrap();
        let a = PlayerIdentity::new(alice.clone(), PeerAddress::new("peer-1"));
        let b = PlayerIdentity::new(alice, PeerAddress::new("peer-2"));
        assert_eq!(a, b);

        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_nickname_deserialize_rejects_invalid() {
        assert!(serde_json::from_str::<Nickname>("\"Bob\"").is_ok());
        assert!(serde_json::from_str::<Nickname>("\"B!\"").is_err());
    }
}
