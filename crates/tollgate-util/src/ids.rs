//! Strongly-typed identifiers for tollgate

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Row identifier of a token in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(i64);

impl TokenId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TokenId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifier of the user that owns a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Unique identifier for a connected IPC client
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_id_equality() {
        assert_eq!(TokenId::new(7), TokenId::from(7));
        assert_ne!(TokenId::new(7), TokenId::new(8));
    }

    #[test]
    fn client_id_uniqueness() {
        let c1 = ClientId::new();
        let c2 = ClientId::new();
        assert_ne!(c1, c2);
    }

    #[test]
    fn numeric_ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&TokenId::new(42)).unwrap();
        assert_eq!(json, "42");

        let parsed: UserId = serde_json::from_str("17").unwrap();
        assert_eq!(parsed, UserId::new(17));
    }
}
