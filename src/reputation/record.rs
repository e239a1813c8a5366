//! Reputation Record Types
//!
//! A record is the signed score held for one key in one key space.
//! Records are created lazily by the first adjustment and never deleted here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ReputationError;

/// Key space a score belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReputationKind {
    /// Username or account handle
    Identifier,
    /// Source IP address
    NetworkAddress,
}

impl ReputationKind {
    pub const ALL: [ReputationKind; 2] = [ReputationKind::Identifier, ReputationKind::NetworkAddress];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReputationKind::Identifier => "identifier",
            ReputationKind::NetworkAddress => "network_address",
        }
    }
}

impl fmt::Display for ReputationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReputationKind {
    type Err = ReputationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "identifier" => Ok(ReputationKind::Identifier),
            "network_address" => Ok(ReputationKind::NetworkAddress),
            other => Err(ReputationError::Validation(format!(
                "unknown reputation kind: {}",
                other
            ))),
        }
    }
}

/// Persisted score for one (kind, key) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationRecord {
    pub kind: ReputationKind,
    pub key: String,
    /// Signed, unbounded; lower is worse
    pub score: i64,
    pub updated_at: DateTime<Utc>,
}

impl ReputationRecord {
    pub fn new(kind: ReputationKind, key: impl Into<String>, score: i64) -> Self {
        Self {
            kind,
            key: key.into(),
            score,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parses_its_own_name() {
        for kind in ReputationKind::ALL {
            assert_eq!(kind.as_str().parse::<ReputationKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_kind_is_validation_error() {
        let err = "username".parse::<ReputationKind>().unwrap_err();
        assert!(matches!(err, ReputationError::Validation(_)));
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ReputationKind::NetworkAddress).unwrap();
        assert_eq!(json, "\"network_address\"");
    }
}
