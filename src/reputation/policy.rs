//! Reputation Policy
//!
//! Sums the scores of the acting identifier and the source address and
//! passes when the sum is at or above the configured threshold.
//! Evaluation only reads the store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::error::{ReputationError, Result};
use crate::policy::{Policy, PolicyRequest, PolicyResult};
use crate::reputation::{ReputationKind, ScoreStore};

/// Message shown when the policy does not pass. Never includes numbers.
pub const REPUTATION_DENIED_MESSAGE: &str = "Reputation too low";

/// Unvalidated policy configuration as submitted by an administrator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReputationPolicyDraft {
    pub name: Option<String>,
    pub threshold: Option<i64>,
    #[serde(default)]
    pub check_ip: bool,
    #[serde(default)]
    pub check_username: bool,
}

/// Validated policy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ReputationPolicyDraft")]
pub struct ReputationPolicyConfig {
    pub name: String,
    /// Minimum combined score needed to pass; zero or negative in practice
    pub threshold: i64,
    pub check_ip: bool,
    pub check_username: bool,
}

impl ReputationPolicyConfig {
    /// Config checking both key spaces
    pub fn new(name: impl Into<String>, threshold: i64) -> Result<Self> {
        let config = Self {
            name: name.into(),
            threshold,
            check_ip: true,
            check_username: true,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_draft(draft: ReputationPolicyDraft) -> Result<Self> {
        let name = draft
            .name
            .ok_or_else(|| ReputationError::Validation("name is required".to_string()))?;
        let threshold = draft
            .threshold
            .ok_or_else(|| ReputationError::Validation("threshold is required".to_string()))?;

        let config = Self {
            name,
            threshold,
            check_ip: draft.check_ip,
            check_username: draft.check_username,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ReputationError::Validation(
                "name cannot be empty".to_string(),
            ));
        }

        if !self.check_ip && !self.check_username {
            return Err(ReputationError::Validation(
                "either IP or username must be checked".to_string(),
            ));
        }

        Ok(())
    }
}

impl TryFrom<ReputationPolicyDraft> for ReputationPolicyConfig {
    type Error = ReputationError;

    fn try_from(draft: ReputationPolicyDraft) -> Result<Self> {
        Self::from_draft(draft)
    }
}

/// Result of a reputation evaluation, including the combined score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationVerdict {
    pub passing: bool,
    pub score: i64,
}

/// A configured reputation policy bound to a score store
#[derive(Clone)]
pub struct ReputationPolicy {
    config: ReputationPolicyConfig,
    store: Arc<dyn ScoreStore>,
}

impl ReputationPolicy {
    pub fn new(config: ReputationPolicyConfig, store: Arc<dyn ScoreStore>) -> Self {
        Self { config, store }
    }

    /// Combined score of the request's identifier and address against the
    /// threshold. Absent keys and disabled key spaces contribute 0.
    pub async fn evaluate(&self, request: &PolicyRequest) -> Result<ReputationVerdict> {
        let user_score = match present(&request.identifier) {
            Some(identifier) if self.config.check_username => {
                self.store.get(ReputationKind::Identifier, identifier).await?
            }
            _ => 0,
        };

        let ip_score = match present(&request.source_address) {
            Some(address) if self.config.check_ip => {
                self.store.get(ReputationKind::NetworkAddress, address).await?
            }
            _ => 0,
        };

        let score = user_score.saturating_add(ip_score);
        let passing = score >= self.config.threshold;

        debug!(
            policy = %self.config.name,
            user_score,
            ip_score,
            threshold = self.config.threshold,
            passing,
            "Evaluated reputation policy"
        );

        Ok(ReputationVerdict { passing, score })
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[async_trait]
impl Policy for ReputationPolicy {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn passes(&self, request: &PolicyRequest) -> Result<PolicyResult> {
        let verdict = self.evaluate(request).await?;
        if verdict.passing {
            Ok(PolicyResult::pass())
        } else {
            Ok(PolicyResult::fail(REPUTATION_DENIED_MESSAGE))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reputation::MemoryScoreStore;

    fn policy(threshold: i64) -> (Arc<MemoryScoreStore>, ReputationPolicy) {
        let store = Arc::new(MemoryScoreStore::new());
        let config = ReputationPolicyConfig::new("reputation-test", threshold).unwrap();
        (store.clone(), ReputationPolicy::new(config, store))
    }

    fn alice() -> PolicyRequest {
        PolicyRequest::new()
            .with_identifier("alice")
            .with_source_address("127.0.0.1")
    }

    #[tokio::test]
    async fn test_clean_history_passes_zero_threshold() {
        let (_, policy) = policy(0);
        let result = policy.passes(&alice()).await.unwrap();
        assert!(result.passing);
        assert!(result.messages.is_empty());
    }

    #[tokio::test]
    async fn test_combined_score_below_threshold_fails() {
        let (store, policy) = policy(0);
        store.set(ReputationKind::Identifier, "alice", -1).await.unwrap();
        store.set(ReputationKind::NetworkAddress, "127.0.0.1", -1).await.unwrap();

        let verdict = policy.evaluate(&alice()).await.unwrap();
        assert_eq!(verdict, ReputationVerdict { passing: false, score: -2 });

        let result = policy.passes(&alice()).await.unwrap();
        assert_eq!(result.messages, vec![REPUTATION_DENIED_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn test_score_equal_to_threshold_passes() {
        let (store, policy) = policy(-3);
        store.set(ReputationKind::Identifier, "alice", -3).await.unwrap();
        assert!(policy.evaluate(&alice()).await.unwrap().passing);
    }

    #[tokio::test]
    async fn test_empty_context_passes_with_zero() {
        let (store, policy) = policy(0);
        store.set(ReputationKind::Identifier, "alice", -10).await.unwrap();

        let verdict = policy.evaluate(&PolicyRequest::new()).await.unwrap();
        assert_eq!(verdict, ReputationVerdict { passing: true, score: 0 });
    }

    #[tokio::test]
    async fn test_disabled_key_space_is_ignored() {
        let store = Arc::new(MemoryScoreStore::new());
        store.set(ReputationKind::NetworkAddress, "127.0.0.1", -50).await.unwrap();
        store.set(ReputationKind::Identifier, "alice", -1).await.unwrap();

        let config = ReputationPolicyConfig {
            name: "username-only".to_string(),
            threshold: -5,
            check_ip: false,
            check_username: true,
        };
        let policy = ReputationPolicy::new(config, store);

        let verdict = policy.evaluate(&alice()).await.unwrap();
        assert_eq!(verdict, ReputationVerdict { passing: true, score: -1 });
    }

    #[tokio::test]
    async fn test_evaluation_is_read_only() {
        let (store, policy) = policy(0);
        let first = policy.evaluate(&alice()).await.unwrap();
        let second = policy.evaluate(&alice()).await.unwrap();
        assert_eq!(first, second);
        assert!(store.is_empty());
    }

    #[test]
    fn test_negative_threshold_accepted() {
        let config: ReputationPolicyConfig = serde_json::from_value(serde_json::json!({
            "name": "lenient",
            "threshold": -5,
            "check_ip": true,
            "check_username": true,
        }))
        .unwrap();
        assert_eq!(config.threshold, -5);
    }

    #[test]
    fn test_missing_threshold_rejected() {
        let draft = ReputationPolicyDraft {
            name: Some("no-threshold".to_string()),
            threshold: None,
            check_ip: true,
            check_username: true,
        };
        let err = ReputationPolicyConfig::from_draft(draft).unwrap_err();
        assert!(matches!(err, ReputationError::Validation(_)));
    }

    #[test]
    fn test_no_key_space_checked_rejected() {
        let result: std::result::Result<ReputationPolicyConfig, _> =
            serde_json::from_value(serde_json::json!({ "name": "no-toggle", "threshold": -5 }));
        assert!(result.is_err());
    }

    #[test]
    fn test_blank_name_rejected() {
        assert!(ReputationPolicyConfig::new("  ", 0).is_err());
    }
}
