//! Reputation Updater
//!
//! Turns login outcome events into score adjustments. Only failures move
//! scores; a successful login leaves both keys untouched.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::{AdjustmentFailure, ReputationError, Result};
use crate::reputation::{ReputationKind, ScoreStore};

/// Delta applied to each key on a failed login
pub const FAILED_LOGIN_PENALTY: i64 = -1;

/// Emitted by the authentication pipeline after every credential check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginOutcome {
    pub identifier: String,
    pub source_address: String,
    pub succeeded: bool,
}

impl LoginOutcome {
    pub fn failed(identifier: impl Into<String>, source_address: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            source_address: source_address.into(),
            succeeded: false,
        }
    }

    pub fn succeeded(identifier: impl Into<String>, source_address: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            source_address: source_address.into(),
            succeeded: true,
        }
    }
}

/// Receiver of login outcomes, registered with the authentication pipeline.
#[async_trait]
pub trait OutcomeListener: Send + Sync {
    async fn notify(&self, outcome: &LoginOutcome) -> Result<()>;
}

/// Applies failure penalties to the identifier and network address key spaces
#[derive(Clone)]
pub struct ReputationUpdater {
    store: Arc<dyn ScoreStore>,
}

impl ReputationUpdater {
    pub fn new(store: Arc<dyn ScoreStore>) -> Self {
        Self { store }
    }

    /// Record the outcome of one authentication attempt.
    ///
    /// On failure both adjustments are always attempted; if either fails the
    /// error lists every failed write.
    pub async fn on_outcome(
        &self,
        identifier: &str,
        source_address: &str,
        succeeded: bool,
    ) -> Result<()> {
        if succeeded {
            debug!(identifier = %identifier, "Successful login, scores unchanged");
            return Ok(());
        }

        let (identifier_result, address_result) = tokio::join!(
            self.penalize(ReputationKind::Identifier, identifier),
            self.penalize(ReputationKind::NetworkAddress, source_address),
        );

        let failures: Vec<AdjustmentFailure> = [identifier_result, address_result]
            .into_iter()
            .filter_map(|r| r.err())
            .collect();

        if !failures.is_empty() {
            return Err(ReputationError::OutcomeNotRecorded { failures });
        }

        info!(
            identifier = %identifier,
            source_address = %source_address,
            "Recorded failed login"
        );
        Ok(())
    }

    async fn penalize(
        &self,
        kind: ReputationKind,
        key: &str,
    ) -> std::result::Result<(), AdjustmentFailure> {
        if key.is_empty() {
            debug!(kind = %kind, "No key for failed login, skipping");
            return Ok(());
        }

        match self.store.adjust(kind, key, FAILED_LOGIN_PENALTY).await {
            Ok(score) => {
                debug!(kind = %kind, key = %key, score, "Applied failed login penalty");
                Ok(())
            }
            Err(e) => {
                error!(kind = %kind, key = %key, error = %e, "Failed to apply login penalty");
                Err(AdjustmentFailure {
                    kind,
                    key: key.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }
}

#[async_trait]
impl OutcomeListener for ReputationUpdater {
    async fn notify(&self, outcome: &LoginOutcome) -> Result<()> {
        self.on_outcome(&outcome.identifier, &outcome.source_address, outcome.succeeded)
            .await
    }
}
