//! Policy Engine - runs a set of bound policies and combines their results

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::policy::{Policy, PolicyRequest, PolicyResult};

/// How binding results are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    /// Every enabled binding must pass
    #[default]
    All,
    /// At least one enabled binding must pass
    Any,
}

/// A policy attached to the engine
#[derive(Clone)]
pub struct PolicyBinding {
    pub policy: Arc<dyn Policy>,
    /// Invert the policy's result
    pub negate: bool,
    pub enabled: bool,
}

impl PolicyBinding {
    pub fn new(policy: Arc<dyn Policy>) -> Self {
        Self {
            policy,
            negate: false,
            enabled: true,
        }
    }

    pub fn negated(mut self) -> Self {
        self.negate = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl std::fmt::Debug for PolicyBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyBinding")
            .field("policy", &self.policy.name())
            .field("negate", &self.negate)
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    mode: EngineMode,
    bindings: Vec<PolicyBinding>,
}

impl PolicyEngine {
    pub fn new(mode: EngineMode) -> Self {
        Self {
            mode,
            bindings: Vec::new(),
        }
    }

    pub fn bind(mut self, binding: PolicyBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Evaluate every enabled binding in order.
    ///
    /// An engine with nothing enabled passes. A binding that errors aborts
    /// the evaluation with that error.
    pub async fn evaluate(&self, request: &PolicyRequest) -> Result<PolicyResult> {
        let mut results = Vec::with_capacity(self.bindings.len());

        for binding in self.bindings.iter().filter(|b| b.enabled) {
            let mut result = binding.policy.passes(request).await.map_err(|e| {
                warn!(policy = %binding.policy.name(), error = %e, "Policy evaluation failed");
                e
            })?;

            if binding.negate {
                result.passing = !result.passing;
            }

            debug!(
                policy = %binding.policy.name(),
                passing = result.passing,
                negate = binding.negate,
                "Policy evaluated"
            );
            results.push(result);
        }

        if results.is_empty() {
            return Ok(PolicyResult::pass());
        }

        let passing = match self.mode {
            EngineMode::All => results.iter().all(|r| r.passing),
            EngineMode::Any => results.iter().any(|r| r.passing),
        };

        let messages = results
            .into_iter()
            .filter(|r| !r.passing)
            .flat_map(|r| r.messages)
            .collect();

        Ok(PolicyResult { passing, messages })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReputationError;
    use async_trait::async_trait;

    struct Fixed {
        name: &'static str,
        passing: bool,
    }

    #[async_trait]
    impl Policy for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn passes(&self, _request: &PolicyRequest) -> Result<PolicyResult> {
            if self.passing {
                Ok(PolicyResult::pass())
            } else {
                Ok(PolicyResult::fail(format!("{} denied", self.name)))
            }
        }
    }

    struct Broken;

    #[async_trait]
    impl Policy for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn passes(&self, _request: &PolicyRequest) -> Result<PolicyResult> {
            Err(ReputationError::Storage("unreachable".to_string()))
        }
    }

    fn fixed(name: &'static str, passing: bool) -> PolicyBinding {
        PolicyBinding::new(Arc::new(Fixed { name, passing }))
    }

    #[tokio::test]
    async fn test_empty_engine_passes() {
        let engine = PolicyEngine::new(EngineMode::All);
        assert!(engine.evaluate(&PolicyRequest::new()).await.unwrap().passing);
    }

    #[tokio::test]
    async fn test_all_mode_requires_every_binding() {
        let engine = PolicyEngine::new(EngineMode::All)
            .bind(fixed("geo", true))
            .bind(fixed("rate", false));

        let result = engine.evaluate(&PolicyRequest::new()).await.unwrap();
        assert!(!result.passing);
        assert_eq!(result.messages, vec!["rate denied".to_string()]);
    }

    #[tokio::test]
    async fn test_any_mode_needs_one_binding() {
        let engine = PolicyEngine::new(EngineMode::Any)
            .bind(fixed("geo", false))
            .bind(fixed("rate", true));

        assert!(engine.evaluate(&PolicyRequest::new()).await.unwrap().passing);
    }

    #[tokio::test]
    async fn test_negate_and_disabled_bindings() {
        let engine = PolicyEngine::new(EngineMode::All)
            .bind(fixed("geo", false).negated())
            .bind(fixed("rate", false).disabled());

        assert!(engine.evaluate(&PolicyRequest::new()).await.unwrap().passing);
    }

    #[tokio::test]
    async fn test_error_is_not_a_result() {
        let engine = PolicyEngine::new(EngineMode::Any)
            .bind(fixed("geo", true))
            .bind(PolicyBinding::new(Arc::new(Broken)));

        let err = engine.evaluate(&PolicyRequest::new()).await.unwrap_err();
        assert!(matches!(err, ReputationError::Storage(_)));
    }
}
