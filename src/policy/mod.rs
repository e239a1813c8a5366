//! Policy Evaluation Protocol
//!
//! Every policy the authentication pipeline can run implements [`Policy`]:
//! one request in, one pass/fail result with messages out. The pipeline
//! composes policies through [`PolicyEngine`] without knowing what kind of
//! policy sits behind each binding.
//!
//! ```text
//! ┌───────────────┐     ┌──────────────┐     ┌──────────────────┐
//! │ PolicyRequest │────►│ PolicyEngine │────►│ PolicyBinding[n] │
//! │ (who, where)  │     │ (all / any)  │     │ (negate, enable) │
//! └───────────────┘     └──────────────┘     └──────────────────┘
//!                                                     │
//!                                                     ▼
//!                                            ┌──────────────────┐
//!                                            │ dyn Policy       │
//!                                            │ (reputation, ..) │
//!                                            └──────────────────┘
//! ```

mod engine;

pub use engine::{EngineMode, PolicyBinding, PolicyEngine};

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::error::Result;

/// Context a policy is evaluated against
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRequest {
    /// Resolved acting identifier (username)
    pub identifier: Option<String>,
    /// Network address the attempt came from
    pub source_address: Option<String>,
}

impl PolicyRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_source_address(mut self, source_address: impl Into<String>) -> Self {
        self.source_address = Some(source_address.into());
        self
    }
}

/// Outcome of a single policy evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyResult {
    pub passing: bool,
    pub messages: Vec<String>,
}

impl PolicyResult {
    pub fn pass() -> Self {
        Self {
            passing: true,
            messages: Vec::new(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passing: false,
            messages: vec![message.into()],
        }
    }
}

/// A pluggable check run by the authentication pipeline.
///
/// A policy that does not pass returns `Ok` with `passing == false`; `Err`
/// means the check could not be completed at all.
#[async_trait]
pub trait Policy: Send + Sync {
    fn name(&self) -> &str;

    async fn passes(&self, request: &PolicyRequest) -> Result<PolicyResult>;
}

/// Extract client IP from request headers, handling proxies
pub fn client_ip(headers: &HeaderMap, peer: Option<&SocketAddr>) -> Option<String> {
    // First hop of X-Forwarded-For is the original client
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(ip) = value.split(',').next() {
                let ip = ip.trim();
                if !ip.is_empty() {
                    return Some(ip.to_string());
                }
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip) = real_ip.to_str() {
            let ip = ip.trim();
            if !ip.is_empty() {
                return Some(ip.to_string());
            }
        }
    }

    peer.map(|a| a.ip().to_string())
}
