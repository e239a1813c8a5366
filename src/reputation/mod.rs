//! Reputation System for Login Throttling
//!
//! Accumulates signed trust scores per username and per source address from
//! failed logins, and answers whether a login attempt's combined reputation
//! is still acceptable.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌──────────────────┐
//! │ LoginOutcome    │────►│ ReputationUpdater│────►│ ScoreStore       │
//! │ (auth pipeline) │     │ (-1 on failure)  │     │ (memory/postgres)│
//! └─────────────────┘     └──────────────────┘     └──────────────────┘
//!                                                          ▲
//!                                                          │ read-only
//!                         ┌──────────────────┐     ┌──────────────────┐
//!                         │ PolicyDirectory  │────►│ ReputationPolicy │
//!                         │ (admin configs)  │     │ (threshold)      │
//!                         └──────────────────┘     └──────────────────┘
//! ```
//!
//! ## Score Model
//!
//! - Every key starts at 0
//! - A failed login costs 1 point for the username and 1 for the address
//! - Successful logins never raise a score; only an administrator can
//! - A policy passes when identifier score + address score >= threshold

mod directory;
mod policy;
mod record;
mod store;
mod updater;

pub use directory::PolicyDirectory;
pub use policy::{
    REPUTATION_DENIED_MESSAGE, ReputationPolicy, ReputationPolicyConfig, ReputationPolicyDraft,
    ReputationVerdict,
};
pub use record::{ReputationKind, ReputationRecord};
pub use store::{MemoryScoreStore, ScoreStore};
pub use updater::{FAILED_LOGIN_PENALTY, LoginOutcome, OutcomeListener, ReputationUpdater};
