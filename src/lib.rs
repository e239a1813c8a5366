//! Identity Provider Reputation Service
//!
//! Reputation scoring for login attempts: failed logins lower the trust
//! score of the username and of the source address, and a threshold policy
//! tells the authentication pipeline whether to let an attempt continue.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── main.rs        - Admin server entrypoint
//! ├── config.rs      - Configuration management
//! ├── error.rs       - Error taxonomy
//! ├── reputation/    - Scoring core
//! │   ├── record.rs    - Key spaces and score records
//! │   ├── store.rs     - ScoreStore trait & in-memory store
//! │   ├── updater.rs   - Login outcome -> score adjustments
//! │   ├── policy.rs    - Threshold policy & its configuration
//! │   └── directory.rs - Named policy registry
//! ├── policy/        - Generic policy protocol
//! │   └── engine.rs    - Binding composition (all / any)
//! ├── api/           - HTTP API endpoints
//! │   ├── reputation.rs - Admin routes
//! │   └── middleware.rs - Auth, limits, headers, logging
//! └── database/      - PostgreSQL persistence
//!     ├── reputation.rs - Atomic score store
//!     └── policies.rs   - Policy configs
//! ```

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod policy;
pub mod reputation;

// Re-export main types for convenience
pub use config::ServiceConfig;
pub use database::{DatabasePool, PgScoreStore, PolicyRepository};
pub use error::{AdjustmentFailure, ReputationError, Result};
pub use policy::{EngineMode, Policy, PolicyBinding, PolicyEngine, PolicyRequest, PolicyResult};

// Re-export reputation types
pub use reputation::{
    LoginOutcome, MemoryScoreStore, OutcomeListener, PolicyDirectory, ReputationKind,
    ReputationPolicy, ReputationPolicyConfig, ReputationPolicyDraft, ReputationRecord,
    ReputationUpdater, ReputationVerdict, ScoreStore,
};

// Re-export API types
pub use api::{ReputationApiState, SecurityMiddlewareConfig, SecurityState, create_app};
