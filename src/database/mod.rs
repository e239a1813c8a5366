//! PostgreSQL Database Module
//!
//! Provides durable score storage and policy configuration persistence.

pub mod policies;
pub mod pool;
pub mod reputation;

pub use policies::PolicyRepository;
pub use pool::DatabasePool;
pub use reputation::PgScoreStore;
