//! Database Connection Pool using sqlx

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::database::policies::PolicyRepository;
use crate::database::reputation::PgScoreStore;
use crate::error::{ReputationError, Result};

pub struct DatabasePool {
    pool: PgPool,
    scores: PgScoreStore,
    policies: PolicyRepository,
}

impl DatabasePool {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await
            .map_err(|e| ReputationError::Storage(format!("Failed to connect to PostgreSQL: {}", e)))?;

        info!("Connected to PostgreSQL");

        let scores = PgScoreStore::new(pool.clone());
        let policies = PolicyRepository::new(pool.clone());

        Ok(Self {
            pool,
            scores,
            policies,
        })
    }

    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema...");

        sqlx::query("CREATE SCHEMA IF NOT EXISTS reputation")
            .execute(&self.pool)
            .await
            .map_err(|e| ReputationError::Storage(format!("Failed to create reputation schema: {}", e)))?;

        self.scores.init_schema().await?;
        self.policies.init_schema().await?;

        info!("Database schema initialized");
        Ok(())
    }

    pub fn scores(&self) -> &PgScoreStore {
        &self.scores
    }

    pub fn policies(&self) -> &PolicyRepository {
        &self.policies
    }
}
