//! Policy Repository - persistence for reputation policy configs

use sqlx::postgres::PgPool;
use sqlx::Row;
use tracing::{error, info};

use crate::error::{ReputationError, Result};
use crate::reputation::ReputationPolicyConfig;

pub struct PolicyRepository {
    pool: PgPool,
}

impl PolicyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS reputation.policies (
                name VARCHAR(255) PRIMARY KEY,
                threshold BIGINT NOT NULL,
                check_ip BOOLEAN NOT NULL DEFAULT TRUE,
                check_username BOOLEAN NOT NULL DEFAULT TRUE,
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#)
        .execute(&self.pool)
        .await
        .map_err(|e| ReputationError::Storage(format!("Failed to create policies table: {}", e)))?;

        info!("Policies table initialized");
        Ok(())
    }

    /// All stored configs; rows that no longer validate are skipped
    pub async fn list(&self) -> Result<Vec<ReputationPolicyConfig>> {
        let rows = sqlx::query(r#"
            SELECT name, threshold, check_ip, check_username
            FROM reputation.policies
            ORDER BY name
        "#)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ReputationError::Storage(format!("Failed to list policies: {}", e)))?;

        let mut configs = Vec::with_capacity(rows.len());
        for row in rows {
            let config = ReputationPolicyConfig {
                name: row.get("name"),
                threshold: row.get("threshold"),
                check_ip: row.get("check_ip"),
                check_username: row.get("check_username"),
            };

            match config.validate() {
                Ok(()) => configs.push(config),
                Err(e) => error!(policy = %config.name, error = %e, "Skipping invalid stored policy"),
            }
        }

        Ok(configs)
    }

    pub async fn upsert(&self, config: &ReputationPolicyConfig) -> Result<()> {
        sqlx::query(r#"
            INSERT INTO reputation.policies (name, threshold, check_ip, check_username, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (name) DO UPDATE SET
                threshold = EXCLUDED.threshold,
                check_ip = EXCLUDED.check_ip,
                check_username = EXCLUDED.check_username,
                updated_at = EXCLUDED.updated_at
        "#)
        .bind(&config.name)
        .bind(config.threshold)
        .bind(config.check_ip)
        .bind(config.check_username)
        .execute(&self.pool)
        .await
        .map_err(|e| ReputationError::Storage(format!("Failed to upsert policy: {}", e)))?;

        Ok(())
    }

    pub async fn delete(&self, name: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM reputation.policies WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| ReputationError::Storage(format!("Failed to delete policy: {}", e)))?;

        Ok(result.rows_affected())
    }
}
