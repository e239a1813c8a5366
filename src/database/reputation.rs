//! Score Repository - PostgreSQL-backed score store
//!
//! Adjustments are a single upsert that adds the delta inside the row
//! update, so concurrent writers to the same key serialise on the row lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use tracing::{debug, info};

use crate::error::{ReputationError, Result};
use crate::reputation::{ReputationKind, ReputationRecord, ScoreStore};

#[derive(Clone)]
pub struct PgScoreStore {
    pool: PgPool,
}

impl PgScoreStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the scores table and its indexes
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS reputation.scores (
                kind VARCHAR(32) NOT NULL,
                key VARCHAR(255) NOT NULL,
                score BIGINT NOT NULL DEFAULT 0,
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                PRIMARY KEY (kind, key)
            )
        "#)
        .execute(&self.pool)
        .await
        .map_err(|e| ReputationError::Storage(format!("Failed to create scores table: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_scores_kind_score ON reputation.scores(kind, score)")
            .execute(&self.pool)
            .await
            .map_err(|e| ReputationError::Storage(format!("Failed to create scores index: {}", e)))?;

        info!("Scores table initialized");
        Ok(())
    }

    fn record_from_row(row: &PgRow) -> Result<ReputationRecord> {
        let kind: String = row.get("kind");
        let updated_at: DateTime<Utc> = row.get("updated_at");

        Ok(ReputationRecord {
            kind: kind
                .parse()
                .map_err(|_| ReputationError::Storage(format!("Unknown kind in scores table: {}", kind)))?,
            key: row.get("key"),
            score: row.get("score"),
            updated_at,
        })
    }
}

#[async_trait]
impl ScoreStore for PgScoreStore {
    async fn record(&self, kind: ReputationKind, key: &str) -> Result<Option<ReputationRecord>> {
        let row = sqlx::query(r#"
            SELECT kind, key, score, updated_at
            FROM reputation.scores
            WHERE kind = $1 AND key = $2
        "#)
        .bind(kind.as_str())
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ReputationError::Storage(format!("Failed to get score: {}", e)))?;

        row.as_ref().map(Self::record_from_row).transpose()
    }

    async fn get(&self, kind: ReputationKind, key: &str) -> Result<i64> {
        let score: Option<i64> = sqlx::query_scalar(
            "SELECT score FROM reputation.scores WHERE kind = $1 AND key = $2",
        )
        .bind(kind.as_str())
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ReputationError::Storage(format!("Failed to get score: {}", e)))?;

        Ok(score.unwrap_or(0))
    }

    async fn adjust(&self, kind: ReputationKind, key: &str, delta: i64) -> Result<i64> {
        let score: i64 = sqlx::query_scalar(r#"
            INSERT INTO reputation.scores (kind, key, score, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (kind, key) DO UPDATE SET
                score = reputation.scores.score + EXCLUDED.score,
                updated_at = EXCLUDED.updated_at
            RETURNING score
        "#)
        .bind(kind.as_str())
        .bind(key)
        .bind(delta)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ReputationError::Storage(format!("Failed to adjust score: {}", e)))?;

        debug!(kind = %kind, key = %key, delta, score, "Adjusted score");
        Ok(score)
    }

    async fn set(&self, kind: ReputationKind, key: &str, score: i64) -> Result<()> {
        sqlx::query(r#"
            INSERT INTO reputation.scores (kind, key, score, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (kind, key) DO UPDATE SET
                score = EXCLUDED.score,
                updated_at = EXCLUDED.updated_at
        "#)
        .bind(kind.as_str())
        .bind(key)
        .bind(score)
        .execute(&self.pool)
        .await
        .map_err(|e| ReputationError::Storage(format!("Failed to set score: {}", e)))?;

        debug!(kind = %kind, key = %key, score, "Set score");
        Ok(())
    }

    async fn list(&self, kind: Option<ReputationKind>) -> Result<Vec<ReputationRecord>> {
        let rows = sqlx::query(r#"
            SELECT kind, key, score, updated_at
            FROM reputation.scores
            WHERE $1::VARCHAR IS NULL OR kind = $1
            ORDER BY score ASC, key ASC
        "#)
        .bind(kind.map(|k| k.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ReputationError::Storage(format!("Failed to list scores: {}", e)))?;

        rows.iter().map(Self::record_from_row).collect()
    }
}
