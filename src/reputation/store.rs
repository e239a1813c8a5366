//! Score Store
//!
//! The single shared mutable resource of the reputation system. Every
//! implementation must serialise adjustments to the same key so that
//! concurrent deltas are never lost.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;

use crate::error::{ReputationError, Result};
use crate::reputation::{ReputationKind, ReputationRecord};

/// Persistent mapping from (kind, key) to a signed score.
///
/// Callers never hold records across calls; scores may change between reads.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Full record for a key, `None` if never written.
    async fn record(&self, kind: ReputationKind, key: &str) -> Result<Option<ReputationRecord>>;

    /// Atomically add `delta`, creating the record at 0 first if needed.
    /// Returns the new score.
    async fn adjust(&self, kind: ReputationKind, key: &str, delta: i64) -> Result<i64>;

    /// Absolute overwrite, used for administrative correction.
    async fn set(&self, kind: ReputationKind, key: &str, score: i64) -> Result<()>;

    /// All records, optionally restricted to one kind, lowest score first.
    async fn list(&self, kind: Option<ReputationKind>) -> Result<Vec<ReputationRecord>>;

    /// Current score, 0 for unseen keys.
    async fn get(&self, kind: ReputationKind, key: &str) -> Result<i64> {
        Ok(self.record(kind, key).await?.map(|r| r.score).unwrap_or(0))
    }
}

/// In-process store backed by a sharded concurrent map.
///
/// `DashMap::entry` keeps the shard write-locked for the whole
/// read-modify-write, which is what makes `adjust` lost-update free.
#[derive(Debug, Default)]
pub struct MemoryScoreStore {
    records: DashMap<(ReputationKind, String), ReputationRecord>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ScoreStore for MemoryScoreStore {
    async fn record(&self, kind: ReputationKind, key: &str) -> Result<Option<ReputationRecord>> {
        Ok(self
            .records
            .get(&(kind, key.to_string()))
            .map(|r| r.value().clone()))
    }

    async fn adjust(&self, kind: ReputationKind, key: &str, delta: i64) -> Result<i64> {
        let mut entry = self
            .records
            .entry((kind, key.to_string()))
            .or_insert_with(|| ReputationRecord::new(kind, key, 0));

        entry.score = entry.score.checked_add(delta).ok_or_else(|| {
            ReputationError::Storage(format!(
                "Score for {} '{}' out of range after adjusting by {}",
                kind, key, delta
            ))
        })?;
        entry.updated_at = Utc::now();

        debug!(kind = %kind, key = %key, delta, score = entry.score, "Adjusted score");
        Ok(entry.score)
    }

    async fn set(&self, kind: ReputationKind, key: &str, score: i64) -> Result<()> {
        let mut entry = self
            .records
            .entry((kind, key.to_string()))
            .or_insert_with(|| ReputationRecord::new(kind, key, 0));

        entry.score = score;
        entry.updated_at = Utc::now();

        debug!(kind = %kind, key = %key, score, "Set score");
        Ok(())
    }

    async fn list(&self, kind: Option<ReputationKind>) -> Result<Vec<ReputationRecord>> {
        let mut records: Vec<ReputationRecord> = self
            .records
            .iter()
            .filter(|r| kind.map_or(true, |k| r.kind == k))
            .map(|r| r.value().clone())
            .collect();

        records.sort_by(|a, b| a.score.cmp(&b.score).then_with(|| a.key.cmp(&b.key)));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_unseen_key_reads_zero() {
        let store = MemoryScoreStore::new();
        assert_eq!(store.get(ReputationKind::Identifier, "nobody").await.unwrap(), 0);
        assert!(store
            .record(ReputationKind::NetworkAddress, "10.0.0.1")
            .await
            .unwrap()
            .is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_adjust_creates_then_accumulates() {
        let store = MemoryScoreStore::new();
        assert_eq!(store.adjust(ReputationKind::Identifier, "alice", -1).await.unwrap(), -1);
        assert_eq!(store.adjust(ReputationKind::Identifier, "alice", -1).await.unwrap(), -2);
        assert_eq!(store.get(ReputationKind::Identifier, "alice").await.unwrap(), -2);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_kinds_are_separate_key_spaces() {
        let store = MemoryScoreStore::new();
        store.adjust(ReputationKind::Identifier, "shared", -3).await.unwrap();
        assert_eq!(store.get(ReputationKind::NetworkAddress, "shared").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let store = MemoryScoreStore::new();
        store.adjust(ReputationKind::Identifier, "alice", -7).await.unwrap();
        store.set(ReputationKind::Identifier, "alice", 43).await.unwrap();
        assert_eq!(store.get(ReputationKind::Identifier, "alice").await.unwrap(), 43);
    }

    #[tokio::test]
    async fn test_overflowing_adjust_is_rejected_and_leaves_score() {
        let store = MemoryScoreStore::new();
        store.set(ReputationKind::Identifier, "alice", i64::MIN + 1).await.unwrap();

        let result = store.adjust(ReputationKind::Identifier, "alice", -2).await;
        assert!(matches!(result, Err(ReputationError::Storage(_))));
        assert_eq!(
            store.get(ReputationKind::Identifier, "alice").await.unwrap(),
            i64::MIN + 1
        );

        assert_eq!(
            store.adjust(ReputationKind::Identifier, "alice", -1).await.unwrap(),
            i64::MIN
        );
    }

    #[tokio::test]
    async fn test_adjust_bumps_updated_at() {
        let store = MemoryScoreStore::new();
        store.set(ReputationKind::Identifier, "alice", 0).await.unwrap();
        let before = store
            .record(ReputationKind::Identifier, "alice")
            .await
            .unwrap()
            .unwrap()
            .updated_at;
        store.adjust(ReputationKind::Identifier, "alice", -1).await.unwrap();
        let after = store
            .record(ReputationKind::Identifier, "alice")
            .await
            .unwrap()
            .unwrap()
            .updated_at;
        assert!(after >= before);
    }

    #[tokio::test]
    async fn test_list_filters_and_orders_worst_first() {
        let store = MemoryScoreStore::new();
        store.set(ReputationKind::Identifier, "alice", 5).await.unwrap();
        store.set(ReputationKind::Identifier, "bob", -4).await.unwrap();
        store.set(ReputationKind::NetworkAddress, "10.0.0.1", -9).await.unwrap();

        let all = store.list(None).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].key, "10.0.0.1");

        let users = store.list(Some(ReputationKind::Identifier)).await.unwrap();
        let keys: Vec<_> = users.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["bob", "alice"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adjustments_are_not_lost() {
        let store = Arc::new(MemoryScoreStore::new());
        let mut handles = vec![];

        for i in 0..200i64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let delta = if i % 4 == 0 { 3 } else { -1 };
                store
                    .adjust(ReputationKind::NetworkAddress, "203.0.113.7", delta)
                    .await
                    .unwrap();
                delta
            }));
        }

        let mut expected = 0i64;
        for handle in handles {
            expected += handle.await.unwrap();
        }

        assert_eq!(
            store.get(ReputationKind::NetworkAddress, "203.0.113.7").await.unwrap(),
            expected
        );
    }
}
