//! Policy Directory - registry of named reputation policy configs
//!
//! Configs live in memory and are written through to PostgreSQL when a
//! database is attached. A config is immutable once handed out; edits
//! replace the whole entry.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::database::DatabasePool;
use crate::error::{ReputationError, Result};
use crate::reputation::{ReputationPolicy, ReputationPolicyConfig, ScoreStore};

pub struct PolicyDirectory {
    db: Option<Arc<DatabasePool>>,
    store: Arc<dyn ScoreStore>,
    configs: RwLock<HashMap<String, ReputationPolicyConfig>>,
}

impl PolicyDirectory {
    pub fn new(store: Arc<dyn ScoreStore>) -> Self {
        Self {
            db: None,
            store,
            configs: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_database(mut self, db: Arc<DatabasePool>) -> Self {
        self.db = Some(db);
        self
    }

    /// Replace the in-memory view with what the database holds
    pub async fn load(&self) -> Result<usize> {
        let Some(ref db) = self.db else {
            return Ok(0);
        };

        let loaded = db.policies().list().await?;
        let count = loaded.len();

        let mut configs = self.configs.write().await;
        configs.clear();
        for config in loaded {
            configs.insert(config.name.clone(), config);
        }

        info!("Loaded {} reputation policies", count);
        Ok(count)
    }

    pub async fn list(&self) -> Vec<ReputationPolicyConfig> {
        let configs = self.configs.read().await;
        let mut list: Vec<_> = configs.values().cloned().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    pub async fn get(&self, name: &str) -> Result<ReputationPolicyConfig> {
        self.configs
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ReputationError::PolicyNotFound(name.to_string()))
    }

    pub async fn create(&self, config: ReputationPolicyConfig) -> Result<ReputationPolicyConfig> {
        config.validate()?;

        let mut configs = self.configs.write().await;
        if configs.contains_key(&config.name) {
            return Err(ReputationError::PolicyExists(config.name));
        }

        if let Some(ref db) = self.db {
            db.policies().upsert(&config).await?;
        }

        info!(
            policy = %config.name,
            threshold = config.threshold,
            check_ip = config.check_ip,
            check_username = config.check_username,
            "Created reputation policy"
        );
        configs.insert(config.name.clone(), config.clone());
        Ok(config)
    }

    /// Replace an existing config; the name cannot change
    pub async fn replace(
        &self,
        name: &str,
        config: ReputationPolicyConfig,
    ) -> Result<ReputationPolicyConfig> {
        config.validate()?;
        if config.name != name {
            return Err(ReputationError::Validation(format!(
                "policy name '{}' does not match '{}'",
                config.name, name
            )));
        }

        let mut configs = self.configs.write().await;
        if !configs.contains_key(name) {
            return Err(ReputationError::PolicyNotFound(name.to_string()));
        }

        if let Some(ref db) = self.db {
            db.policies().upsert(&config).await?;
        }

        info!(policy = %name, threshold = config.threshold, "Updated reputation policy");
        configs.insert(name.to_string(), config.clone());
        Ok(config)
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        let mut configs = self.configs.write().await;
        if !configs.contains_key(name) {
            return Err(ReputationError::PolicyNotFound(name.to_string()));
        }

        if let Some(ref db) = self.db {
            db.policies().delete(name).await?;
        }

        configs.remove(name);
        info!(policy = %name, "Deleted reputation policy");
        Ok(())
    }

    /// Policy instance for a registered config, bound to this directory's store
    pub async fn policy(&self, name: &str) -> Result<ReputationPolicy> {
        let config = self.get(name).await?;
        Ok(ReputationPolicy::new(config, self.store.clone()))
    }
}
