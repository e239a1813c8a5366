use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::warn;

use crate::reputation::ReputationPolicyConfig;

/// Configuration for the reputation service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Admin API security configuration
    pub security: SecurityConfig,
    /// Score store configuration
    pub database: DatabaseConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Policy registered at startup, if any
    pub default_policy: Option<ReputationPolicyConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Require an admin API key on /reputation routes
    pub enable_auth: bool,
    /// Accepted admin API keys
    pub admin_api_keys: Vec<String>,
    /// Maximum request body size in bytes
    pub max_request_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    /// PostgreSQL connection string
    pub postgres_url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Mask client addresses in request logs
    pub sanitize_logs: bool,
    /// Enable request/response logging
    pub log_requests: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            postgres_url: String::new(),
            max_connections: 10,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 9300,
            },
            security: SecurityConfig {
                enable_auth: true,
                admin_api_keys: Vec::new(),
                max_request_size: 64 * 1024,
            },
            database: DatabaseConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                sanitize_logs: true,
                log_requests: false,
            },
            default_policy: None,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables and validate it
    pub fn from_env() -> Result<Self> {
        Self::from_source(|name| env::var(name).ok())
    }

    /// Load configuration from any variable lookup
    pub fn from_source<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Server configuration
        if let Some(host) = var("IDP_HOST") {
            config.server.host = host;
        }

        if let Some(port) = var("IDP_PORT") {
            config.server.port = port.parse().context("Invalid IDP_PORT value")?;
        }

        // Security configuration
        if let Some(enable_auth) = var("IDP_ENABLE_AUTH") {
            config.security.enable_auth = enable_auth
                .parse()
                .context("Invalid IDP_ENABLE_AUTH value")?;
        }

        if let Some(keys) = var("IDP_ADMIN_API_KEYS") {
            config.security.admin_api_keys = keys
                .split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect();
        }

        if let Some(size) = var("IDP_MAX_REQUEST_SIZE") {
            config.security.max_request_size =
                size.parse().context("Invalid IDP_MAX_REQUEST_SIZE value")?;
        }

        // Store configuration
        if let Some(backend) = var("IDP_STORE_BACKEND") {
            config.database.backend = match backend.to_lowercase().as_str() {
                "memory" => StoreBackend::Memory,
                "postgres" => StoreBackend::Postgres,
                other => {
                    return Err(anyhow::anyhow!(
                        "Invalid IDP_STORE_BACKEND value: {} (expected memory or postgres)",
                        other
                    ))
                }
            };
        }

        if let Some(url) = var("IDP_POSTGRES_URL") {
            config.database.postgres_url = url;
        }

        if let Some(max) = var("IDP_POSTGRES_MAX_CONNECTIONS") {
            config.database.max_connections = max
                .parse()
                .context("Invalid IDP_POSTGRES_MAX_CONNECTIONS value")?;
        }

        // Logging configuration
        if let Some(level) = var("IDP_LOG_LEVEL") {
            config.logging.level = level;
        }

        if let Some(sanitize) = var("IDP_SANITIZE_LOGS") {
            config.logging.sanitize_logs = sanitize
                .parse()
                .context("Invalid IDP_SANITIZE_LOGS value")?;
        }

        if let Some(log_requests) = var("IDP_LOG_REQUESTS") {
            config.logging.log_requests = log_requests
                .parse()
                .context("Invalid IDP_LOG_REQUESTS value")?;
        }

        // Bootstrap policy
        if let Some(name) = var("IDP_DEFAULT_POLICY_NAME") {
            let threshold: i64 = var("IDP_DEFAULT_POLICY_THRESHOLD")
                .context("IDP_DEFAULT_POLICY_THRESHOLD is required with IDP_DEFAULT_POLICY_NAME")?
                .parse()
                .context("Invalid IDP_DEFAULT_POLICY_THRESHOLD value")?;

            config.default_policy = Some(
                ReputationPolicyConfig::new(name, threshold)
                    .context("Invalid default reputation policy")?,
            );
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration for security and consistency
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(anyhow::anyhow!("Server host cannot be empty"));
        }

        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port must be non-zero"));
        }

        if self.database.backend == StoreBackend::Postgres && self.database.postgres_url.is_empty()
        {
            return Err(anyhow::anyhow!(
                "IDP_POSTGRES_URL is required when the postgres store backend is selected"
            ));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow::anyhow!("PostgreSQL max connections must be non-zero"));
        }

        if self.security.enable_auth {
            if self.security.admin_api_keys.is_empty() {
                return Err(anyhow::anyhow!(
                    "Admin auth is enabled but no IDP_ADMIN_API_KEYS are configured"
                ));
            }

            // Short keys are brute-forceable
            if self.security.admin_api_keys.iter().any(|k| k.len() < 32) {
                return Err(anyhow::anyhow!(
                    "Admin API keys must be at least 32 characters"
                ));
            }
        } else {
            warn!("Admin API authentication is disabled");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const KEY: &str = "adminKey0123456789abcdefghijklmnop";

    fn load(vars: &[(&str, &str)]) -> Result<ServiceConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_source(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults_with_admin_key() {
        let config = load(&[("IDP_ADMIN_API_KEYS", KEY)]).unwrap();
        assert_eq!(config.server.port, 9300);
        assert_eq!(config.database.backend, StoreBackend::Memory);
        assert!(config.default_policy.is_none());
    }

    #[test]
    fn test_auth_without_keys_rejected() {
        assert!(load(&[]).is_err());
        assert!(load(&[("IDP_ADMIN_API_KEYS", "short")]).is_err());
        assert!(load(&[("IDP_ENABLE_AUTH", "false")]).is_ok());
    }

    #[test]
    fn test_postgres_requires_url() {
        let base = [("IDP_ENABLE_AUTH", "false"), ("IDP_STORE_BACKEND", "postgres")];
        assert!(load(&base).is_err());

        let config = load(&[
            base[0],
            base[1],
            ("IDP_POSTGRES_URL", "postgresql://localhost:5432/idp"),
        ])
        .unwrap();
        assert_eq!(config.database.backend, StoreBackend::Postgres);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(load(&[("IDP_ENABLE_AUTH", "false"), ("IDP_STORE_BACKEND", "redis")]).is_err());
    }

    #[test]
    fn test_default_policy_needs_threshold() {
        let missing = load(&[
            ("IDP_ENABLE_AUTH", "false"),
            ("IDP_DEFAULT_POLICY_NAME", "login"),
        ]);
        assert!(missing.is_err());

        let config = load(&[
            ("IDP_ENABLE_AUTH", "false"),
            ("IDP_DEFAULT_POLICY_NAME", "login"),
            ("IDP_DEFAULT_POLICY_THRESHOLD", "-5"),
        ])
        .unwrap();
        let policy = config.default_policy.unwrap();
        assert_eq!(policy.threshold, -5);
        assert!(policy.check_ip && policy.check_username);
    }
}
