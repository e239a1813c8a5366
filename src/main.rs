use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::fmt::format::FmtSpan;

use idp_reputation::{
    DatabasePool, MemoryScoreStore, PolicyDirectory, ReputationApiState, ReputationError,
    ScoreStore, SecurityMiddlewareConfig, SecurityState, ServiceConfig, create_app,
    config::StoreBackend,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first - this validates all security requirements
    let config = ServiceConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        eprintln!("Please check IDP_* environment variables.");
        e
    })?;

    init_logging(&config)?;

    info!("Starting identity provider reputation service");

    // Pick the score store
    let (store, db): (Arc<dyn ScoreStore>, Option<Arc<DatabasePool>>) =
        match config.database.backend {
            StoreBackend::Memory => {
                warn!("Using in-memory score store; scores are lost on restart");
                (Arc::new(MemoryScoreStore::new()) as Arc<dyn ScoreStore>, None)
            }
            StoreBackend::Postgres => {
                let db = Arc::new(
                    DatabasePool::new(
                        &config.database.postgres_url,
                        config.database.max_connections,
                    )
                    .await?,
                );
                db.init_schema().await?;
                (Arc::new(db.scores().clone()) as Arc<dyn ScoreStore>, Some(db))
            }
        };

    // Policy directory, write-through to the database when present
    let mut directory = PolicyDirectory::new(store.clone());
    if let Some(db) = db {
        directory = directory.with_database(db);
    }
    let directory = Arc::new(directory);
    directory.load().await?;

    if let Some(policy) = config.default_policy.clone() {
        match directory.create(policy).await {
            Ok(created) => info!(
                "Registered default reputation policy '{}' (threshold {})",
                created.name, created.threshold
            ),
            Err(ReputationError::PolicyExists(name)) => {
                info!("Default reputation policy '{}' already registered", name)
            }
            Err(e) => return Err(e).context("Failed to register default policy"),
        }
    }

    let security_state = SecurityState::new(SecurityMiddlewareConfig {
        enable_auth: config.security.enable_auth,
        api_keys: config.security.admin_api_keys.clone(),
        max_request_size: config.security.max_request_size,
        log_requests: config.logging.log_requests,
        sanitize_logs: config.logging.sanitize_logs,
    });

    let app = create_app(ReputationApiState::new(store, directory), security_state);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", bind_addr, e))?;

    info!("Reputation service listening on {}", bind_addr);
    info!(
        "Security middleware: Auth={}, Max body={}KB",
        config.security.enable_auth,
        config.security.max_request_size / 1024
    );

    // Serve with connect info for client IP extraction
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Initialize logging based on configuration
fn init_logging(config: &ServiceConfig) -> Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(if config.logging.log_requests {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    if config.logging.sanitize_logs {
        info!("Logging initialized with client address masking");
    }

    Ok(())
}
