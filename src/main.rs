//! Page Builder Service - Main Application Entry Point
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool and run migrations (Postgres backend only)
//! 3. Wire stores and services into shared state
//! 4. Start the rate limiter cleanup task
//! 5. Build HTTP router and start server on configured port

use std::time::Duration;

use page_builder_service::{
    AppState,
    config::{Config, StorageBackend},
    db, router,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        storage = ?config.storage_backend,
        credentials = ?config.credential_mode,
        "Configuration loaded"
    );

    let pool = match config.storage_backend {
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for the postgres backend"))?;

            let pool = db::create_pool(url).await?;
            tracing::info!("Database pool created");

            db::run_migrations(&pool).await?;
            tracing::info!("Database migrations complete");

            Some(pool)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            None
        }
    };

    let state = AppState::build(&config, pool)?;

    // Drop rate windows that have already expired, once per window
    let rate_limiter = state.rate_limiter.clone();
    let purge_every = config.rate_limit_window().max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(purge_every);
        loop {
            interval.tick().await;
            rate_limiter.purge_expired().await;
        }
    });

    let app = router(state);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
