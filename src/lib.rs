//! Page Builder Service
//!
//! A REST API for bulk page creation on behalf of external systems. Callers
//! authenticate with an API key/secret pair, are rate limited per key, and
//! every request lands in an audit log. Successful batches are announced to
//! a signed webhook.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Storage**: PostgreSQL with sqlx, or in-memory stores for local runs
//! - **Authentication**: API key/secret with SHA-256 hashing; admin bearer token
//! - **Format**: JSON requests/responses

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::{
    config::{Config, CredentialStoreMode, StorageBackend},
    db::DbPool,
    models::webhook::WebhookSettings,
    services::{
        audit_logger::{ApiLogStore, AuditLogger, MemoryApiLogStore, PgApiLogStore},
        authenticator::Authenticator,
        credential_store::{
            CredentialStore, FixedCredentialStore, MemoryCredentialStore, PgCredentialStore,
        },
        ingest_service::IngestService,
        page_store::{MemoryPageStore, PageStore, PgPageStore},
        rate_limiter::RateLimiter,
        webhook_service::{RetryPolicy, WebhookDispatcher, WebhookSettingsStore},
    },
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub ingest: Arc<IngestService>,
    pub credentials: Arc<dyn CredentialStore>,
    pub dispatcher: WebhookDispatcher,
    pub audit: AuditLogger,
    pub rate_limiter: Arc<RateLimiter>,
    pub admin_token: Option<String>,
    /// `None` on the memory backend
    pub db: Option<DbPool>,
}

impl AppState {
    /// Wire the stores and services selected by `config`.
    ///
    /// `pool` must be present for the Postgres backend and is ignored for
    /// the memory backend.
    pub fn build(config: &Config, pool: Option<DbPool>) -> anyhow::Result<Self> {
        let pool = match config.storage_backend {
            StorageBackend::Postgres => Some(
                pool.ok_or_else(|| anyhow::anyhow!("postgres backend requires a database pool"))?,
            ),
            StorageBackend::Memory => None,
        };

        let (log_store, page_store, persistent_credentials): (
            Arc<dyn ApiLogStore>,
            Arc<dyn PageStore>,
            Arc<dyn CredentialStore>,
        ) = match &pool {
            Some(pool) => (
                Arc::new(PgApiLogStore::new(pool.clone())),
                Arc::new(PgPageStore::new(pool.clone(), &config.public_base_url)),
                Arc::new(PgCredentialStore::new(pool.clone())),
            ),
            None => (
                Arc::new(MemoryApiLogStore::new()),
                Arc::new(MemoryPageStore::new(&config.public_base_url)),
                Arc::new(MemoryCredentialStore::new()),
            ),
        };

        let credentials: Arc<dyn CredentialStore> = match config.credential_mode {
            CredentialStoreMode::Persistent => persistent_credentials,
            CredentialStoreMode::FixedTest => {
                tracing::warn!("fixed test credentials are active; do not use in production");
                Arc::new(FixedCredentialStore::new(
                    &config.fixed_api_key,
                    &config.fixed_api_secret,
                ))
            }
        };

        let audit = AuditLogger::new(log_store);

        let settings = WebhookSettingsStore::new(WebhookSettings {
            webhook_url: config.webhook_url.clone(),
            webhook_secret: config.webhook_secret.clone(),
        })?;
        let dispatcher = WebhookDispatcher::new(
            settings,
            audit.clone(),
            RetryPolicy::with_base_delay(config.webhook_backoff_base()),
            config.webhook_timeout(),
            &config.site_name,
        )?;

        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit_window(),
            config.rate_limit_max_requests,
        ));

        let ingest = IngestService::new(
            Authenticator::new(credentials.clone()),
            rate_limiter.clone(),
            page_store,
            audit.clone(),
            Arc::new(dispatcher.clone()),
        );

        Ok(Self {
            ingest: Arc::new(ingest),
            credentials,
            dispatcher,
            audit,
            rate_limiter,
            admin_token: config.admin_token.clone().filter(|t| !t.trim().is_empty()),
            db: pool,
        })
    }
}

/// Build the HTTP router.
///
/// Admin routes are only mounted when an admin token is configured.
pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        // Public routes
        .route("/health", get(handlers::health::health_check))
        .route(
            "/pagebuilder/v1/create-pages",
            post(handlers::pages::create_pages),
        );

    if state.admin_token.is_some() {
        let admin_routes = Router::new()
            // Key management routes
            .route(
                "/pagebuilder/v1/admin/keys",
                post(handlers::api_keys::create_key).get(handlers::api_keys::list_keys),
            )
            .route(
                "/pagebuilder/v1/admin/keys/{id}/revoke",
                post(handlers::api_keys::revoke_key),
            )
            // Audit log routes
            .route("/pagebuilder/v1/admin/logs", get(handlers::logs::list_logs))
            // Webhook routes
            .route(
                "/pagebuilder/v1/admin/webhook",
                get(handlers::webhooks::get_settings).put(handlers::webhooks::update_settings),
            )
            .route(
                "/pagebuilder/v1/admin/webhook/test",
                post(handlers::webhooks::send_test),
            )
            // Apply admin authentication to all routes in this group
            .route_layer(axum_middleware::from_fn_with_state(
                state.clone(),
                middleware::auth::admin_auth_middleware,
            ));

        app = app.merge(admin_routes);
    } else {
        tracing::info!("ADMIN_TOKEN not set; admin routes are disabled");
    }

    app
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
