/**
 * Process entry point: loads configuration, wires the DI container, and
 * serves the WebDAV surface plus the `/auth/login` bootstrap route.
 */
mod application;
mod common;
mod domain;
mod infrastructure;
mod interfaces;

use std::sync::Arc;
use std::time::Duration;

use axum::middleware;
use axum::Router;
use tower_http::trace::TraceLayer;

use application::ports::lock_ports::LockManagerPort;
use application::services::auth_application_service::AuthApplicationService;
use application::services::lock_manager_service::LockManagerService;
use application::services::quota_service::UserQuotaService;
use common::config::AppConfig;
use common::db::create_database_pool;
use common::di::AppState;
use domain::services::auth_service::AuthService;
use infrastructure::repositories::pg::{LockPgRepository, PropertyPgRepository, SessionPgRepository, UserPgRepository};
use infrastructure::services::s3_object_store::S3ObjectStore;
use interfaces::api::handlers::auth_handler::auth_routes;
use interfaces::api::handlers::webdav_handler::webdav_routes;
use interfaces::middleware::auth::require_bearer_auth;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env();
    let pool = Arc::new(create_database_pool(&config).await?);

    let object_store: Arc<dyn application::ports::object_store_port::ObjectStore> =
        Arc::new(S3ObjectStore::new(&config.storage));

    let lock_repository = Arc::new(LockPgRepository::new(pool.clone()));
    let lock_manager = Arc::new(LockManagerService::new(lock_repository, config.lock.max_timeout_seconds));

    let property_repository = Arc::new(PropertyPgRepository::new(pool.clone(), config.properties.max_value_bytes));
    let user_storage = Arc::new(UserPgRepository::new(pool.clone()));
    let session_storage = Arc::new(SessionPgRepository::new(pool.clone()));

    let quota_service = Arc::new(UserQuotaService::new(user_storage.clone()));
    let auth_service = Arc::new(AuthService::new(
        config.auth.jwt_secret.clone(),
        config.auth.token_expiry_secs,
        config.auth.refresh_token_expiry_days,
    ));
    let auth_application_service = Arc::new(AuthApplicationService::new(
        user_storage.clone(),
        session_storage.clone(),
        auth_service.clone(),
    ));

    let state = Arc::new(AppState {
        config: config.clone(),
        object_store,
        lock_manager: lock_manager.clone(),
        property_repository,
        quota_service,
        user_storage,
        session_storage,
        auth_service,
        auth_application_service,
    });

    if config.lock.persistence_enabled {
        let rehydrated = lock_manager.rehydrate().await?;
        tracing::info!("rehydrated {} lock(s) from durable mirror", rehydrated);
        spawn_lock_maintenance(lock_manager, config.lock.cleanup_interval());
    }

    let webdav = webdav_routes().route_layer(middleware::from_fn_with_state(state.clone(), require_bearer_auth));
    let app = Router::new()
        .merge(auth_routes())
        .merge(webdav)
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind(config.server.address.as_str()).await?;
    tracing::info!("listening on {}", config.server.address);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Rehydration has no single `user_id` to scope to at startup — the lock
/// index is shared across all tenants in-process, so `rehydrate` is run
/// once against the durable mirror's full contents rather than per user.
/// The periodic sweep then runs for the lifetime of the process.
fn spawn_lock_maintenance(lock_manager: Arc<LockManagerService>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match lock_manager.sweep_expired().await {
                Ok(count) if count > 0 => tracing::debug!("swept {} expired locks", count),
                Ok(_) => {}
                Err(e) => tracing::warn!("lock sweep failed: {}", e),
            }
        }
    });
}
