/**
 * Dependency-injection container wired up once in `main.rs` and handed to
 * every handler as axum `State`. Ports are trait objects where more than
 * one implementation plausibly exists (`ObjectStore`, `PropertyRepository`,
 * `QuotaService`, the auth storage ports); the lock manager is kept
 * concrete because `main.rs` also needs its `rehydrate`/`sweep_expired`
 * lifecycle methods, which aren't part of `LockManagerPort`.
 */
use std::sync::Arc;

use crate::application::ports::auth_ports::{SessionStoragePort, UserStoragePort};
use crate::application::ports::object_store_port::ObjectStore;
use crate::application::ports::quota_ports::QuotaService;
use crate::application::services::auth_application_service::AuthApplicationService;
use crate::application::services::lock_manager_service::LockManagerService;
use crate::common::config::AppConfig;
use crate::domain::repositories::property_repository::PropertyRepository;
use crate::domain::services::auth_service::AuthService;

pub struct AppState {
    pub config: AppConfig,
    pub object_store: Arc<dyn ObjectStore>,
    pub lock_manager: Arc<LockManagerService>,
    pub property_repository: Arc<dyn PropertyRepository>,
    pub quota_service: Arc<dyn QuotaService>,
    pub user_storage: Arc<dyn UserStoragePort>,
    pub session_storage: Arc<dyn SessionStoragePort>,
    pub auth_service: Arc<AuthService>,
    pub auth_application_service: Arc<AuthApplicationService>,
}
