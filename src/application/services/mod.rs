pub mod auth_application_service;
pub mod lock_manager_service;
pub mod quota_service;
