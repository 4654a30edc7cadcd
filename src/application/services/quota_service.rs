use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::ports::auth_ports::UserStoragePort;
use crate::application::ports::quota_ports::QuotaService;
use crate::common::errors::DomainError;
use crate::domain::entities::user::UserQuota;

pub struct UserQuotaService {
    user_storage: Arc<dyn UserStoragePort>,
}

impl UserQuotaService {
    pub fn new(user_storage: Arc<dyn UserStoragePort>) -> Self {
        Self { user_storage }
    }
}

#[async_trait]
impl QuotaService for UserQuotaService {
    async fn get_quota(&self, user_id: Uuid) -> Result<UserQuota, DomainError> {
        self.user_storage.get_quota(&user_id).await
    }

    async fn adjust_used(&self, user_id: Uuid, delta: i64) -> Result<(), DomainError> {
        self.user_storage.adjust_used_bytes(&user_id, delta).await
    }
}
