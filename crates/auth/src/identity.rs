//! User identity records as seen by the authorization core.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use warden_core::{TenantId, UserId};

use crate::error::StorageError;

/// A stored user account. Read-only from this crate's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub tenant_id: TenantId,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Role list exactly as stored; see [`crate::roles::decode_roles`].
    pub roles: String,
    pub real_name: String,
    pub home_path: String,
}

/// Durable identity lookup (provisioning happens elsewhere).
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<Identity>, StorageError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, StorageError>;
}

#[async_trait]
impl<S> IdentityStore for Arc<S>
where
    S: IdentityStore + ?Sized,
{
    async fn find_by_id(&self, id: UserId) -> Result<Option<Identity>, StorageError> {
        (**self).find_by_id(id).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, StorageError> {
        (**self).find_by_username(username).await
    }
}
