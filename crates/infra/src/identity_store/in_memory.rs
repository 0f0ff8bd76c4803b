use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use warden_auth::error::StorageError;
use warden_auth::identity::{Identity, IdentityStore};
use warden_core::UserId;

/// In-memory identity store for tests/dev.
///
/// Counts lookups so callers can assert how often the durable store was hit.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    inner: RwLock<HashMap<UserId, Identity>>,
    reads: AtomicUsize,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identities<I: IntoIterator<Item = Identity>>(identities: I) -> Self {
        let store = Self::new();
        for identity in identities {
            store.upsert(identity);
        }
        store
    }

    pub fn upsert(&self, identity: Identity) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(identity.id, identity);
        }
    }

    pub fn remove(&self, id: UserId) -> Option<Identity> {
        self.inner.write().ok()?.remove(&id)
    }

    /// Lookups served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    fn snapshot(
        &self,
        operation: &'static str,
    ) -> Result<RwLockReadGuard<'_, HashMap<UserId, Identity>>, StorageError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.inner
            .read()
            .map_err(|_| StorageError::message(operation, "identity store lock poisoned"))
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<Identity>, StorageError> {
        Ok(self.snapshot("find_by_id")?.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, StorageError> {
        Ok(self
            .snapshot("find_by_username")?
            .values()
            .find(|identity| identity.username == username)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use warden_auth::identity_cache::IdentityCache;
    use warden_auth::roles::{Role, RolePolicy};
    use warden_core::TenantId;

    fn identity(username: &str, roles: &str) -> Identity {
        Identity {
            id: UserId::new(),
            tenant_id: TenantId::new(),
            username: username.to_string(),
            password_hash: String::new(),
            roles: roles.to_string(),
            real_name: String::new(),
            home_path: String::new(),
        }
    }

    #[tokio::test]
    async fn finds_by_id_and_username() {
        let alice = identity("alice", "admin");
        let store = InMemoryIdentityStore::with_identities([alice.clone()]);

        assert_eq!(store.find_by_id(alice.id).await.unwrap(), Some(alice.clone()));
        assert_eq!(store.find_by_username("alice").await.unwrap(), Some(alice));
        assert_eq!(store.find_by_username("bob").await.unwrap(), None);
        assert_eq!(store.reads(), 3);
    }

    #[tokio::test]
    async fn removed_identity_is_gone() {
        let alice = identity("alice", "");
        let store = InMemoryIdentityStore::with_identities([alice.clone()]);

        assert!(store.remove(alice.id).is_some());
        assert_eq!(store.find_by_id(alice.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn cache_in_front_of_store_reads_once_per_ttl() {
        let alice = identity("alice", r#"["admin","user"]"#);
        let store = Arc::new(InMemoryIdentityStore::with_identities([alice.clone()]));
        let cache = IdentityCache::new(Duration::from_secs(60), RolePolicy::default());

        let first = cache.load_from(alice.id, store.as_ref()).await.unwrap();
        let second = cache.load_from(alice.id, store.as_ref()).await.unwrap();

        assert_eq!(first.roles, vec![Role::ADMIN, Role::USER]);
        assert_eq!(second.identity, first.identity);
        assert_eq!(store.reads(), 1);
    }
}
