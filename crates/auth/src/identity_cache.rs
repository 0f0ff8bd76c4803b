//! Short-lived cache of resolved identities and their roles.
//!
//! Staleness is bounded by the TTL: an entry past `expires_at` is treated as
//! absent and evicted on the next read. There is no background sweep.

use std::collections::HashMap;
use std::future::Future;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use warden_core::UserId;

use crate::error::{AuthError, AuthResult, StorageError};
use crate::identity::{Identity, IdentityStore};
use crate::roles::{Role, RolePolicy};

pub const DEFAULT_IDENTITY_TTL: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedIdentity {
    pub identity: Identity,
    pub roles: Vec<Role>,
    pub expires_at: Instant,
}

impl CachedIdentity {
    pub fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug)]
pub struct IdentityCache {
    ttl: Duration,
    roles: RolePolicy,
    entries: RwLock<HashMap<UserId, CachedIdentity>>,
}

impl IdentityCache {
    pub fn new(ttl: Duration, roles: RolePolicy) -> Self {
        Self {
            ttl,
            roles,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, user_id: UserId) -> Option<CachedIdentity> {
        let now = Instant::now();
        {
            let map = self.entries.read().ok()?;
            match map.get(&user_id) {
                Some(entry) if entry.is_fresh(now) => return Some(entry.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: evict unless a concurrent writer already refreshed it.
        if let Ok(mut map) = self.entries.write() {
            if map.get(&user_id).is_some_and(|e| !e.is_fresh(now)) {
                map.remove(&user_id);
            }
        }
        None
    }

    pub fn set(&self, user_id: UserId, entry: CachedIdentity) {
        if let Ok(mut map) = self.entries.write() {
            map.insert(user_id, entry);
        }
    }

    pub fn invalidate(&self, user_id: UserId) {
        if let Ok(mut map) = self.entries.write() {
            map.remove(&user_id);
        }
    }

    pub fn invalidate_all(&self) {
        if let Ok(mut map) = self.entries.write() {
            map.clear();
        }
    }

    /// Return the fresh entry or fetch, resolve roles, and cache.
    ///
    /// `fetch` runs with no lock held; two concurrent misses may both fetch
    /// and the last write wins.
    pub async fn load_or_fetch<F, Fut>(&self, user_id: UserId, fetch: F) -> AuthResult<CachedIdentity>
    where
        F: FnOnce(UserId) -> Fut,
        Fut: Future<Output = Result<Option<Identity>, StorageError>>,
    {
        if let Some(entry) = self.get(user_id) {
            return Ok(entry);
        }

        let identity = fetch(user_id).await?.ok_or(AuthError::UserNotFound)?;
        let roles = self.roles.resolve(&identity.roles)?;
        let entry = CachedIdentity {
            identity,
            roles,
            expires_at: Instant::now() + self.ttl,
        };
        self.set(user_id, entry.clone());
        tracing::debug!(user_id = %user_id, roles = entry.roles.len(), "identity cached");
        Ok(entry)
    }

    pub async fn load_from<S>(&self, user_id: UserId, store: &S) -> AuthResult<CachedIdentity>
    where
        S: IdentityStore + ?Sized,
    {
        self.load_or_fetch(user_id, |id| store.find_by_id(id)).await
    }
}
