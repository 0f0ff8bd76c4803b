//! Shared fixtures for unit tests in this crate.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use warden_core::{TenantId, UserId};

use crate::authorize::Authorizer;
use crate::error::StorageError;
use crate::identity::{Identity, IdentityStore};
use crate::identity_cache::{DEFAULT_IDENTITY_TTL, IdentityCache};
use crate::password::hash_password;
use crate::policy::{LazyEnforcer, ModelSource, PolicyAdapter, PolicyRule};
use crate::policy::adapter::MemoryAdapter;
use crate::refresh_store::InMemoryRefreshTokenStore;
use crate::roles::RolePolicy;
use crate::secrets::SecretProvider;
use crate::session::SessionService;
use crate::token::{TokenService, TokenTtl};

pub const PASSWORD: &str = "correct horse battery staple";

fn password_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(PASSWORD).unwrap()).clone()
}

pub fn identity(tenant_id: TenantId, username: &str, roles: &str) -> Identity {
    Identity {
        id: UserId::new(),
        tenant_id,
        username: username.to_string(),
        password_hash: password_hash(),
        roles: roles.to_string(),
        real_name: username.to_uppercase(),
        home_path: String::new(),
    }
}

#[derive(Default)]
pub struct StaticIdentities {
    users: RwLock<HashMap<UserId, Identity>>,
}

#[async_trait]
impl IdentityStore for StaticIdentities {
    async fn find_by_id(&self, id: UserId) -> Result<Option<Identity>, StorageError> {
        // Suspend once so concurrent callers interleave around the lookup.
        tokio::task::yield_now().await;
        Ok(self.users.read().unwrap().get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, StorageError> {
        Ok(self
            .users
            .read()
            .unwrap()
            .values()
            .find(|u| u.username == username)
            .cloned())
    }
}

struct UnreachableAdapter;

#[async_trait]
impl PolicyAdapter for UnreachableAdapter {
    async fn load_all(&self) -> Result<Vec<PolicyRule>, StorageError> {
        Err(StorageError::message("load_all", "policy database unreachable"))
    }
    async fn save_all(&self, _: &[PolicyRule]) -> Result<(), StorageError> {
        Err(StorageError::message("save_all", "policy database unreachable"))
    }
    async fn add_rule(&self, _: &PolicyRule) -> Result<(), StorageError> {
        Err(StorageError::message("add_rule", "policy database unreachable"))
    }
    async fn remove_rule(&self, _: &PolicyRule) -> Result<(), StorageError> {
        Err(StorageError::message("remove_rule", "policy database unreachable"))
    }
    async fn remove_filtered(&self, _: &str, _: usize, _: &[String]) -> Result<(), StorageError> {
        Err(StorageError::message("remove_filtered", "policy database unreachable"))
    }
}

pub struct Fixture {
    pub tokens: Arc<TokenService>,
    pub identities: Arc<StaticIdentities>,
    pub refresh: Arc<InMemoryRefreshTokenStore>,
    pub enforcer: Arc<LazyEnforcer>,
    pub authorizer: Authorizer,
}

impl Fixture {
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        Self::with_cache_ttl(rules, DEFAULT_IDENTITY_TTL)
    }

    pub fn with_cache_ttl(rules: Vec<PolicyRule>, ttl: Duration) -> Self {
        Self::build(Arc::new(MemoryAdapter::with_rules(rules)), ttl)
    }

    pub fn broken_policy_store() -> Self {
        Self::build(Arc::new(UnreachableAdapter), DEFAULT_IDENTITY_TTL)
    }

    fn build(adapter: Arc<dyn PolicyAdapter>, ttl: Duration) -> Self {
        let roles = RolePolicy::default();
        let tokens = Arc::new(TokenService::new(
            Arc::new(SecretProvider::fixed("test-access", "test-refresh")),
            TokenTtl::default(),
            roles.clone(),
        ));
        let identities = Arc::new(StaticIdentities::default());
        let cache = Arc::new(IdentityCache::new(ttl, roles));
        let enforcer = Arc::new(LazyEnforcer::new(ModelSource::Embedded, adapter));
        let authorizer = Authorizer::new(
            tokens.clone(),
            cache,
            identities.clone(),
            enforcer.clone(),
        );

        Self {
            tokens,
            identities,
            refresh: Arc::new(InMemoryRefreshTokenStore::new()),
            enforcer,
            authorizer,
        }
    }

    pub fn add(&self, identity: Identity) -> Identity {
        self.identities
            .users
            .write()
            .unwrap()
            .insert(identity.id, identity.clone());
        identity
    }

    pub fn remove(&self, id: UserId) {
        self.identities.users.write().unwrap().remove(&id);
    }

    pub fn bearer(&self, identity: &Identity) -> String {
        format!("Bearer {}", self.tokens.issue_access_token(identity).unwrap())
    }

    pub fn sessions(&self) -> SessionService {
        SessionService::new(
            self.tokens.clone(),
            self.refresh.clone(),
            self.identities.clone(),
            self.enforcer.clone(),
        )
    }
}
