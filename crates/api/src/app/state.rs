//! Application context: every shared object the HTTP layer needs, built once
//! at startup from [`AppConfig`].

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use warden_auth::identity::IdentityStore;
use warden_auth::identity_cache::IdentityCache;
use warden_auth::policy::{LazyEnforcer, ModelSource, PolicyAdapter};
use warden_auth::refresh_store::InMemoryRefreshTokenStore;
use warden_auth::secrets::SecretProvider;
use warden_auth::session::SessionService;
use warden_auth::token::TokenService;
use warden_auth::Authorizer;
use warden_infra::{AppConfig, PostgresIdentityStore, PostgresPolicyAdapter};

pub struct AppContext {
    pub config: AppConfig,
    pub tokens: Arc<TokenService>,
    pub refresh_tokens: Arc<InMemoryRefreshTokenStore>,
    pub identity_cache: Arc<IdentityCache>,
    pub enforcer: Arc<LazyEnforcer>,
    pub authorizer: Arc<Authorizer>,
    pub sessions: Arc<SessionService>,
}

impl AppContext {
    /// Wire the core over the given stores. Signing secrets come from the
    /// config's `auth` section, falling back to the process environment.
    pub fn new(
        config: AppConfig,
        identities: Arc<dyn IdentityStore>,
        policies: Arc<dyn PolicyAdapter>,
    ) -> Self {
        let secrets = Arc::new(SecretProvider::new(Arc::new(config.clone())));
        Self::with_secrets(config, secrets, identities, policies)
    }

    pub fn with_secrets(
        config: AppConfig,
        secrets: Arc<SecretProvider>,
        identities: Arc<dyn IdentityStore>,
        policies: Arc<dyn PolicyAdapter>,
    ) -> Self {
        let roles = config.auth.role_policy();
        let tokens = Arc::new(TokenService::new(
            secrets,
            config.auth.token_ttl(),
            roles.clone(),
        ));
        let identity_cache = Arc::new(IdentityCache::new(config.auth.identity_cache_ttl(), roles));
        let enforcer = Arc::new(LazyEnforcer::new(
            ModelSource::from_config(config.policy.model_path.as_deref()),
            policies,
        ));
        let refresh_tokens = Arc::new(InMemoryRefreshTokenStore::new());

        let authorizer = Arc::new(
            Authorizer::new(
                tokens.clone(),
                identity_cache.clone(),
                identities.clone(),
                enforcer.clone(),
            )
            .with_public_paths(config.auth.public_paths.iter().cloned()),
        );
        let sessions = Arc::new(SessionService::new(
            tokens.clone(),
            refresh_tokens.clone(),
            identities,
            enforcer.clone(),
        ));

        Self {
            config,
            tokens,
            refresh_tokens,
            identity_cache,
            enforcer,
            authorizer,
            sessions,
        }
    }

    /// Production wiring: Postgres-backed identities and policy rules.
    ///
    /// Fails fast when either signing secret is missing.
    pub async fn connect(config: AppConfig) -> anyhow::Result<Self> {
        let secrets = Arc::new(SecretProvider::new(Arc::new(config.clone())));
        secrets
            .access_secret()
            .context("access token secret unavailable")?;
        secrets
            .refresh_secret()
            .context("refresh token secret unavailable")?;

        tracing::info!(max_connections = config.database.max_connections, "connecting to PostgreSQL");
        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect(&config.database.url)
            .await
            .context("failed to connect to PostgreSQL")?;

        let policies = PostgresPolicyAdapter::new(pool.clone());
        policies
            .ensure_schema()
            .await
            .context("failed to prepare policy table")?;
        let identities = PostgresIdentityStore::new(pool);

        Ok(Self::with_secrets(
            config,
            secrets,
            Arc::new(identities),
            Arc::new(policies),
        ))
    }
}
