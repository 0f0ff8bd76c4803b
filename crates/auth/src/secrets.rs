//! Signing-secret resolution.
//!
//! Each secret is looked up once per provider: the configuration key wins,
//! the environment variable is the fallback, and absence of both is a
//! `MissingSecret` error. The outcome (value or error) is memoized so every
//! later caller observes the same result.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::error::{AuthError, AuthResult};

/// Read access to dotted configuration keys (e.g. `auth.jwt_secret`).
pub trait ConfigLookup: Send + Sync {
    fn lookup(&self, key: &str) -> Option<String>;
}

impl<S> ConfigLookup for Arc<S>
where
    S: ConfigLookup + ?Sized,
{
    fn lookup(&self, key: &str) -> Option<String> {
        (**self).lookup(key)
    }
}

impl ConfigLookup for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Where a secret comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecretSource {
    pub env: &'static str,
    pub config_key: &'static str,
}

pub const ACCESS_SECRET: SecretSource = SecretSource {
    env: "JWT_SECRET",
    config_key: "auth.jwt_secret",
};

pub const REFRESH_SECRET: SecretSource = SecretSource {
    env: "JWT_REFRESH_SECRET",
    config_key: "auth.refresh_secret",
};

/// Raw HMAC key material. `Debug` never prints the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningSecret(Arc<[u8]>);

impl SigningSecret {
    pub fn new(bytes: impl AsRef<[u8]>) -> Self {
        Self(Arc::from(bytes.as_ref()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl core::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "SigningSecret(<{} bytes>)", self.0.len())
    }
}

pub type EnvReader = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

fn process_env() -> EnvReader {
    Arc::new(|name| std::env::var(name).ok())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Resolve one secret without memoization.
pub fn resolve_secret(
    source: SecretSource,
    config: &dyn ConfigLookup,
    env: &dyn Fn(&str) -> Option<String>,
) -> AuthResult<SigningSecret> {
    non_blank(config.lookup(source.config_key))
        .or_else(|| non_blank(env(source.env)))
        .map(SigningSecret::new)
        .ok_or_else(|| AuthError::MissingSecret {
            env: source.env.to_string(),
        })
}

/// Memoizing provider for the access and refresh signing secrets.
pub struct SecretProvider {
    config: Arc<dyn ConfigLookup>,
    env: EnvReader,
    access: OnceLock<AuthResult<SigningSecret>>,
    refresh: OnceLock<AuthResult<SigningSecret>>,
}

impl SecretProvider {
    pub fn new(config: Arc<dyn ConfigLookup>) -> Self {
        Self::with_env_reader(config, process_env())
    }

    pub fn with_env_reader(config: Arc<dyn ConfigLookup>, env: EnvReader) -> Self {
        Self {
            config,
            env,
            access: OnceLock::new(),
            refresh: OnceLock::new(),
        }
    }

    /// Provider with fixed secrets (tests, embedded use).
    pub fn fixed(access: impl AsRef<[u8]>, refresh: impl AsRef<[u8]>) -> Self {
        let provider = Self::with_env_reader(Arc::new(HashMap::new()), Arc::new(|_| None));
        let _ = provider.access.set(Ok(SigningSecret::new(access)));
        let _ = provider.refresh.set(Ok(SigningSecret::new(refresh)));
        provider
    }

    pub fn access_secret(&self) -> AuthResult<SigningSecret> {
        self.memoized(&self.access, ACCESS_SECRET)
    }

    pub fn refresh_secret(&self) -> AuthResult<SigningSecret> {
        self.memoized(&self.refresh, REFRESH_SECRET)
    }

    fn memoized(
        &self,
        cell: &OnceLock<AuthResult<SigningSecret>>,
        source: SecretSource,
    ) -> AuthResult<SigningSecret> {
        cell.get_or_init(|| {
            let resolved = resolve_secret(source, self.config.as_ref(), self.env.as_ref());
            match &resolved {
                Ok(_) => tracing::debug!(env = source.env, "signing secret resolved"),
                Err(_) => tracing::error!(
                    env = source.env,
                    config_key = source.config_key,
                    "signing secret missing"
                ),
            }
            resolved
        })
        .clone()
    }
}

impl core::fmt::Debug for SecretProvider {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SecretProvider")
            .field("access_resolved", &self.access.get().is_some())
            .field("refresh_resolved", &self.refresh.get().is_some())
            .finish()
    }
}
