//! Per-request authorization decision.
//!
//! Transport-agnostic: the HTTP layer copies method, path, and the relevant
//! headers into an [`AuthzRequest`] and maps the outcome to a response. Every
//! failure is a deny; there is no allow-on-error path.

use std::sync::Arc;

use warden_core::{AuthzDomain, TenantId};

use crate::error::{AuthError, AuthResult};
use crate::identity::IdentityStore;
use crate::identity_cache::IdentityCache;
use crate::policy::{Enforcer, LazyEnforcer};
use crate::principal::Principal;
use crate::token::TokenService;

/// Header a privileged caller may use to act inside another tenant.
pub const TENANT_OVERRIDE_HEADER: &str = "x-tenant-id";

pub const DEFAULT_PUBLIC_PATHS: [&str; 2] = ["/auth/login", "/auth/refresh"];

#[derive(Debug, Clone, Copy)]
pub struct AuthzRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    /// Raw `Authorization` header value.
    pub authorization: Option<&'a str>,
    /// Raw tenant override header value.
    pub tenant_override: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Pre-flight or allow-listed path; no identity was resolved.
    Public,
    Allowed(Principal),
}

pub struct Authorizer {
    tokens: Arc<TokenService>,
    cache: Arc<IdentityCache>,
    identities: Arc<dyn IdentityStore>,
    enforcer: Arc<LazyEnforcer>,
    public_paths: Vec<String>,
}

impl Authorizer {
    pub fn new(
        tokens: Arc<TokenService>,
        cache: Arc<IdentityCache>,
        identities: Arc<dyn IdentityStore>,
        enforcer: Arc<LazyEnforcer>,
    ) -> Self {
        Self {
            tokens,
            cache,
            identities,
            enforcer,
            public_paths: DEFAULT_PUBLIC_PATHS.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn with_public_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.public_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_public(&self, method: &str, path: &str) -> bool {
        method.eq_ignore_ascii_case("OPTIONS") || self.public_paths.iter().any(|p| p == path)
    }

    pub async fn authorize(&self, req: AuthzRequest<'_>) -> AuthResult<Decision> {
        if self.is_public(req.method, req.path) {
            return Ok(Decision::Public);
        }

        let token = extract_bearer(req.authorization)?;
        let claims = self.tokens.verify_access_token(token)?;
        let user_id = claims.subject()?;
        let cached = self.cache.load_from(user_id, self.identities.as_ref()).await?;

        let mut tenant_id = match claims.tenant()? {
            Some(from_token) => {
                if from_token != cached.identity.tenant_id {
                    tracing::debug!(
                        user_id = %user_id,
                        token_tenant = %from_token,
                        record_tenant = %cached.identity.tenant_id,
                        "token tenant differs from stored identity"
                    );
                }
                from_token
            }
            None => cached.identity.tenant_id,
        };
        if claims.is_super
            && let Some(raw) = req.tenant_override
            && let Some(overridden) = TenantId::parse_optional(raw)
                .map_err(|e| AuthError::unauthorized(format!("invalid tenant override: {e}")))?
        {
            tenant_id = overridden;
        }

        let domain = AuthzDomain::for_tenant(tenant_id);
        let action = req.method.to_ascii_lowercase();
        let super_role = &self.tokens.role_policy().super_role;
        let mut enforcer: Option<Arc<Enforcer>> = None;

        for role in cached.roles.iter().filter(|r| !r.is_blank()) {
            let allowed = if role == super_role {
                true
            } else {
                let engine = match &enforcer {
                    Some(engine) => engine.clone(),
                    None => {
                        let engine = self.enforcer.get().await?;
                        enforcer = Some(engine.clone());
                        engine
                    }
                };
                engine.enforce(role.as_str(), &domain, req.path, &action).await?
            };

            if allowed {
                return Ok(Decision::Allowed(Principal {
                    user_id,
                    username: cached.identity.username.clone(),
                    tenant_id,
                    domain,
                    roles: cached.roles.clone(),
                    privileged: claims.is_super,
                }));
            }
        }

        Err(AuthError::permission_denied())
    }
}

/// Pull the token out of an `Authorization` header value.
///
/// The `Bearer` scheme is matched case-insensitively and stripped; a bare
/// value without a scheme is taken as the token itself.
pub fn extract_bearer(header: Option<&str>) -> AuthResult<&str> {
    let value = header
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AuthError::unauthorized("missing token"))?;

    let token = match (value.get(..6), value.get(6..)) {
        (Some(scheme), Some(rest))
            if scheme.eq_ignore_ascii_case("bearer") && rest.starts_with(char::is_whitespace) =>
        {
            rest.trim()
        }
        _ => value,
    };

    if token.is_empty() {
        return Err(AuthError::unauthorized("missing token"));
    }
    Ok(token)
}
