//! Login, refresh-token rotation, logout, and access-code listing.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;

use warden_core::{TenantId, UserId};

use crate::error::{AuthError, AuthResult};
use crate::identity::{Identity, IdentityStore};
use crate::password::verify_password;
use crate::permissions::fallback_access_codes;
use crate::policy::LazyEnforcer;
use crate::principal::Principal;
use crate::refresh_store::RefreshTokenStore;
use crate::roles::Role;
use crate::token::TokenService;

pub const DEFAULT_HOME_PATH: &str = "/dashboard";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub username: String,
    pub real_name: String,
    pub roles: Vec<Role>,
    pub home_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub tokens: TokenPair,
    pub user: UserInfo,
}

pub struct SessionService {
    tokens: Arc<TokenService>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    identities: Arc<dyn IdentityStore>,
    enforcer: Arc<LazyEnforcer>,
    home_path: String,
}

impl SessionService {
    pub fn new(
        tokens: Arc<TokenService>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        identities: Arc<dyn IdentityStore>,
        enforcer: Arc<LazyEnforcer>,
    ) -> Self {
        Self {
            tokens,
            refresh_tokens,
            identities,
            enforcer,
            home_path: DEFAULT_HOME_PATH.to_string(),
        }
    }

    /// Home path reported for users whose record has none.
    pub fn with_default_home_path(mut self, path: impl Into<String>) -> Self {
        self.home_path = path.into();
        self
    }

    #[instrument(skip(self, password), err)]
    pub async fn login(&self, username: &str, password: &str) -> AuthResult<LoginOutcome> {
        let identity = self
            .identities
            .find_by_username(username.trim())
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !verify_password(password, &identity.password_hash) {
            tracing::warn!(user_id = %identity.id, "login rejected: incorrect password");
            return Err(AuthError::IncorrectPassword);
        }

        let roles = self.tokens.role_policy().resolve(&identity.roles)?;
        let tokens = self.issue_pair(&identity)?;
        self.refresh_tokens.add(&tokens.refresh_token, identity.id);
        tracing::info!(user_id = %identity.id, tenant_id = %identity.tenant_id, "login succeeded");

        Ok(LoginOutcome {
            tokens,
            user: self.user_info(&identity, roles),
        })
    }

    /// Exchange a registered refresh token for a new pair.
    ///
    /// The old token stays registered until the new pair has been issued.
    /// Rotation is a single conditional `replace`: of two refreshes racing on
    /// the same token, only one gets its new token registered.
    #[instrument(skip_all, err)]
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let refresh_token = refresh_token.trim();
        if refresh_token.is_empty() {
            return Err(AuthError::RefreshTokenRequired);
        }

        let claims = self.tokens.verify_refresh_token(refresh_token)?;
        let user_id = claims.subject()?;
        if !self.refresh_tokens.valid(refresh_token, user_id) {
            tracing::warn!(user_id = %user_id, "refresh token is not the registered one");
            return Err(AuthError::RefreshTokenInvalid);
        }

        let identity = self
            .identities
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        let tokens = self.issue_pair(&identity)?;
        if !self
            .refresh_tokens
            .replace(refresh_token, &tokens.refresh_token, user_id)
        {
            tracing::warn!(user_id = %user_id, "refresh token was rotated concurrently");
            return Err(AuthError::RefreshTokenInvalid);
        }
        tracing::debug!(user_id = %user_id, "refresh token rotated");
        Ok(tokens)
    }

    /// Forget a refresh token. Unknown or blank tokens are ignored.
    pub fn logout(&self, refresh_token: &str) {
        let refresh_token = refresh_token.trim();
        if !refresh_token.is_empty() {
            self.refresh_tokens.remove(refresh_token);
            tracing::info!("refresh token revoked");
        }
    }

    /// Sorted, de-duplicated permission codes for the caller's roles.
    ///
    /// Falls back to the built-in table when the policy store errors or
    /// yields nothing.
    pub async fn access_codes(&self, principal: &Principal) -> Vec<String> {
        let mut codes = BTreeSet::new();

        match self.enforcer.get().await {
            Ok(enforcer) => {
                for role in principal.roles.iter().filter(|r| !r.is_blank()) {
                    match enforcer
                        .permissions_for_role_in_domain(role.as_str(), &principal.domain)
                        .await
                    {
                        Ok(rules) => codes.extend(
                            rules
                                .iter()
                                .filter_map(|r| r.field(2))
                                .filter(|c| !c.is_empty())
                                .map(str::to_string),
                        ),
                        Err(e) => tracing::warn!(role = %role, error = %e, "access code lookup failed"),
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "policy engine unavailable, using fallback access codes"),
        }

        if codes.is_empty() {
            for role in &principal.roles {
                codes.extend(fallback_access_codes(role).iter().map(|c| c.to_string()));
            }
        }
        codes.into_iter().collect()
    }

    fn issue_pair(&self, identity: &Identity) -> AuthResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.tokens.issue_access_token(identity)?,
            refresh_token: self.tokens.issue_refresh_token(identity)?,
        })
    }

    fn user_info(&self, identity: &Identity, roles: Vec<Role>) -> UserInfo {
        let home_path = match identity.home_path.trim() {
            "" => self.home_path.clone(),
            path => path.to_string(),
        };
        UserInfo {
            user_id: identity.id,
            tenant_id: identity.tenant_id,
            username: identity.username.clone(),
            real_name: identity.real_name.clone(),
            roles,
            home_path,
        }
    }
}
