//! Access/refresh token issuance and verification (HMAC-signed JWTs).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::claims::{AccessClaims, RefreshClaims, TimedClaims, validate_window};
use crate::error::{AuthError, AuthResult};
use crate::identity::Identity;
use crate::roles::RolePolicy;
use crate::secrets::{SecretProvider, SigningSecret};

/// Only the HMAC family is ever accepted.
const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTtl {
    pub access: Duration,
    pub refresh: Duration,
}

impl Default for TokenTtl {
    fn default() -> Self {
        Self {
            access: Duration::hours(72),
            refresh: Duration::days(30),
        }
    }
}

impl TokenTtl {
    pub fn from_secs(access_secs: i64, refresh_secs: i64) -> Self {
        Self {
            access: Duration::seconds(access_secs),
            refresh: Duration::seconds(refresh_secs),
        }
    }
}

/// Stateless token service; the only state it holds is the secret provider.
#[derive(Debug, Clone)]
pub struct TokenService {
    secrets: Arc<SecretProvider>,
    ttl: TokenTtl,
    roles: RolePolicy,
}

impl TokenService {
    pub fn new(secrets: Arc<SecretProvider>, ttl: TokenTtl, roles: RolePolicy) -> Self {
        Self { secrets, ttl, roles }
    }

    pub fn ttl(&self) -> TokenTtl {
        self.ttl
    }

    pub fn role_policy(&self) -> &RolePolicy {
        &self.roles
    }

    pub fn issue_access_token(&self, identity: &Identity) -> AuthResult<String> {
        self.issue_access_token_at(identity, Utc::now())
    }

    pub fn issue_access_token_at(&self, identity: &Identity, now: DateTime<Utc>) -> AuthResult<String> {
        let roles = self.roles.resolve(&identity.roles)?;
        let claims = AccessClaims {
            id: identity.id.to_string(),
            username: identity.username.clone(),
            tenant_id: identity.tenant_id.to_string(),
            is_super: self.roles.is_privileged(&roles),
            iat: now.timestamp(),
            exp: (now + self.ttl.access).timestamp(),
            jti: Uuid::now_v7().to_string(),
        };
        sign(&claims, &self.secrets.access_secret()?)
    }

    pub fn issue_refresh_token(&self, identity: &Identity) -> AuthResult<String> {
        self.issue_refresh_token_at(identity, Utc::now())
    }

    pub fn issue_refresh_token_at(&self, identity: &Identity, now: DateTime<Utc>) -> AuthResult<String> {
        let claims = RefreshClaims {
            id: identity.id.to_string(),
            username: identity.username.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl.refresh).timestamp(),
            jti: Uuid::now_v7().to_string(),
        };
        sign(&claims, &self.secrets.refresh_secret()?)
    }

    pub fn verify_access_token(&self, token: &str) -> AuthResult<AccessClaims> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::unauthorized("missing token"));
        }
        verify(token, &self.secrets.access_secret()?)
    }

    /// Same checks as access verification; an empty token is `RefreshTokenRequired`.
    pub fn verify_refresh_token(&self, token: &str) -> AuthResult<RefreshClaims> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::RefreshTokenRequired);
        }
        verify(token, &self.secrets.refresh_secret()?)
    }
}

fn sign<C: Serialize>(claims: &C, secret: &SigningSecret) -> AuthResult<String> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::Crypto(format!("token signing failed: {e}")))
}

fn verify<C>(token: &str, secret: &SigningSecret) -> AuthResult<C>
where
    C: DeserializeOwned + TimedClaims,
{
    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
    validation.leeway = 0;
    validation.validate_exp = true;

    let data = decode::<C>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::unauthorized("token expired"),
            ErrorKind::InvalidSignature => AuthError::unauthorized("invalid token signature"),
            ErrorKind::InvalidAlgorithm => AuthError::unauthorized("unexpected signing algorithm"),
            _ => AuthError::unauthorized(format!("invalid token: {e}")),
        })?;

    validate_window(&data.claims, Utc::now()).map_err(|e| AuthError::unauthorized(e.to_string()))?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{TenantId, UserId};

    fn service() -> TokenService {
        TokenService::new(
            Arc::new(SecretProvider::fixed("access-secret", "refresh-secret")),
            TokenTtl::default(),
            RolePolicy::default(),
        )
    }

    fn identity(roles: &str) -> Identity {
        Identity {
            id: UserId::new(),
            tenant_id: TenantId::new(),
            username: "ada".into(),
            password_hash: String::new(),
            roles: roles.into(),
            real_name: "Ada".into(),
            home_path: String::new(),
        }
    }

    fn forge<C: Serialize>(alg: Algorithm, claims: &C, secret: &str) -> String {
        encode(&Header::new(alg), claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn access_token_round_trips_identity_claims() {
        let svc = service();
        let user = identity(r#"["admin"]"#);

        let token = svc.issue_access_token(&user).unwrap();
        let claims = svc.verify_access_token(&token).unwrap();

        assert_eq!(claims.subject().unwrap(), user.id);
        assert_eq!(claims.username, "ada");
        assert_eq!(claims.tenant().unwrap(), Some(user.tenant_id));
        assert!(!claims.is_super);
        assert_eq!(claims.exp - claims.iat, 72 * 3600);
    }

    #[test]
    fn super_role_sets_privileged_flag() {
        let svc = service();
        let token = svc.issue_access_token(&identity("admin,super")).unwrap();
        assert!(svc.verify_access_token(&token).unwrap().is_super);
    }

    #[test]
    fn refresh_token_uses_its_own_secret() {
        let svc = service();
        let user = identity("user");
        let refresh = svc.issue_refresh_token(&user).unwrap();

        assert!(svc.verify_refresh_token(&refresh).is_ok());
        assert!(matches!(svc.verify_access_token(&refresh), Err(AuthError::Unauthorized(_))));
    }

    #[test]
    fn rotation_yields_distinct_tokens_within_one_second() {
        let svc = service();
        let user = identity("user");
        let now = Utc::now();
        let a = svc.issue_refresh_token_at(&user, now).unwrap();
        let b = svc.issue_refresh_token_at(&user, now).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_tokens_have_distinct_errors() {
        let svc = service();
        assert!(matches!(svc.verify_access_token("  "), Err(AuthError::Unauthorized(_))));
        assert!(matches!(svc.verify_refresh_token(""), Err(AuthError::RefreshTokenRequired)));
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let svc = service();
        let user = identity("user");
        let past = Utc::now() - Duration::hours(73);
        let token = svc.issue_access_token_at(&user, past).unwrap();

        match svc.verify_access_token(&token) {
            Err(AuthError::Unauthorized(msg)) => assert_eq!(msg, "token expired"),
            other => panic!("expected expiry failure, got {other:?}"),
        }
    }

    #[test]
    fn other_hmac_variants_are_accepted() {
        let svc = service();
        let now = Utc::now().timestamp();
        let claims = RefreshClaims {
            id: UserId::new().to_string(),
            username: "ada".into(),
            iat: now,
            exp: now + 60,
            jti: String::new(),
        };
        let token = forge(Algorithm::HS512, &claims, "refresh-secret");
        assert_eq!(svc.verify_refresh_token(&token).unwrap(), claims);
    }

    #[test]
    fn unsigned_and_tampered_tokens_are_rejected() {
        let svc = service();
        let token = svc.issue_access_token(&identity("user")).unwrap();
        let mut parts = token.split('.');
        let (header, payload) = (parts.next().unwrap(), parts.next().unwrap());

        // {"alg":"none","typ":"JWT"}
        let unsigned = format!("eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.{payload}.");
        assert!(matches!(svc.verify_access_token(&unsigned), Err(AuthError::Unauthorized(_))));

        let wrong_key = forge(
            Algorithm::HS256,
            &svc.verify_access_token(&token).unwrap(),
            "someone-elses-secret",
        );
        assert!(matches!(svc.verify_access_token(&wrong_key), Err(AuthError::Unauthorized(_))));

        let truncated = format!("{header}.{payload}");
        assert!(svc.verify_access_token(&truncated).is_err());
        assert!(svc.verify_access_token("garbage").is_err());
    }

    #[test]
    fn missing_secret_surfaces_on_issue() {
        let svc = TokenService::new(
            Arc::new(SecretProvider::with_env_reader(
                Arc::new(std::collections::HashMap::new()),
                Arc::new(|_| None),
            )),
            TokenTtl::default(),
            RolePolicy::default(),
        );
        assert!(matches!(
            svc.issue_access_token(&identity("user")),
            Err(AuthError::MissingSecret { .. })
        ));
    }
}
