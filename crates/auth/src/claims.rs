//! Typed token claims.
//!
//! Wire names follow the JSON the web client already consumes (`tenantId`,
//! `isSuper`). Identifier claims are accepted as strings or numbers and
//! normalized to strings here, so nothing past verification ever handles an
//! untyped claim map.

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use warden_core::{TenantId, UserId};

use crate::error::{AuthError, AuthResult};

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub username: String,

    #[serde(rename = "tenantId", default, deserialize_with = "lenient_string")]
    pub tenant_id: String,

    #[serde(rename = "isSuper", default)]
    pub is_super: bool,

    #[serde(default)]
    pub iat: i64,

    pub exp: i64,

    #[serde(default)]
    pub jti: String,
}

/// Claims carried by a refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub username: String,

    #[serde(default)]
    pub iat: i64,

    pub exp: i64,

    #[serde(default)]
    pub jti: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

/// Issued-at / expiry pair shared by both token kinds.
pub trait TimedClaims {
    fn issued_at(&self) -> i64;
    fn expires_at(&self) -> i64;
}

impl TimedClaims for AccessClaims {
    fn issued_at(&self) -> i64 {
        self.iat
    }
    fn expires_at(&self) -> i64 {
        self.exp
    }
}

impl TimedClaims for RefreshClaims {
    fn issued_at(&self) -> i64 {
        self.iat
    }
    fn expires_at(&self) -> i64 {
        self.exp
    }
}

/// Deterministic time-window check applied after signature verification.
///
/// A missing `iat` (zero) only skips the window-shape check.
pub fn validate_window<C: TimedClaims>(claims: &C, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let iat = claims.issued_at();
    let exp = claims.expires_at();
    if iat != 0 && exp <= iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now.timestamp() >= exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

fn parse_subject(raw: &str) -> AuthResult<UserId> {
    match UserId::parse_optional(raw) {
        Ok(Some(id)) => Ok(id),
        Ok(None) => Err(AuthError::unauthorized("invalid token subject")),
        Err(e) => Err(AuthError::unauthorized(format!("invalid token subject: {e}"))),
    }
}

impl AccessClaims {
    /// Subject user id; blank or malformed is `Unauthorized`.
    pub fn subject(&self) -> AuthResult<UserId> {
        parse_subject(&self.id)
    }

    /// Tenant carried by the token, if any.
    pub fn tenant(&self) -> AuthResult<Option<TenantId>> {
        TenantId::parse_optional(&self.tenant_id)
            .map_err(|e| AuthError::unauthorized(format!("invalid tenant claim: {e}")))
    }
}

impl RefreshClaims {
    pub fn subject(&self) -> AuthResult<UserId> {
        parse_subject(&self.id)
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(D::Error::custom(format!(
            "expected a string or number claim, found {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn access(iat: i64, exp: i64) -> AccessClaims {
        AccessClaims {
            id: UserId::new().to_string(),
            username: "ada".into(),
            tenant_id: String::new(),
            is_super: false,
            iat,
            exp,
            jti: String::new(),
        }
    }

    #[test]
    fn numeric_identifier_claims_become_strings() {
        let claims: AccessClaims = serde_json::from_value(serde_json::json!({
            "id": 42,
            "username": "ada",
            "tenantId": null,
            "isSuper": true,
            "exp": 10,
        }))
        .unwrap();

        assert_eq!(claims.id, "42");
        assert_eq!(claims.tenant_id, "");
        assert!(claims.is_super);
        assert_eq!(claims.iat, 0);
    }

    #[test]
    fn object_identifier_claim_is_rejected() {
        let result: Result<RefreshClaims, _> = serde_json::from_value(serde_json::json!({
            "id": {"nested": true},
            "exp": 10,
        }));
        assert!(result.is_err());
    }

    #[test]
    fn blank_subject_is_unauthorized() {
        let mut claims = access(0, 10);
        claims.id = "  ".into();
        assert!(matches!(claims.subject(), Err(AuthError::Unauthorized(m)) if m == "invalid token subject"));
    }

    #[test]
    fn blank_tenant_is_absent() {
        let claims = access(0, 10);
        assert_eq!(claims.tenant().unwrap(), None);
    }

    #[test]
    fn wire_names_are_camel_case() {
        let json = serde_json::to_value(access(1, 2)).unwrap();
        assert!(json.get("tenantId").is_some());
        assert!(json.get("isSuper").is_some());
    }

    #[test]
    fn window_rejects_expired_and_inverted() {
        let now = Utc::now();
        let ts = now.timestamp();

        assert_eq!(validate_window(&access(ts - 10, ts + 10), now), Ok(()));
        assert_eq!(
            validate_window(&access(ts - 10, ts), now),
            Err(TokenValidationError::Expired)
        );
        assert_eq!(
            validate_window(&access(ts, ts), now + Duration::seconds(-5)),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }
}
