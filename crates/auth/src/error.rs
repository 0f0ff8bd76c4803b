//! Error taxonomy for the authorization & session core.

use std::sync::Arc;

use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Message carried by [`AuthError::Unauthorized`] when no role grants access.
pub const PERMISSION_DENIED: &str = "permission denied";

/// Opaque persistence failure, propagated verbatim from a storage backend.
///
/// Cheap to clone so that memoized initialization errors can be shared by
/// every caller that observes them.
#[derive(Debug, Clone, Error)]
#[error("{operation}: {source}")]
pub struct StorageError {
    operation: &'static str,
    #[source]
    source: Arc<dyn std::error::Error + Send + Sync>,
}

impl StorageError {
    pub fn new(
        operation: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            operation,
            source: Arc::new(source),
        }
    }

    /// Build a storage error from a plain message (used by in-memory backends).
    pub fn message(operation: &'static str, msg: impl Into<String>) -> Self {
        Self::new(operation, SimpleError(msg.into()))
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
struct SimpleError(String);

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("user not found")]
    UserNotFound,

    #[error("incorrect password")]
    IncorrectPassword,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("refresh token required")]
    RefreshTokenRequired,

    #[error("refresh token invalid")]
    RefreshTokenInvalid,

    #[error("signing secret missing: set {env} or the matching config key")]
    MissingSecret { env: String },

    #[error("malformed role list: {0}")]
    MalformedRoles(String),

    #[error("policy engine error: {0}")]
    Policy(String),

    #[error("cryptographic operation failed: {0}")]
    Crypto(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl AuthError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn policy(msg: impl Into<String>) -> Self {
        Self::Policy(msg.into())
    }

    pub fn permission_denied() -> Self {
        Self::Unauthorized(PERMISSION_DENIED.to_string())
    }

    /// Authenticated, but no role grants the requested action.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::Unauthorized(msg) if msg == PERMISSION_DENIED)
    }

    /// Stable numeric code exposed to clients.
    pub fn code(&self) -> u16 {
        match self {
            Self::UserNotFound => 1001,
            Self::IncorrectPassword => 1002,
            Self::Unauthorized(_) => 1003,
            Self::RefreshTokenRequired => 1004,
            Self::RefreshTokenInvalid => 1005,
            Self::MissingSecret { .. } => 1006,
            Self::MalformedRoles(_) => 1007,
            Self::Policy(_) => 1008,
            Self::Storage(_) => 1009,
            Self::Crypto(_) => 1010,
        }
    }

    /// Stable machine-readable slug.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::UserNotFound => "user_not_found",
            Self::IncorrectPassword => "incorrect_password",
            Self::Unauthorized(_) => "unauthorized",
            Self::RefreshTokenRequired => "refresh_token_required",
            Self::RefreshTokenInvalid => "refresh_token_invalid",
            Self::MissingSecret { .. } => "missing_secret",
            Self::MalformedRoles(_) => "malformed_roles",
            Self::Policy(_) => "policy_error",
            Self::Storage(_) => "storage_error",
            Self::Crypto(_) => "crypto_error",
        }
    }

    /// Failures caused by the caller's credentials rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UserNotFound
                | Self::IncorrectPassword
                | Self::Unauthorized(_)
                | Self::RefreshTokenRequired
                | Self::RefreshTokenInvalid
        )
    }
}
