//! `warden-auth` - authorization & session core.
//!
//! Token issuance and rotation, per-request RBAC decisions scoped by tenant
//! domain, and the policy/identity state those decisions read. Decoupled from
//! HTTP; storage is reached only through the [`IdentityStore`] and
//! [`PolicyAdapter`] traits.

pub mod authorize;
pub mod claims;
pub mod error;
pub mod identity;
pub mod identity_cache;
pub mod password;
pub mod permissions;
pub mod policy;
pub mod principal;
pub mod refresh_store;
pub mod roles;
pub mod secrets;
pub mod session;
pub mod token;

#[cfg(test)]
pub(crate) mod testing;

pub use authorize::{AuthzRequest, Authorizer, Decision, TENANT_OVERRIDE_HEADER, extract_bearer};
pub use claims::{AccessClaims, RefreshClaims, TokenValidationError};
pub use error::{AuthError, AuthResult, StorageError};
pub use identity::{Identity, IdentityStore};
pub use identity_cache::{CachedIdentity, IdentityCache};
pub use password::{hash_password, verify_password};
pub use permissions::PermissionGrant;
pub use policy::{Enforcer, LazyEnforcer, MemoryAdapter, ModelSource, PolicyAdapter, PolicyRule};
pub use principal::Principal;
pub use refresh_store::{InMemoryRefreshTokenStore, RefreshTokenStore};
pub use roles::{Role, RolePolicy, decode_roles};
pub use secrets::{ConfigLookup, SecretProvider, SigningSecret};
pub use session::{LoginOutcome, SessionService, TokenPair, UserInfo};
pub use token::{TokenService, TokenTtl};
