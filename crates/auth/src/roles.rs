//! Role names and the canonical decoding of stored role lists.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Role identifier used for RBAC.
///
/// Opaque at this layer; the policy engine decides what a role grants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const SUPER: Role = Role(Cow::Borrowed("super"));
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));
    pub const USER: Role = Role(Cow::Borrowed("user"));
    pub const GUEST: Role = Role(Cow::Borrowed("guest"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decode a stored role list.
///
/// Precedence:
/// 1. blank input is an empty list;
/// 2. input starting with `[` must be a JSON array of strings, anything else
///    is `MalformedRoles`;
/// 3. input containing `,` is split on commas;
/// 4. otherwise the whole value is a single role.
///
/// Entries are trimmed and blank entries dropped in every branch.
pub fn decode_roles(raw: &str) -> AuthResult<Vec<Role>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let names: Vec<String> = if trimmed.starts_with('[') {
        serde_json::from_str::<Vec<String>>(trimmed)
            .map_err(|e| AuthError::MalformedRoles(e.to_string()))?
    } else if trimmed.contains(',') {
        trimmed.split(',').map(str::to_string).collect()
    } else {
        vec![trimmed.to_string()]
    };

    Ok(names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .map(Role::new)
        .collect())
}

/// Which role is privileged and which role a roleless user receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePolicy {
    pub super_role: Role,
    /// `None` leaves roleless users without any role.
    pub default_role: Option<Role>,
}

impl Default for RolePolicy {
    fn default() -> Self {
        Self {
            super_role: Role::SUPER,
            default_role: Some(Role::GUEST),
        }
    }
}

impl RolePolicy {
    pub fn new(super_role: impl Into<String>, default_role: impl Into<String>) -> Self {
        let super_role = super_role.into();
        let default_role = default_role.into();
        Self {
            super_role: if super_role.trim().is_empty() {
                Role::SUPER
            } else {
                Role::new(super_role.trim().to_string())
            },
            default_role: (!default_role.trim().is_empty())
                .then(|| Role::new(default_role.trim().to_string())),
        }
    }

    /// Decode `raw` and apply the default-role fallback for empty lists.
    pub fn resolve(&self, raw: &str) -> AuthResult<Vec<Role>> {
        let roles = decode_roles(raw)?;
        if roles.is_empty() {
            return Ok(self.default_role.iter().cloned().collect());
        }
        Ok(roles)
    }

    pub fn is_privileged(&self, roles: &[Role]) -> bool {
        roles.iter().any(|r| r == &self.super_role)
    }
}
