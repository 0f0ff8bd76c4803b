//! Authorization domains: the tenant-scoped namespace policy rules live in.

use serde::{Deserialize, Serialize};

use crate::id::TenantId;

/// A non-empty policy domain.
///
/// Rules are never evaluated against an empty domain: blank input collapses
/// to [`AuthzDomain::DEFAULT`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthzDomain(String);

impl AuthzDomain {
    pub const DEFAULT: &'static str = "default";

    /// Normalize a raw domain string (trimmed; blank becomes `"default"`).
    pub fn normalize(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self(Self::DEFAULT.to_string())
        } else {
            Self(trimmed.to_string())
        }
    }

    pub fn for_tenant(tenant_id: TenantId) -> Self {
        Self(tenant_id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        self.0 == Self::DEFAULT
    }
}

impl Default for AuthzDomain {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl From<TenantId> for AuthzDomain {
    fn from(value: TenantId) -> Self {
        Self::for_tenant(value)
    }
}

impl AsRef<str> for AuthzDomain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for AuthzDomain {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
