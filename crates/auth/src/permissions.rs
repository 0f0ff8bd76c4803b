use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::roles::Role;

/// Scope used when a grant does not name one.
pub const ANY_SCOPE: &str = "*";

/// A client-facing permission code granted to a role (e.g. `System:Menu:List`).
///
/// Stored as the `p` rule `(role, domain, code, scope)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub code: Cow<'static, str>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl PermissionGrant {
    pub fn new(code: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code: code.into(),
            scope: None,
        }
    }

    pub fn scoped(code: impl Into<Cow<'static, str>>, scope: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            scope: Some(scope.into()),
        }
    }

    pub fn code(&self) -> &str {
        self.code.trim()
    }

    /// Blank or absent scope means every scope.
    pub fn scope(&self) -> &str {
        match self.scope.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => ANY_SCOPE,
        }
    }
}

/// Codes reported when the policy store yields nothing for a role.
pub fn fallback_access_codes(role: &Role) -> &'static [&'static str] {
    match role.as_str() {
        "super" => &[
            "System:Menu:List",
            "System:Menu:Create",
            "System:Menu:Edit",
            "System:Menu:Delete",
            "System:Dept:List",
            "System:Dept:Create",
            "System:Dept:Edit",
            "System:Dept:Delete",
        ],
        "admin" => &[
            "System:Menu:List",
            "System:Menu:Edit",
            "System:Dept:List",
            "System:Dept:Edit",
        ],
        "user" => &["System:Menu:List", "System:Dept:List"],
        "guest" => &["System:Menu:List"],
        _ => &[],
    }
}
