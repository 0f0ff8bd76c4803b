use serde::Serialize;

use warden_core::{AuthzDomain, TenantId, UserId};

use crate::roles::Role;

/// The authenticated, authorized caller of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: UserId,
    pub username: String,
    /// Tenant the request acts in (may differ from the home tenant for
    /// privileged callers using an override).
    pub tenant_id: TenantId,
    pub domain: AuthzDomain,
    pub roles: Vec<Role>,
    pub privileged: bool,
}

impl Principal {
    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}
