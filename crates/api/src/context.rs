use warden_auth::{Principal, Role};
use warden_core::{AuthzDomain, TenantId, UserId};

/// Tenant context for a request.
///
/// Present on every request that passed the authorization middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
    domain: AuthzDomain,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId, domain: AuthzDomain) -> Self {
        Self { tenant_id, domain }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn domain(&self) -> &AuthzDomain {
        &self.domain
    }
}

/// Principal context for a request (authenticated identity + roles).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn user_id(&self) -> UserId {
        self.principal.user_id
    }

    pub fn username(&self) -> &str {
        &self.principal.username
    }

    pub fn roles(&self) -> &[Role] {
        &self.principal.roles
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}
