//! Policy enforcer: a casbin enforcer bound to a [`PolicyAdapter`].
//!
//! Reads (`enforce`, queries) share the lock; every write holds it
//! exclusively for its whole duration. With auto-save on, casbin writes the
//! adapter first and only touches the in-memory model after storage
//! succeeded, so a failed write leaves memory unchanged.

use std::collections::BTreeSet;
use std::sync::Arc;

use casbin::error::AdapterError;
use casbin::{CoreApi, DefaultModel, MgmtApi};
use tokio::sync::RwLock;
use tracing::instrument;

use warden_core::AuthzDomain;

use crate::error::{AuthError, AuthResult, StorageError};
use crate::permissions::PermissionGrant;

use super::adapter::PolicyAdapter;
use super::rule::{GRANT, GROUPING, MAX_FIELDS, PolicyRule};
use super::store_adapter::StoreAdapter;

pub struct Enforcer {
    inner: RwLock<casbin::Enforcer>,
}

impl core::fmt::Debug for Enforcer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Enforcer").finish_non_exhaustive()
    }
}

/// Storage failures keep their identity; everything else is a policy error.
fn casbin_error(e: casbin::Error) -> AuthError {
    match e {
        casbin::Error::AdapterError(AdapterError(source)) => match source.downcast::<StorageError>() {
            Ok(storage) => AuthError::Storage(*storage),
            Err(other) => AuthError::policy(other.to_string()),
        },
        other => AuthError::policy(other.to_string()),
    }
}

fn to_rules(ptype: &str, rows: Vec<Vec<String>>) -> Vec<PolicyRule> {
    rows.into_iter().map(|fields| PolicyRule::new(ptype, fields)).collect()
}

impl Enforcer {
    /// Build the enforcer and load every stored rule.
    #[instrument(skip_all, err)]
    pub async fn new(model: DefaultModel, adapter: Arc<dyn PolicyAdapter>) -> AuthResult<Self> {
        let mut inner = casbin::Enforcer::new(model, StoreAdapter::new(adapter))
            .await
            .map_err(casbin_error)?;
        inner.enable_auto_save(true);
        Ok(Self {
            inner: RwLock::new(inner),
        })
    }

    /// With auto-save off, mutations only touch memory until `save_policy`.
    pub fn with_auto_save(mut self, enabled: bool) -> Self {
        self.inner.get_mut().enable_auto_save(enabled);
        self
    }

    /// Is `sub` (a role) allowed to perform `act` on `obj` in `dom`?
    pub async fn enforce(&self, sub: &str, dom: &AuthzDomain, obj: &str, act: &str) -> AuthResult<bool> {
        self.inner
            .read()
            .await
            .enforce((sub, dom.as_str(), obj, act))
            .map_err(casbin_error)
    }

    /// Direct grants of `role` in `dom`, sorted.
    pub async fn permissions_for_role_in_domain(
        &self,
        role: &str,
        dom: &AuthzDomain,
    ) -> AuthResult<Vec<PolicyRule>> {
        let rows = self
            .inner
            .read()
            .await
            .get_filtered_policy(0, vec![role.to_string(), dom.as_str().to_string()]);
        let mut rules = to_rules(GRANT, rows);
        rules.sort();
        Ok(rules)
    }

    pub async fn has_policy(&self, rule: &PolicyRule) -> AuthResult<bool> {
        let inner = self.inner.read().await;
        let fields = rule.fields().to_vec();
        Ok(if rule.section() == GROUPING {
            inner.has_grouping_named_policy(rule.ptype(), fields)
        } else {
            inner.has_named_policy(rule.ptype(), fields)
        })
    }

    /// Every `p` and `g` rule currently in memory.
    pub async fn rules(&self) -> AuthResult<Vec<PolicyRule>> {
        let inner = self.inner.read().await;
        let mut rules = to_rules(GRANT, inner.get_policy());
        rules.extend(to_rules(GROUPING, inner.get_grouping_policy()));
        Ok(rules)
    }

    /// Returns `false` (and writes nothing) if the rule already exists.
    #[instrument(skip_all, fields(rule = %rule), err)]
    pub async fn add_policy(&self, rule: PolicyRule) -> AuthResult<bool> {
        let mut inner = self.inner.write().await;
        let ptype = rule.ptype();
        let fields = rule.fields().to_vec();
        let added = if rule.section() == GROUPING {
            if inner.has_grouping_named_policy(ptype, fields.clone()) {
                return Ok(false);
            }
            inner.add_named_grouping_policy(ptype, fields).await
        } else {
            if inner.has_named_policy(ptype, fields.clone()) {
                return Ok(false);
            }
            inner.add_named_policy(ptype, fields).await
        };
        added.map_err(casbin_error)
    }

    #[instrument(skip_all, fields(rule = %rule), err)]
    pub async fn remove_policy(&self, rule: &PolicyRule) -> AuthResult<bool> {
        let mut inner = self.inner.write().await;
        let ptype = rule.ptype();
        let fields = rule.fields().to_vec();
        let removed = if rule.section() == GROUPING {
            if !inner.has_grouping_named_policy(ptype, fields.clone()) {
                return Ok(false);
            }
            inner.remove_named_grouping_policy(ptype, fields).await
        } else {
            if !inner.has_named_policy(ptype, fields.clone()) {
                return Ok(false);
            }
            inner.remove_named_policy(ptype, fields).await
        };
        removed.map_err(casbin_error)
    }

    /// Remove every `ptype` rule whose fields from `field_index` match `values`.
    #[instrument(skip(self), err)]
    pub async fn remove_filtered_policy(
        &self,
        ptype: &str,
        field_index: usize,
        values: &[String],
    ) -> AuthResult<bool> {
        if field_index >= MAX_FIELDS {
            return Ok(false);
        }
        let mut inner = self.inner.write().await;
        remove_filtered(&mut inner, ptype, field_index, values.to_vec())
            .await
            .map_err(casbin_error)
    }

    pub async fn add_grouping_policy(&self, subject: &str, role: &str, dom: &AuthzDomain) -> AuthResult<bool> {
        self.add_policy(PolicyRule::grouping(subject, role, dom.as_str())).await
    }

    pub async fn remove_grouping_policy(&self, subject: &str, role: &str, dom: &AuthzDomain) -> AuthResult<bool> {
        self.remove_policy(&PolicyRule::grouping(subject, role, dom.as_str())).await
    }

    /// Discard memory and reload every rule from storage.
    #[instrument(skip(self), err)]
    pub async fn load_policy(&self) -> AuthResult<()> {
        self.inner.write().await.load_policy().await.map_err(casbin_error)
    }

    /// Persist the in-memory rule set, replacing storage wholesale.
    #[instrument(skip(self), err)]
    pub async fn save_policy(&self) -> AuthResult<()> {
        self.inner.write().await.save_policy().await.map_err(casbin_error)
    }

    /// Make `grants` the complete permission set of `role` in `dom`.
    ///
    /// Duplicate and blank codes are dropped. Readers see either the old or
    /// the new grant set, never a mix.
    #[instrument(skip(self, grants), fields(grant_count = grants.len()), err)]
    pub async fn sync_role_policies(
        &self,
        role: &str,
        dom: &AuthzDomain,
        grants: &[PermissionGrant],
    ) -> AuthResult<()> {
        let role = role.trim();
        if role.is_empty() {
            return Err(AuthError::policy("role must not be blank"));
        }

        let rules: BTreeSet<Vec<String>> = grants
            .iter()
            .filter(|g| !g.code().is_empty())
            .map(|g| PolicyRule::grant(role, dom.as_str(), g.code(), g.scope()).fields().to_vec())
            .collect();

        let mut inner = self.inner.write().await;
        let filter = vec![role.to_string(), dom.as_str().to_string()];
        if let Err(e) = replace_grants(&mut inner, filter, rules.into_iter().collect()).await {
            // Storage may hold a partial result; resync memory from it.
            tracing::error!(role, domain = %dom, error = %e, "role policy sync failed");
            if let Err(reload) = inner.load_policy().await {
                tracing::error!(error = %reload, "policy reload after failed sync failed");
            }
            return Err(casbin_error(e));
        }
        Ok(())
    }

    /// Drop every grant and membership of `role` in `dom`.
    #[instrument(skip(self), err)]
    pub async fn remove_role_policies(&self, role: &str, dom: &AuthzDomain) -> AuthResult<()> {
        let filter = vec![role.trim().to_string(), dom.as_str().to_string()];
        let mut inner = self.inner.write().await;
        remove_filtered(&mut inner, GRANT, 0, filter.clone())
            .await
            .map_err(casbin_error)?;
        remove_filtered(&mut inner, GROUPING, 1, filter)
            .await
            .map_err(casbin_error)?;
        Ok(())
    }
}

async fn remove_filtered(
    inner: &mut casbin::Enforcer,
    ptype: &str,
    field_index: usize,
    values: Vec<String>,
) -> casbin::Result<bool> {
    if ptype.starts_with(GROUPING) {
        inner
            .remove_filtered_named_grouping_policy(ptype, field_index, values)
            .await
    } else {
        inner.remove_filtered_named_policy(ptype, field_index, values).await
    }
}

async fn replace_grants(
    inner: &mut casbin::Enforcer,
    filter: Vec<String>,
    rules: Vec<Vec<String>>,
) -> casbin::Result<()> {
    inner.remove_filtered_named_policy(GRANT, 0, filter).await?;
    if !rules.is_empty() {
        inner.add_named_policies(GRANT, rules).await?;
    }
    Ok(())
}
