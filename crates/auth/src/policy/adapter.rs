//! Durable persistence seam for policy rules.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::StorageError;

use super::rule::{MAX_FIELDS, PolicyRule};

/// Storage backend for policy rules.
///
/// Implementations do not deduplicate and never retry; every backend error
/// is returned unchanged.
#[async_trait]
pub trait PolicyAdapter: Send + Sync {
    /// Every stored rule. Rows with a blank type are skipped.
    async fn load_all(&self) -> Result<Vec<PolicyRule>, StorageError>;

    /// Replace the whole rule set atomically.
    async fn save_all(&self, rules: &[PolicyRule]) -> Result<(), StorageError>;

    async fn add_rule(&self, rule: &PolicyRule) -> Result<(), StorageError>;

    /// Delete rows matching the type and every supplied field positionally.
    async fn remove_rule(&self, rule: &PolicyRule) -> Result<(), StorageError>;

    /// Delete rows whose fields starting at `field_index` match `values`;
    /// blank values match anything.
    async fn remove_filtered(
        &self,
        ptype: &str,
        field_index: usize,
        values: &[String],
    ) -> Result<(), StorageError>;
}

#[async_trait]
impl<S> PolicyAdapter for Arc<S>
where
    S: PolicyAdapter + ?Sized,
{
    async fn load_all(&self) -> Result<Vec<PolicyRule>, StorageError> {
        (**self).load_all().await
    }

    async fn save_all(&self, rules: &[PolicyRule]) -> Result<(), StorageError> {
        (**self).save_all(rules).await
    }

    async fn add_rule(&self, rule: &PolicyRule) -> Result<(), StorageError> {
        (**self).add_rule(rule).await
    }

    async fn remove_rule(&self, rule: &PolicyRule) -> Result<(), StorageError> {
        (**self).remove_rule(rule).await
    }

    async fn remove_filtered(
        &self,
        ptype: &str,
        field_index: usize,
        values: &[String],
    ) -> Result<(), StorageError> {
        (**self).remove_filtered(ptype, field_index, values).await
    }
}

/// Reject rules that cannot be stored.
pub fn check_storable(operation: &'static str, rule: &PolicyRule) -> Result<(), StorageError> {
    if rule.ptype().is_empty() {
        return Err(StorageError::message(operation, "policy type must not be blank"));
    }
    if rule.fields().len() > MAX_FIELDS {
        return Err(StorageError::message(operation, "too many policy fields"));
    }
    Ok(())
}

/// True iff `row` matches `rule`'s type and each of its fields positionally.
pub fn row_matches(row: &PolicyRule, rule: &PolicyRule) -> bool {
    row.ptype() == rule.ptype()
        && rule
            .fields()
            .iter()
            .enumerate()
            .all(|(i, f)| row.field(i) == Some(f.as_str()))
}

/// Volatile adapter backed by a `Vec`; rows are kept in insertion order.
///
/// Writes can be made to fail on demand to exercise error paths.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    rows: Mutex<Vec<PolicyRule>>,
    fail_writes: Mutex<Option<String>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules<I: IntoIterator<Item = PolicyRule>>(rules: I) -> Self {
        let adapter = Self::new();
        if let Ok(mut rows) = adapter.rows.lock() {
            rows.extend(rules);
        }
        adapter
    }

    /// Make every subsequent write fail with `reason` (`None` to heal).
    pub fn fail_writes(&self, reason: Option<&str>) {
        if let Ok(mut slot) = self.fail_writes.lock() {
            *slot = reason.map(str::to_string);
        }
    }

    pub fn snapshot(&self) -> Vec<PolicyRule> {
        self.rows.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn write<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut Vec<PolicyRule>) -> T,
    ) -> Result<T, StorageError> {
        if let Some(reason) = self.fail_writes.lock().ok().and_then(|s| s.clone()) {
            return Err(StorageError::message(operation, reason));
        }
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| StorageError::message(operation, "lock poisoned"))?;
        Ok(f(&mut rows))
    }
}

#[async_trait]
impl PolicyAdapter for MemoryAdapter {
    async fn load_all(&self) -> Result<Vec<PolicyRule>, StorageError> {
        let rows = self
            .rows
            .lock()
            .map_err(|_| StorageError::message("load_all", "lock poisoned"))?;
        Ok(rows.iter().filter(|r| !r.ptype().is_empty()).cloned().collect())
    }

    async fn save_all(&self, rules: &[PolicyRule]) -> Result<(), StorageError> {
        for rule in rules {
            check_storable("save_all", rule)?;
        }
        self.write("save_all", |rows| {
            *rows = rules.to_vec();
        })
    }

    async fn add_rule(&self, rule: &PolicyRule) -> Result<(), StorageError> {
        check_storable("add_rule", rule)?;
        self.write("add_rule", |rows| rows.push(rule.clone()))
    }

    async fn remove_rule(&self, rule: &PolicyRule) -> Result<(), StorageError> {
        self.write("remove_rule", |rows| rows.retain(|row| !row_matches(row, rule)))
    }

    async fn remove_filtered(
        &self,
        ptype: &str,
        field_index: usize,
        values: &[String],
    ) -> Result<(), StorageError> {
        if field_index >= MAX_FIELDS {
            return Ok(());
        }
        self.write("remove_filtered", |rows| {
            rows.retain(|row| !row.matches_filter(ptype, field_index, values))
        })
    }
}
