//! Postgres-backed policy adapter.
//!
//! Rules live in one `casbin_rule` table: a rule type plus up to six
//! positional string columns. Unused columns hold the empty string and are
//! dropped again on load.
//!
//! ## Error Mapping
//!
//! Every SQLx error is wrapped in a [`StorageError`] tagged with the adapter
//! operation and returned as is. There are no retries.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::instrument;

use warden_auth::error::StorageError;
use warden_auth::policy::PolicyAdapter;
use warden_auth::policy::adapter::check_storable;
use warden_auth::policy::rule::{MAX_FIELDS, PolicyRule};

const COLUMNS: [&str; MAX_FIELDS] = ["v0", "v1", "v2", "v3", "v4", "v5"];

/// Rows per bulk INSERT; keeps each statement well under the bind limit.
const INSERT_CHUNK: usize = 1000;

#[derive(Debug, Clone)]
pub struct PostgresPolicyAdapter {
    pool: Arc<PgPool>,
}

impl PostgresPolicyAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the rule table if it does not exist.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS casbin_rule (
                id BIGSERIAL PRIMARY KEY,
                ptype VARCHAR(32) NOT NULL DEFAULT '',
                v0 VARCHAR(256) NOT NULL DEFAULT '',
                v1 VARCHAR(256) NOT NULL DEFAULT '',
                v2 VARCHAR(256) NOT NULL DEFAULT '',
                v3 VARCHAR(256) NOT NULL DEFAULT '',
                v4 VARCHAR(256) NOT NULL DEFAULT '',
                v5 VARCHAR(256) NOT NULL DEFAULT ''
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_casbin_rule_ptype_v0_v1 ON casbin_rule (ptype, v0, v1)",
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        Ok(())
    }
}

#[async_trait]
impl PolicyAdapter for PostgresPolicyAdapter {
    #[instrument(skip(self), err)]
    async fn load_all(&self) -> Result<Vec<PolicyRule>, StorageError> {
        let rows = sqlx::query(
            "SELECT ptype, v0, v1, v2, v3, v4, v5 FROM casbin_rule ORDER BY id ASC",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_all", e))?;

        let mut rules = Vec::with_capacity(rows.len());
        for row in rows {
            let ptype: String = row
                .try_get("ptype")
                .map_err(|e| map_sqlx_error("load_all", e))?;
            let mut columns = Vec::with_capacity(MAX_FIELDS);
            for column in COLUMNS {
                let value: Option<String> = row
                    .try_get(column)
                    .map_err(|e| map_sqlx_error("load_all", e))?;
                columns.push(value);
            }
            if let Some(rule) = PolicyRule::from_row(&ptype, &columns) {
                rules.push(rule);
            }
        }

        tracing::debug!(rule_count = rules.len(), "policy rules loaded");
        Ok(rules)
    }

    #[instrument(skip(self, rules), fields(rule_count = rules.len()), err)]
    async fn save_all(&self, rules: &[PolicyRule]) -> Result<(), StorageError> {
        for rule in rules {
            check_storable("save_all", rule)?;
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("save_all", e))?;

        sqlx::query("DELETE FROM casbin_rule")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("save_all", e))?;

        for chunk in rules.chunks(INSERT_CHUNK) {
            insert_rules(chunk)
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("save_all", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("save_all", e))?;
        Ok(())
    }

    #[instrument(skip_all, fields(rule = %rule), err)]
    async fn add_rule(&self, rule: &PolicyRule) -> Result<(), StorageError> {
        check_storable("add_rule", rule)?;
        insert_rules(std::slice::from_ref(rule))
            .build()
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("add_rule", e))?;
        Ok(())
    }

    #[instrument(skip_all, fields(rule = %rule), err)]
    async fn remove_rule(&self, rule: &PolicyRule) -> Result<(), StorageError> {
        let result = delete_matching(rule)
            .build()
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("remove_rule", e))?;
        tracing::debug!(rows = result.rows_affected(), "policy rule removed");
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn remove_filtered(
        &self,
        ptype: &str,
        field_index: usize,
        values: &[String],
    ) -> Result<(), StorageError> {
        let Some(mut builder) = delete_filtered(ptype, field_index, values) else {
            return Ok(());
        };
        let result = builder
            .build()
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("remove_filtered", e))?;
        tracing::debug!(rows = result.rows_affected(), "filtered policy rules removed");
        Ok(())
    }
}

fn insert_rules(rules: &[PolicyRule]) -> QueryBuilder<'static, Postgres> {
    let mut builder =
        QueryBuilder::new("INSERT INTO casbin_rule (ptype, v0, v1, v2, v3, v4, v5) ");
    builder.push_values(rules, |mut row, rule| {
        row.push_bind(rule.ptype().to_string());
        for value in rule.columns() {
            row.push_bind(value.unwrap_or_default().to_string());
        }
    });
    builder
}

fn delete_matching(rule: &PolicyRule) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("DELETE FROM casbin_rule WHERE ptype = ");
    builder.push_bind(rule.ptype().to_string());
    for (column, value) in COLUMNS.iter().zip(rule.fields()) {
        builder.push(format!(" AND {column} = "));
        builder.push_bind(value.clone());
    }
    builder
}

/// `None` when `field_index` is past the last column.
fn delete_filtered(
    ptype: &str,
    field_index: usize,
    values: &[String],
) -> Option<QueryBuilder<'static, Postgres>> {
    if field_index >= MAX_FIELDS {
        return None;
    }
    let mut builder = QueryBuilder::new("DELETE FROM casbin_rule WHERE ptype = ");
    builder.push_bind(ptype.trim().to_string());
    for (column, value) in COLUMNS[field_index..].iter().zip(values) {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        builder.push(format!(" AND {column} = "));
        builder.push_bind(value.to_string());
    }
    Some(builder)
}

fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StorageError {
    match &err {
        sqlx::Error::Database(db_err) => {
            tracing::warn!(operation, code = ?db_err.code(), "policy store database error");
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            tracing::warn!(operation, "policy store connection unavailable");
        }
        _ => {}
    }
    StorageError::new(operation, err)
}
