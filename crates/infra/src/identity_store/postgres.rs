//! Postgres-backed identity lookup over the `sys_user` table.
//!
//! Soft-deleted accounts (`deleted_at IS NOT NULL`) are invisible. Columns
//! that may be NULL in older rows (`roles`, `real_name`, `home_path`) read as
//! empty strings.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use warden_auth::error::StorageError;
use warden_auth::identity::{Identity, IdentityStore};
use warden_core::{TenantId, UserId};

const SELECT_USER: &str = r#"
    SELECT id, tenant_id, username, password, roles, real_name, home_path
    FROM sys_user
    WHERE deleted_at IS NULL
"#;

#[derive(Debug, Clone)]
pub struct PostgresIdentityStore {
    pool: Arc<PgPool>,
}

impl PostgresIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the user table if it does not exist (dev/test bootstrap).
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sys_user (
                id UUID PRIMARY KEY,
                tenant_id UUID NOT NULL,
                username VARCHAR(128) NOT NULL UNIQUE,
                password VARCHAR(256) NOT NULL,
                roles TEXT,
                real_name VARCHAR(128),
                home_path VARCHAR(256),
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                deleted_at TIMESTAMP WITH TIME ZONE
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| StorageError::new("ensure_schema", e))?;
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for PostgresIdentityStore {
    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn find_by_id(&self, id: UserId) -> Result<Option<Identity>, StorageError> {
        let row = sqlx::query(&format!("{SELECT_USER} AND id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| StorageError::new("find_by_id", e))?;

        row.map(|r| UserRow::from_row(&r).map(Identity::from))
            .transpose()
            .map_err(|e| StorageError::new("find_by_id", e))
    }

    #[instrument(skip(self), err)]
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, StorageError> {
        let row = sqlx::query(&format!("{SELECT_USER} AND username = $1"))
            .bind(username)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| StorageError::new("find_by_username", e))?;

        row.map(|r| UserRow::from_row(&r).map(Identity::from))
            .transpose()
            .map_err(|e| StorageError::new("find_by_username", e))
    }
}

#[derive(Debug)]
struct UserRow {
    id: uuid::Uuid,
    tenant_id: uuid::Uuid,
    username: String,
    password: String,
    roles: Option<String>,
    real_name: Option<String>,
    home_path: Option<String>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for UserRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            username: row.try_get("username")?,
            password: row.try_get("password")?,
            roles: row.try_get("roles")?,
            real_name: row.try_get("real_name")?,
            home_path: row.try_get("home_path")?,
        })
    }
}

impl From<UserRow> for Identity {
    fn from(row: UserRow) -> Self {
        Identity {
            id: UserId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            username: row.username,
            password_hash: row.password,
            roles: row.roles.unwrap_or_default(),
            real_name: row.real_name.unwrap_or_default(),
            home_path: row.home_path.unwrap_or_default(),
        }
    }
}
