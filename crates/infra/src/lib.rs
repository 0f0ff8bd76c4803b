//! Infrastructure layer: configuration and Postgres-backed storage for the
//! authorization core.

pub mod config;
pub mod identity_store;
pub mod policy_store;

pub use config::{AppConfig, ConfigError, LogConfig, LogFormat};
pub use identity_store::{InMemoryIdentityStore, PostgresIdentityStore};
pub use policy_store::PostgresPolicyAdapter;
