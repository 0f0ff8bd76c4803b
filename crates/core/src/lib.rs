//! `warden-core` - identifiers and tenant-domain primitives shared by every
//! other crate in the workspace.
//!
//! This crate has no I/O and no knowledge of tokens or policies.

pub mod domain;
pub mod error;
pub mod id;

pub use domain::AuthzDomain;
pub use error::DomainError;
pub use id::{TenantId, UserId};
