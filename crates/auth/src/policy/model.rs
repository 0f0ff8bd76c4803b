//! Access-control model sources.
//!
//! Models are casbin `.conf` files; the matcher they declare is the one
//! evaluated. The embedded model is domain-scoped RBAC with exact object and
//! action matching.

use std::path::PathBuf;

use casbin::DefaultModel;

use crate::error::{AuthError, AuthResult};

/// The model shipped with the binary.
pub const DEFAULT_MODEL: &str = include_str!("model.conf");

/// Where the model definition comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    Embedded,
    File(PathBuf),
    Inline(String),
}

impl ModelSource {
    /// `None` or a blank path selects the embedded model.
    pub fn from_config(path: Option<&str>) -> Self {
        match path.map(str::trim) {
            Some(p) if !p.is_empty() => Self::File(PathBuf::from(p)),
            _ => Self::Embedded,
        }
    }

    pub async fn load(&self) -> AuthResult<DefaultModel> {
        let loaded = match self {
            Self::Embedded => DefaultModel::from_str(DEFAULT_MODEL).await,
            Self::File(path) => DefaultModel::from_file(path).await,
            Self::Inline(text) => DefaultModel::from_str(text).await,
        };
        loaded.map_err(|e| AuthError::policy(format!("invalid policy model: {e}")))
    }
}
