//! Process-wide enforcer built on first use.
//!
//! Concurrent first callers wait for a single initialization attempt and all
//! share its outcome. A failed attempt is memoized too: the process keeps
//! returning that error until it is restarted.

use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::error::AuthResult;

use super::adapter::PolicyAdapter;
use super::enforcer::Enforcer;
use super::model::ModelSource;

pub struct LazyEnforcer {
    model: ModelSource,
    adapter: Arc<dyn PolicyAdapter>,
    cell: OnceCell<AuthResult<Arc<Enforcer>>>,
}

impl LazyEnforcer {
    pub fn new(model: ModelSource, adapter: Arc<dyn PolicyAdapter>) -> Self {
        Self {
            model,
            adapter,
            cell: OnceCell::new(),
        }
    }

    pub async fn get(&self) -> AuthResult<Arc<Enforcer>> {
        self.cell
            .get_or_init(|| async {
                let built = match self.model.load().await {
                    Ok(model) => Enforcer::new(model, self.adapter.clone()).await.map(Arc::new),
                    Err(e) => Err(e),
                };
                if let Err(e) = &built {
                    tracing::error!(error = %e, "policy enforcer initialization failed");
                }
                built
            })
            .await
            .clone()
    }

    /// Whether an initialization attempt has completed (successfully or not).
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

impl core::fmt::Debug for LazyEnforcer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LazyEnforcer")
            .field("model", &self.model)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
