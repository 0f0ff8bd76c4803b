//! Domain-scoped RBAC policy: rules, casbin model and enforcer, storage seam.

pub mod adapter;
pub mod enforcer;
pub mod lazy;
pub mod model;
pub mod rule;
pub mod store_adapter;

pub use adapter::{MemoryAdapter, PolicyAdapter};
pub use enforcer::Enforcer;
pub use lazy::LazyEnforcer;
pub use model::ModelSource;
pub use rule::PolicyRule;
pub use store_adapter::StoreAdapter;
