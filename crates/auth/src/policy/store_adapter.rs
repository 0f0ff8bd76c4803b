//! casbin `Adapter` over a [`PolicyAdapter`] backend.

use std::sync::Arc;

use async_trait::async_trait;
use casbin::error::AdapterError;
use casbin::{Adapter, Filter, Model};

use crate::error::StorageError;

use super::adapter::PolicyAdapter;
use super::rule::{GRANT, GROUPING, PolicyRule};

pub struct StoreAdapter {
    store: Arc<dyn PolicyAdapter>,
    filtered: bool,
}

impl StoreAdapter {
    pub fn new(store: Arc<dyn PolicyAdapter>) -> Self {
        Self {
            store,
            filtered: false,
        }
    }
}

fn adapter_error(e: StorageError) -> casbin::Error {
    casbin::Error::from(AdapterError(Box::new(e)))
}

fn load_rule(m: &mut dyn Model, rule: PolicyRule) {
    let sec = rule.section();
    let ptype = rule.ptype().to_string();
    if !m.add_policy(sec, &ptype, rule.fields().to_vec()) {
        tracing::debug!(rule = %rule, "stored rule not loaded into model");
    }
}

fn model_rules(m: &dyn Model) -> Vec<PolicyRule> {
    let mut rules = Vec::new();
    for sec in [GRANT, GROUPING] {
        let Some(assertions) = m.get_model().get(sec) else {
            continue;
        };
        let mut ptypes: Vec<&String> = assertions.keys().collect();
        ptypes.sort();
        for ptype in ptypes {
            rules.extend(
                m.get_policy(sec, ptype)
                    .into_iter()
                    .map(|fields| PolicyRule::new(ptype.as_str(), fields)),
            );
        }
    }
    rules
}

/// Blank filter values match anything.
fn passes(rule: &PolicyRule, filter: &[&str]) -> bool {
    filter
        .iter()
        .enumerate()
        .all(|(i, v)| v.trim().is_empty() || rule.field(i) == Some(v.trim()))
}

#[async_trait]
impl Adapter for StoreAdapter {
    async fn load_policy(&mut self, m: &mut dyn Model) -> casbin::Result<()> {
        let rules = self.store.load_all().await.map_err(adapter_error)?;
        tracing::info!(rules = rules.len(), "policy rules loaded");
        for rule in rules {
            load_rule(m, rule);
        }
        self.filtered = false;
        Ok(())
    }

    async fn load_filtered_policy<'a>(&mut self, m: &mut dyn Model, f: Filter<'a>) -> casbin::Result<()> {
        let rules = self.store.load_all().await.map_err(adapter_error)?;
        for rule in rules {
            let filter = if rule.section() == GROUPING { &f.g } else { &f.p };
            if passes(&rule, filter) {
                load_rule(m, rule);
            }
        }
        self.filtered = true;
        Ok(())
    }

    async fn save_policy(&mut self, m: &mut dyn Model) -> casbin::Result<()> {
        let rules = model_rules(m);
        self.store.save_all(&rules).await.map_err(adapter_error)
    }

    async fn clear_policy(&mut self) -> casbin::Result<()> {
        self.store.save_all(&[]).await.map_err(adapter_error)
    }

    fn is_filtered(&self) -> bool {
        self.filtered
    }

    async fn add_policy(&mut self, _sec: &str, ptype: &str, rule: Vec<String>) -> casbin::Result<bool> {
        self.store
            .add_rule(&PolicyRule::new(ptype, rule))
            .await
            .map_err(adapter_error)?;
        Ok(true)
    }

    async fn add_policies(
        &mut self,
        _sec: &str,
        ptype: &str,
        rules: Vec<Vec<String>>,
    ) -> casbin::Result<bool> {
        for rule in rules {
            self.store
                .add_rule(&PolicyRule::new(ptype, rule))
                .await
                .map_err(adapter_error)?;
        }
        Ok(true)
    }

    async fn remove_policy(&mut self, _sec: &str, ptype: &str, rule: Vec<String>) -> casbin::Result<bool> {
        self.store
            .remove_rule(&PolicyRule::new(ptype, rule))
            .await
            .map_err(adapter_error)?;
        Ok(true)
    }

    async fn remove_policies(
        &mut self,
        _sec: &str,
        ptype: &str,
        rules: Vec<Vec<String>>,
    ) -> casbin::Result<bool> {
        for rule in rules {
            self.store
                .remove_rule(&PolicyRule::new(ptype, rule))
                .await
                .map_err(adapter_error)?;
        }
        Ok(true)
    }

    async fn remove_filtered_policy(
        &mut self,
        _sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: Vec<String>,
    ) -> casbin::Result<bool> {
        self.store
            .remove_filtered(ptype, field_index, &field_values)
            .await
            .map_err(adapter_error)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::adapter::MemoryAdapter;
    use crate::policy::model::ModelSource;

    #[tokio::test]
    async fn load_then_save_preserves_rules() {
        let rules = vec![
            PolicyRule::grant("editor", "t1", "/docs", "get"),
            PolicyRule::grouping("alice", "editor", "t1"),
        ];
        let store = Arc::new(MemoryAdapter::with_rules(rules.clone()));
        let mut adapter = StoreAdapter::new(store.clone());
        let mut model = ModelSource::Embedded.load().await.unwrap();

        adapter.load_policy(&mut model).await.unwrap();
        store.save_all(&[]).await.unwrap();
        adapter.save_policy(&mut model).await.unwrap();

        assert_eq!(store.snapshot(), rules);
        assert!(!adapter.is_filtered());
    }

    #[tokio::test]
    async fn filtered_load_keeps_matching_rules_only() {
        let store = Arc::new(MemoryAdapter::with_rules([
            PolicyRule::grant("editor", "t1", "/docs", "get"),
            PolicyRule::grant("editor", "t2", "/docs", "get"),
            PolicyRule::grouping("alice", "editor", "t1"),
        ]));
        let mut adapter = StoreAdapter::new(store);
        let mut model = ModelSource::Embedded.load().await.unwrap();

        let filter = Filter {
            p: vec!["", "t1"],
            g: vec![],
        };
        adapter.load_filtered_policy(&mut model, filter).await.unwrap();

        assert!(adapter.is_filtered());
        assert_eq!(model.get_policy("p", "p"), vec![vec![
            "editor".to_string(),
            "t1".to_string(),
            "/docs".to_string(),
            "get".to_string(),
        ]]);
        assert_eq!(model.get_policy("g", "g").len(), 1);
    }

    #[tokio::test]
    async fn storage_errors_surface_as_adapter_errors() {
        let store = Arc::new(MemoryAdapter::new());
        store.fail_writes(Some("read-only replica"));
        let mut adapter = StoreAdapter::new(store);

        let err = adapter
            .add_policy("p", "p", vec!["editor".into(), "t1".into(), "/docs".into(), "get".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, casbin::Error::AdapterError(_)));
    }
}
