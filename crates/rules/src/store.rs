use async_trait::async_trait;
use botshield_common::{ShieldError, ShieldResult};
use dashmap::DashMap;

use crate::model::Rule;

/// Capability port for per-domain rule persistence.
///
/// The store holds whole rule sets; `put` replaces a domain's set as one
/// unit, never merging.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn get(&self, domain: &str) -> ShieldResult<Option<Vec<Rule>>>;
    async fn put(&self, domain: &str, rules: &[Rule]) -> ShieldResult<()>;
}

/// In-memory policy store for single-node deployments and tests.
#[derive(Default)]
pub struct MemoryPolicyStore {
    sets: DashMap<String, Vec<Rule>>,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn get(&self, domain: &str) -> ShieldResult<Option<Vec<Rule>>> {
        Ok(self.sets.get(domain).map(|entry| entry.value().clone()))
    }

    async fn put(&self, domain: &str, rules: &[Rule]) -> ShieldResult<()> {
        self.sets.insert(domain.to_string(), rules.to_vec());
        Ok(())
    }
}

/// Policy store that always fails; used to exercise degraded paths in tests.
pub struct UnavailablePolicyStore;

#[async_trait]
impl PolicyStore for UnavailablePolicyStore {
    async fn get(&self, _domain: &str) -> ShieldResult<Option<Vec<Rule>>> {
        Err(ShieldError::ConfigurationUnavailable(
            "policy store offline".to_string(),
        ))
    }

    async fn put(&self, _domain: &str, _rules: &[Rule]) -> ShieldResult<()> {
        Err(ShieldError::ConfigurationUnavailable(
            "policy store offline".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::baseline_rules;

    #[tokio::test]
    async fn memory_store_round_trips_a_set() {
        let store = MemoryPolicyStore::new();
        assert!(store.get("example.com").await.unwrap().is_none());

        let rules = baseline_rules();
        store.put("example.com", &rules).await.unwrap();

        let loaded = store.get("example.com").await.unwrap().unwrap();
        assert_eq!(loaded.len(), rules.len());
        assert_eq!(loaded[0].id, "high-bot-score");
    }

    #[tokio::test]
    async fn put_replaces_the_whole_set() {
        let store = MemoryPolicyStore::new();
        store.put("example.com", &baseline_rules()).await.unwrap();

        let single = vec![baseline_rules().remove(0)];
        store.put("example.com", &single).await.unwrap();

        let loaded = store.get("example.com").await.unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[tokio::test]
    async fn domains_are_isolated() {
        let store = MemoryPolicyStore::new();
        store.put("a.com", &baseline_rules()).await.unwrap();
        assert!(store.get("b.com").await.unwrap().is_none());
    }
}
