use std::time::{Duration, Instant};

use async_trait::async_trait;
use botshield_common::{ShieldError, ShieldResult};
use dashmap::DashMap;

/// Capability port for the analytics key-value store.
///
/// Aggregate updates through this port are non-atomic read-modify-write
/// cycles: concurrent requests incrementing the same key may race and lose
/// increments. That approximation is accepted: this is monitoring data, not
/// a ledger. A backend offering atomic increments can tighten it without
/// changing callers.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    async fn get(&self, key: &str) -> ShieldResult<Option<String>>;
    async fn put(&self, key: &str, value: String, ttl: Option<Duration>) -> ShieldResult<()>;
}

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

/// In-memory metrics store with per-key TTLs, for single-node deployments
/// and tests. Expired entries are dropped lazily on read and by
/// [`MemoryMetricsStore::cleanup`].
#[derive(Default)]
pub struct MemoryMetricsStore {
    entries: DashMap<String, Entry>,
}

impl MemoryMetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sweep expired entries. Call periodically to bound memory.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.entries
            .retain(|_, entry| entry.expires_at.map_or(true, |at| at > now));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl MetricsStore for MemoryMetricsStore {
    async fn get(&self, key: &str) -> ShieldResult<Option<String>> {
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at.map_or(true, |at| at > Instant::now()) {
                return Ok(Some(entry.value.clone()));
            }
        }
        // Expired or absent; drop any stale entry.
        self.entries
            .remove_if(key, |_, entry| entry.expires_at.map_or(false, |at| at <= Instant::now()));
        Ok(None)
    }

    async fn put(&self, key: &str, value: String, ttl: Option<Duration>) -> ShieldResult<()> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: ttl.map(|d| Instant::now() + d),
            },
        );
        Ok(())
    }
}

/// Metrics store that fails every operation; used to exercise the
/// best-effort write paths in tests.
pub struct FailingMetricsStore;

#[async_trait]
impl MetricsStore for FailingMetricsStore {
    async fn get(&self, _key: &str) -> ShieldResult<Option<String>> {
        Err(ShieldError::Store("metrics store offline".to_string()))
    }

    async fn put(&self, _key: &str, _value: String, _ttl: Option<Duration>) -> ShieldResult<()> {
        Err(ShieldError::Store("metrics store offline".to_string()))
    }
}
