use std::sync::Arc;

use botshield_analytics::Aggregator;
use botshield_rules::PolicyStore;
use prometheus::Registry;

/// Shared state type alias used across all route handlers.
pub type SharedState = Arc<AppState>;

/// State behind the admin API: the injected storage ports, the proxy's
/// metrics registry, and enough config to validate writes.
pub struct AppState {
    pub policy_store: Arc<dyn PolicyStore>,
    pub aggregator: Arc<Aggregator>,
    pub registry: Registry,
    /// Upper bound on rules accepted in one saved set.
    pub max_rules: usize,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        policy_store: Arc<dyn PolicyStore>,
        aggregator: Arc<Aggregator>,
        registry: Registry,
        max_rules: usize,
    ) -> Self {
        Self {
            policy_store,
            aggregator,
            registry,
            max_rules,
            start_time: std::time::Instant::now(),
        }
    }
}
