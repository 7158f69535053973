mod context;
mod origin;
mod service;

use std::sync::Arc;

use anyhow::Result;
use botshield_analytics::{Aggregator, MemoryMetricsStore};
use botshield_bot_score::{RateSignal, ReputationSignal};
use botshield_common::AppConfig;
use botshield_ip_reputation::ReputationList;
use botshield_rate_limit::RateTracker;
use botshield_rules::{MemoryPolicyStore, PolicyStore};
use pingora_core::server::Server;
use pingora_proxy::http_proxy_service;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::service::ShieldProxy;

fn main() -> Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    // Parse command-line args for config path
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/botshield.yaml".to_string());

    info!(config_path = %config_path, "starting BotShield");

    let config = Arc::new(AppConfig::load(&config_path)?);

    // Create Pingora server
    let mut server = Server::new(None)?;
    server.bootstrap();

    // Storage ports. Single-node deployments run on the bundled in-memory
    // stores; external stores plug in behind the same traits.
    let policy_store: Arc<dyn PolicyStore> = Arc::new(MemoryPolicyStore::new());
    let aggregator = Arc::new(Aggregator::new(
        Arc::new(MemoryMetricsStore::new()),
        config.analytics.clone(),
    ));

    // Optional sub-scorers.
    let rate_signal: Option<Arc<dyn RateSignal>> = if config.scoring.rate_signal.enabled {
        let tracker = Arc::new(RateTracker::new(
            config.scoring.rate_signal.window_secs,
            config.scoring.rate_signal.sustained_threshold,
            config.scoring.rate_signal.burst_threshold,
        ));
        RateTracker::start_cleanup_task(Arc::clone(&tracker));
        Some(tracker as Arc<dyn RateSignal>)
    } else {
        None
    };

    let reputation_signal: Option<Arc<dyn ReputationSignal>> =
        if config.scoring.ip_reputation.enabled {
            let lists = ReputationList::new();
            if let Err(e) = lists.reload_from_config(
                config.scoring.ip_reputation.blocklist.as_deref(),
                config.scoring.ip_reputation.allowlist.as_deref(),
            ) {
                warn!(error = %e, "failed to load reputation lists, starting with neutral data");
            }
            Some(Arc::new(lists) as Arc<dyn ReputationSignal>)
        } else {
            None
        };

    // Create the shield proxy service
    let shield = ShieldProxy::new(
        Arc::clone(&config),
        Arc::clone(&policy_store),
        Arc::clone(&aggregator),
        rate_signal,
        reputation_signal,
    );
    let registry = shield.metrics.registry.clone();

    let mut proxy_service = http_proxy_service(&server.configuration, shield);

    for listen_addr in &config.server.listen {
        info!(addr = %listen_addr, "adding listener");
        proxy_service.add_tcp(listen_addr);
    }

    server.add_service(proxy_service);

    // Launch the admin API alongside the proxy
    server.add_service(pingora_core::services::background::background_service(
        "admin API",
        AdminBackgroundService {
            listen_addr: config.server.admin.listen.clone(),
            policy_store,
            aggregator,
            registry,
            max_rules: config.policy.max_rules,
        },
    ));

    info!("BotShield started successfully");
    server.run_forever();
}

/// Background service to run the admin API alongside Pingora.
struct AdminBackgroundService {
    listen_addr: String,
    policy_store: Arc<dyn PolicyStore>,
    aggregator: Arc<Aggregator>,
    registry: prometheus::Registry,
    max_rules: usize,
}

#[async_trait::async_trait]
impl pingora_core::services::background::BackgroundService for AdminBackgroundService {
    async fn start(&self, mut shutdown: pingora_core::server::ShutdownWatch) {
        info!(addr = %self.listen_addr, "starting admin API");

        let state = botshield_admin::new_shared_state(
            Arc::clone(&self.policy_store),
            Arc::clone(&self.aggregator),
            self.registry.clone(),
            self.max_rules,
        );

        tokio::select! {
            result = botshield_admin::run_admin_server(state, &self.listen_addr) => {
                if let Err(e) = result {
                    error!(error = %e, "admin API server error");
                }
            }
            _ = shutdown.changed() => {
                info!("admin API shutting down");
            }
        }
    }
}
