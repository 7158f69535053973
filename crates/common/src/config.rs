use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level shield configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub origin: OriginConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub posture: PostureConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen: Vec<String>,
    #[serde(default)]
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_listen")]
    pub listen: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            listen: default_admin_listen(),
        }
    }
}

/// The origin site the shield sits in front of.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginConfig {
    /// Upstream address as `host:port`.
    pub addr: String,
    #[serde(default)]
    pub tls: bool,
    /// SNI hostname for TLS origins; defaults to the addr host.
    #[serde(default)]
    pub sni: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub rate_signal: RateSignalConfig,
    #[serde(default)]
    pub ip_reputation: IpReputationSignalConfig,
    /// Budget for each optional sub-scorer probe. A probe that misses the
    /// deadline contributes nothing to the score.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_suspicious_countries")]
    pub suspicious_countries: Vec<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            rate_signal: RateSignalConfig::default(),
            ip_reputation: IpReputationSignalConfig::default(),
            probe_timeout_ms: default_probe_timeout_ms(),
            suspicious_countries: default_suspicious_countries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateSignalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_rate_window_secs")]
    pub window_secs: u64,
    /// Requests per window above which the rate signal starts contributing.
    #[serde(default = "default_rate_sustained")]
    pub sustained_threshold: u64,
    /// Requests per window treated as outright burst pressure.
    #[serde(default = "default_rate_burst")]
    pub burst_threshold: u64,
}

impl Default for RateSignalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: default_rate_window_secs(),
            sustained_threshold: default_rate_sustained(),
            burst_threshold: default_rate_burst(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpReputationSignalConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub blocklist: Option<PathBuf>,
    #[serde(default)]
    pub allowlist: Option<PathBuf>,
}

impl Default for IpReputationSignalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            blocklist: None,
            allowlist: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Budget for loading a domain's rule set; on timeout the baseline
    /// defaults apply.
    #[serde(default = "default_policy_timeout_ms")]
    pub load_timeout_ms: u64,
    /// Upper bound on rules accepted in one saved set.
    #[serde(default = "default_max_rules")]
    pub max_rules: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            load_timeout_ms: default_policy_timeout_ms(),
            max_rules: default_max_rules(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Assumed average response size used for bandwidth-saved estimates.
    #[serde(default = "default_avg_request_size_mb")]
    pub avg_request_size_mb: f64,
    /// Generic cost per GB used when no platform-specific figure applies.
    #[serde(default = "default_cost_per_gb")]
    pub cost_per_gb: f64,
    #[serde(default = "default_cost_per_request")]
    pub cost_per_request: f64,
    #[serde(default = "default_raw_retention_days")]
    pub raw_retention_days: u64,
    #[serde(default = "default_daily_retention_days")]
    pub daily_retention_days: u64,
    /// Budget for each analytics store write.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            avg_request_size_mb: default_avg_request_size_mb(),
            cost_per_gb: default_cost_per_gb(),
            cost_per_request: default_cost_per_request(),
            raw_retention_days: default_raw_retention_days(),
            daily_retention_days: default_daily_retention_days(),
            store_timeout_ms: default_store_timeout_ms(),
        }
    }
}

/// What the dispatcher does when classification itself fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostureConfig {
    #[serde(default = "default_failure_action")]
    pub on_internal_error: FailureAction,
}

impl Default for PostureConfig {
    fn default() -> Self {
        Self {
            on_internal_error: default_failure_action(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureAction {
    Allow,
    Block,
}

// Default value helpers
fn default_admin_listen() -> String {
    "127.0.0.1:9090".to_string()
}
fn default_true() -> bool {
    true
}
fn default_probe_timeout_ms() -> u64 {
    50
}
fn default_suspicious_countries() -> Vec<String> {
    ["CN", "RU", "KP", "IR", "PK", "BD", "VN", "ID"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_rate_window_secs() -> u64 {
    60
}
fn default_rate_sustained() -> u64 {
    120
}
fn default_rate_burst() -> u64 {
    600
}
fn default_policy_timeout_ms() -> u64 {
    150
}
fn default_max_rules() -> usize {
    256
}
fn default_avg_request_size_mb() -> f64 {
    0.5
}
fn default_cost_per_gb() -> f64 {
    0.20
}
fn default_cost_per_request() -> f64 {
    0.0001
}
fn default_raw_retention_days() -> u64 {
    30
}
fn default_daily_retention_days() -> u64 {
    365
}
fn default_store_timeout_ms() -> u64 {
    500
}
fn default_failure_action() -> FailureAction {
    FailureAction::Allow
}

impl AppConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.listen.is_empty() {
            anyhow::bail!("server.listen must have at least one address");
        }

        if self.origin.addr.is_empty() {
            anyhow::bail!("origin.addr must not be empty");
        }

        if self.scoring.rate_signal.window_secs == 0 {
            anyhow::bail!("scoring.rate_signal.window_secs must be positive");
        }

        if self.scoring.rate_signal.burst_threshold < self.scoring.rate_signal.sustained_threshold
        {
            anyhow::bail!(
                "scoring.rate_signal.burst_threshold must be >= sustained_threshold ({} < {})",
                self.scoring.rate_signal.burst_threshold,
                self.scoring.rate_signal.sustained_threshold
            );
        }

        if self.analytics.avg_request_size_mb <= 0.0 {
            anyhow::bail!("analytics.avg_request_size_mb must be positive");
        }

        if self.policy.max_rules == 0 {
            anyhow::bail!("policy.max_rules must be positive");
        }

        Ok(())
    }
}
