//! Outcome recording and aggregated statistics.
//!
//! The aggregator performs three independent best-effort writes per request
//! (raw record, daily aggregate, running counter) against a pluggable
//! key-value [`MetricsStore`]. A failed or slow write is logged and dropped;
//! it never blocks the other writes or the calling request. Reads derive the
//! dashboard numbers: zero-filled daily series, top-N histograms, and
//! platform-priced savings reports.

pub mod aggregate;
pub mod store;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use botshield_common::config::AnalyticsConfig;
use botshield_common::{ShieldError, ShieldResult};
use botshield_platform::PlatformId;
use chrono::{Days, NaiveDate, Utc};
use tracing::warn;
use uuid::Uuid;

pub use aggregate::{
    DailyAggregate, DailyStat, DomainStats, LabelCount, RealtimeStats, RequestOutcome,
    RunningCounter, SavingsReport,
};
pub use store::{MemoryMetricsStore, MetricsStore};

const SAVINGS_PERIOD_DAYS: u32 = 30;
const TOP_LIST_LEN: usize = 10;

/// Records outcomes and derives per-domain statistics.
pub struct Aggregator {
    store: Arc<dyn MetricsStore>,
    config: AnalyticsConfig,
}

fn daily_key(domain: &str, date: NaiveDate) -> String {
    format!("daily:{}:{}", domain, date)
}

fn counter_key(domain: &str) -> String {
    format!("counters:{}", domain)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl Aggregator {
    pub fn new(store: Arc<dyn MetricsStore>, config: AnalyticsConfig) -> Self {
        Self { store, config }
    }

    /// Record one classified request: raw log entry, daily aggregate, and
    /// running counter. The three writes are isolated; each failure is
    /// logged and dropped without affecting the others.
    pub async fn record_outcome(&self, outcome: &RequestOutcome) {
        if let Err(e) = self.write_raw(outcome).await {
            warn!(domain = %outcome.domain, error = %e, "raw analytics write failed");
        }
        if let Err(e) = self.update_daily(outcome).await {
            warn!(domain = %outcome.domain, error = %e, "daily aggregate write failed");
        }
        if let Err(e) = self.update_counter(outcome).await {
            warn!(domain = %outcome.domain, error = %e, "running counter write failed");
        }
    }

    async fn write_raw(&self, outcome: &RequestOutcome) -> ShieldResult<()> {
        let key = format!(
            "analytics:{}:{}:{}",
            outcome.domain,
            outcome.timestamp.timestamp_millis(),
            Uuid::new_v4().simple()
        );
        let value = serde_json::to_string(outcome)?;
        let ttl = Duration::from_secs(self.config.raw_retention_days * 24 * 60 * 60);
        self.deadline(self.store.put(&key, value, Some(ttl))).await
    }

    async fn update_daily(&self, outcome: &RequestOutcome) -> ShieldResult<()> {
        let date = outcome.timestamp.date_naive();
        let key = daily_key(&outcome.domain, date);

        let mut aggregate = match self.deadline(self.store.get(&key)).await? {
            Some(json) => serde_json::from_str(&json)
                .unwrap_or_else(|_| DailyAggregate::new(&outcome.domain, date)),
            None => DailyAggregate::new(&outcome.domain, date),
        };
        aggregate.absorb(outcome);

        let ttl = Duration::from_secs(self.config.daily_retention_days * 24 * 60 * 60);
        self.deadline(
            self.store
                .put(&key, serde_json::to_string(&aggregate)?, Some(ttl)),
        )
        .await
    }

    async fn update_counter(&self, outcome: &RequestOutcome) -> ShieldResult<()> {
        let key = counter_key(&outcome.domain);

        let mut counter: RunningCounter = match self.deadline(self.store.get(&key)).await? {
            Some(json) => serde_json::from_str(&json).unwrap_or_default(),
            None => RunningCounter::default(),
        };

        counter.total_requests += 1;
        if outcome.blocked() {
            counter.blocked_requests += 1;
        }
        counter.last_updated = Some(outcome.timestamp);

        self.deadline(
            self.store
                .put(&key, serde_json::to_string(&counter)?, None),
        )
        .await
    }

    /// Aggregated stats for the inclusive `days`-day window ending today.
    /// The returned series always has exactly `days` entries in
    /// chronological order; days without a stored aggregate read as zero.
    pub async fn get_stats(&self, domain: &str, days: u32) -> DomainStats {
        let today = Utc::now().date_naive();

        let mut daily_stats = Vec::with_capacity(days as usize);
        let mut total_requests = 0u64;
        let mut blocked_requests = 0u64;
        let mut countries: std::collections::HashMap<String, u64> = Default::default();
        let mut rules: std::collections::HashMap<String, u64> = Default::default();

        for offset in (0..u64::from(days)).rev() {
            let date = today
                .checked_sub_days(Days::new(offset))
                .expect("stats window within calendar range");

            match self.read_daily(domain, date).await {
                Some(aggregate) => {
                    total_requests += aggregate.total_requests;
                    blocked_requests += aggregate.blocked_requests;
                    for (country, count) in &aggregate.countries {
                        *countries.entry(country.clone()).or_default() += count;
                    }
                    for (rule, count) in &aggregate.rules {
                        *rules.entry(rule.clone()).or_default() += count;
                    }
                    daily_stats.push(DailyStat {
                        date,
                        requests: aggregate.total_requests,
                        blocked: aggregate.blocked_requests,
                    });
                }
                None => daily_stats.push(DailyStat {
                    date,
                    requests: 0,
                    blocked: 0,
                }),
            }
        }

        let bandwidth_saved_gb = self.bandwidth_saved_gb(blocked_requests);
        let cost_saved = round2(
            bandwidth_saved_gb * self.config.cost_per_gb
                + blocked_requests as f64 * self.config.cost_per_request,
        );

        DomainStats {
            domain: domain.to_string(),
            total_requests,
            blocked_requests,
            bandwidth_saved_gb,
            cost_saved,
            top_blocked_countries: top_counts(countries),
            top_blocked_rules: top_counts(rules),
            daily_stats,
        }
    }

    async fn read_daily(&self, domain: &str, date: NaiveDate) -> Option<DailyAggregate> {
        let key = daily_key(domain, date);
        match self.deadline(self.store.get(&key)).await {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(aggregate) => Some(aggregate),
                Err(e) => {
                    warn!(key = %key, error = %e, "discarding unreadable daily aggregate");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                // Approximate analytics: a failed day reads as zero.
                warn!(key = %key, error = %e, "daily aggregate read failed");
                None
            }
        }
    }

    /// Running-counter snapshot for the live dashboard.
    pub async fn get_realtime(&self, domain: &str) -> RealtimeStats {
        let counter: RunningCounter = match self.deadline(self.store.get(&counter_key(domain))).await
        {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_default(),
            Ok(None) => RunningCounter::default(),
            Err(e) => {
                warn!(domain = %domain, error = %e, "running counter read failed");
                RunningCounter::default()
            }
        };

        let block_rate = if counter.total_requests > 0 {
            counter.blocked_requests as f64 / counter.total_requests as f64 * 100.0
        } else {
            0.0
        };

        RealtimeStats {
            total_requests: counter.total_requests,
            blocked_requests: counter.blocked_requests,
            block_rate,
            last_updated: counter.last_updated,
        }
    }

    /// Savings report over the last 30 days, priced with the platform's
    /// cost figures instead of the generic defaults.
    pub async fn get_savings_report(&self, domain: &str, platform: PlatformId) -> SavingsReport {
        let stats = self.get_stats(domain, SAVINGS_PERIOD_DAYS).await;
        let costs = platform.config();

        let bandwidth_savings = round2(stats.bandwidth_saved_gb * costs.cost_per_gb);
        let request_savings =
            round2(stats.blocked_requests as f64 * costs.cost_per_request);
        let total_saved = round2(bandwidth_savings + request_savings);

        SavingsReport {
            domain: domain.to_string(),
            platform,
            period_days: SAVINGS_PERIOD_DAYS,
            blocked_requests: stats.blocked_requests,
            bandwidth_saved_gb: stats.bandwidth_saved_gb,
            bandwidth_savings,
            request_savings,
            total_saved,
            yearly_projection: round2(total_saved * 12.0),
        }
    }

    fn bandwidth_saved_gb(&self, blocked_requests: u64) -> f64 {
        round2(blocked_requests as f64 * self.config.avg_request_size_mb / 1024.0)
    }

    async fn deadline<T>(
        &self,
        fut: impl Future<Output = ShieldResult<T>>,
    ) -> ShieldResult<T> {
        let budget = Duration::from_millis(self.config.store_timeout_ms);
        match tokio::time::timeout(budget, fut).await {
            Ok(result) => result,
            Err(_) => Err(ShieldError::AnalyticsWriteFailed(format!(
                "store call exceeded {}ms",
                self.config.store_timeout_ms
            ))),
        }
    }
}

fn top_counts(counts: std::collections::HashMap<String, u64>) -> Vec<LabelCount> {
    let mut entries: Vec<LabelCount> = counts
        .into_iter()
        .map(|(label, requests)| LabelCount { label, requests })
        .collect();
    // Count descending, label ascending for deterministic ties.
    entries.sort_by(|a, b| b.requests.cmp(&a.requests).then(a.label.cmp(&b.label)));
    entries.truncate(TOP_LIST_LEN);
    entries
}
