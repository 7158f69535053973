use std::collections::HashMap;

use botshield_platform::PlatformId;
use botshield_rules::Action;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One classified request as handed to the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestOutcome {
    pub domain: String,
    pub client_ip: String,
    pub user_agent: String,
    pub country: String,
    pub platform: PlatformId,
    pub bot_score: u8,
    pub action: Action,
    /// Name of the matched rule, if any.
    pub rule: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl RequestOutcome {
    pub fn blocked(&self) -> bool {
        self.action == Action::Block
    }
}

/// Per-domain, per-day rollup. One record per (domain, date), created on the
/// first request of the day and mutated thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub domain: String,
    pub date: NaiveDate,
    pub total_requests: u64,
    pub blocked_requests: u64,
    #[serde(default)]
    pub countries: HashMap<String, u64>,
    #[serde(default)]
    pub rules: HashMap<String, u64>,
    #[serde(default)]
    pub platforms: HashMap<String, u64>,
}

impl DailyAggregate {
    pub fn new(domain: &str, date: NaiveDate) -> Self {
        Self {
            domain: domain.to_string(),
            date,
            total_requests: 0,
            blocked_requests: 0,
            countries: HashMap::new(),
            rules: HashMap::new(),
            platforms: HashMap::new(),
        }
    }

    /// Fold one outcome into the rollup.
    pub fn absorb(&mut self, outcome: &RequestOutcome) {
        self.total_requests += 1;
        if outcome.blocked() {
            self.blocked_requests += 1;
        }

        if !outcome.country.is_empty() {
            *self.countries.entry(outcome.country.clone()).or_default() += 1;
        }

        if let Some(ref rule) = outcome.rule {
            *self.rules.entry(rule.clone()).or_default() += 1;
        }

        *self
            .platforms
            .entry(outcome.platform.as_str().to_string())
            .or_default() += 1;
    }
}

/// Cumulative per-domain counters, updated on every request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunningCounter {
    pub total_requests: u64,
    pub blocked_requests: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

/// A labelled count in a top-N list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    pub label: String,
    pub requests: u64,
}

/// One day in a stats series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyStat {
    pub date: NaiveDate,
    pub requests: u64,
    pub blocked: u64,
}

/// Aggregated stats for a domain over a requested window.
#[derive(Debug, Clone, Serialize)]
pub struct DomainStats {
    pub domain: String,
    pub total_requests: u64,
    pub blocked_requests: u64,
    pub bandwidth_saved_gb: f64,
    pub cost_saved: f64,
    pub top_blocked_countries: Vec<LabelCount>,
    pub top_blocked_rules: Vec<LabelCount>,
    pub daily_stats: Vec<DailyStat>,
}

/// Running-counter snapshot for the live dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeStats {
    pub total_requests: u64,
    pub blocked_requests: u64,
    /// Percentage of requests blocked, 0 when nothing was recorded.
    pub block_rate: f64,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Derived cost/bandwidth savings for a (domain, platform) pair. Never
/// stored; recomputed on demand.
#[derive(Debug, Clone, Serialize)]
pub struct SavingsReport {
    pub domain: String,
    pub platform: PlatformId,
    pub period_days: u32,
    pub blocked_requests: u64,
    pub bandwidth_saved_gb: f64,
    pub bandwidth_savings: f64,
    pub request_savings: f64,
    pub total_saved: f64,
    pub yearly_projection: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(action: Action, country: &str, rule: Option<&str>) -> RequestOutcome {
        RequestOutcome {
            domain: "example.com".to_string(),
            client_ip: "1.2.3.4".to_string(),
            user_agent: "curl/8.0".to_string(),
            country: country.to_string(),
            platform: PlatformId::Vercel,
            bot_score: 85,
            action,
            rule: rule.map(|r| r.to_string()),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn absorb_updates_totals_and_histograms() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();
        let mut aggregate = DailyAggregate::new("example.com", date);

        aggregate.absorb(&outcome(Action::Block, "CN", Some("high-bot-score")));
        aggregate.absorb(&outcome(Action::Allow, "US", None));
        aggregate.absorb(&outcome(Action::Block, "CN", Some("high-bot-score")));

        assert_eq!(aggregate.total_requests, 3);
        assert_eq!(aggregate.blocked_requests, 2);
        assert_eq!(aggregate.countries["CN"], 2);
        assert_eq!(aggregate.countries["US"], 1);
        assert_eq!(aggregate.rules["high-bot-score"], 2);
        assert_eq!(aggregate.platforms["vercel"], 3);
    }

    #[test]
    fn empty_country_is_not_counted() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();
        let mut aggregate = DailyAggregate::new("example.com", date);
        aggregate.absorb(&outcome(Action::Allow, "", None));
        assert!(aggregate.countries.is_empty());
    }

    #[test]
    fn challenge_is_not_blocked() {
        let record = outcome(Action::Challenge, "US", Some("challenge-medium-bot-score"));
        assert!(!record.blocked());
    }

    #[test]
    fn aggregate_survives_json_round_trip() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();
        let mut aggregate = DailyAggregate::new("example.com", date);
        aggregate.absorb(&outcome(Action::Block, "RU", Some("block-common-scrapers")));

        let json = serde_json::to_string(&aggregate).unwrap();
        let parsed: DailyAggregate = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.date, date);
        assert_eq!(parsed.blocked_requests, 1);
        assert_eq!(parsed.rules["block-common-scrapers"], 1);
    }
}
