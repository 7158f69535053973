//! Bot-suspicion scoring.
//!
//! [`score`] is pure and synchronous: every contribution is derived from the
//! request features handed in, summed, and clamped to [0, 100] at the end.
//! The two I/O-backed signals (request rate, IP reputation) are sampled
//! upstream through the [`RateSignal`] / [`ReputationSignal`] ports and enter
//! the sum as pre-computed readings; a probe that failed or timed out simply
//! leaves its reading absent and contributes nothing.

pub mod heuristics;
pub mod known_bots;

use async_trait::async_trait;
use botshield_platform::PlatformId;
use std::net::IpAddr;

use known_bots::BotToken;

const KNOWN_BOT_MALICIOUS: u32 = 70;
const KNOWN_BOT_LEGITIMATE: u32 = 20;
const SUSPICIOUS_PATTERN: u32 = 30;
const MISSING_ACCEPT: u32 = 25;
const MISSING_ACCEPT_LANGUAGE: u32 = 15;
const MISSING_ACCEPT_ENCODING: u32 = 15;
const MISSING_CONNECTION: u32 = 10;
const SUSPICIOUS_COUNTRY: u32 = 20;

/// A sampled request-rate reading from the rate sub-scorer.
#[derive(Debug, Clone, Copy)]
pub struct RateReading {
    /// Blended requests observed in the tracker window for this client.
    pub requests_in_window: u64,
    /// Score contribution derived from the reading.
    pub contribution: u8,
}

/// A sampled reputation reading from the IP-reputation sub-scorer.
#[derive(Debug, Clone, Copy)]
pub struct ReputationReading {
    /// Risk value in [0, 100]; 0 is trusted, 100 is blocklisted.
    pub reputation: u8,
    /// Score contribution derived from the reading.
    pub contribution: u8,
}

/// Readings sampled before scoring. `None` means the probe was disabled,
/// failed, or timed out; it contributes nothing either way.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalReadings {
    pub rate: Option<RateReading>,
    pub reputation: Option<ReputationReading>,
}

/// Port for the optional request-rate sub-scorer.
#[async_trait]
pub trait RateSignal: Send + Sync {
    async fn sample(&self, client_ip: &str) -> anyhow::Result<RateReading>;
}

/// Port for the optional IP-reputation sub-scorer.
#[async_trait]
pub trait ReputationSignal: Send + Sync {
    async fn sample(&self, client_ip: IpAddr) -> anyhow::Result<ReputationReading>;
}

/// Request features feeding one score computation.
#[derive(Debug, Clone)]
pub struct ScoreInput<'a> {
    pub user_agent: &'a str,
    /// Two-letter country code from the edge, or empty when unavailable.
    pub country: &'a str,
    pub path: &'a str,
    pub platform: PlatformId,
    pub has_accept: bool,
    pub has_accept_language: bool,
    pub has_accept_encoding: bool,
    pub has_connection: bool,
    pub suspicious_countries: &'a [String],
    pub signals: SignalReadings,
}

/// Compute the bot-suspicion score for a request. Purely additive; the sum
/// is clamped to 100.
pub fn score(input: &ScoreInput<'_>) -> u8 {
    let ua_lower = input.user_agent.to_lowercase();
    let mut score: u32 = 0;

    match known_bots::scan(&ua_lower) {
        Some(BotToken::Legitimate(_)) => score += KNOWN_BOT_LEGITIMATE,
        Some(BotToken::Malicious(_)) => score += KNOWN_BOT_MALICIOUS,
        None => {}
    }

    if known_bots::suspicious_pattern(&ua_lower).is_some() {
        score += SUSPICIOUS_PATTERN;
    }

    if !input.has_accept {
        score += MISSING_ACCEPT;
    }
    if !input.has_accept_language {
        score += MISSING_ACCEPT_LANGUAGE;
    }
    if !input.has_accept_encoding {
        score += MISSING_ACCEPT_ENCODING;
    }
    if !input.has_connection {
        score += MISSING_CONNECTION;
    }

    if !input.country.is_empty()
        && input
            .suspicious_countries
            .iter()
            .any(|c| c.eq_ignore_ascii_case(input.country))
    {
        score += SUSPICIOUS_COUNTRY;
    }

    score += platform_path_score(input.platform, input.path);
    score += heuristics::shape_score(&ua_lower);

    if let Some(rate) = input.signals.rate {
        score += rate.contribution as u32;
    }
    if let Some(reputation) = input.signals.reputation {
        score += reputation.contribution as u32;
    }

    score.min(100) as u8
}

/// Extra points when the requested path falls in the platform's risky set.
/// Magnitudes reflect what bot traffic costs on each platform: paid function
/// invocations on Netlify, per-request billing on Vercel, catalog scraping
/// on Shopify, asset scraping on Webflow.
fn platform_path_score(platform: PlatformId, path: &str) -> u32 {
    let risky = platform
        .config()
        .risky_paths
        .iter()
        .any(|p| path.contains(p));
    if !risky {
        return 0;
    }

    match platform {
        PlatformId::Webflow => 15,
        PlatformId::Netlify => 20,
        PlatformId::Vercel => 15,
        PlatformId::Shopify => 25,
        _ => 0,
    }
}
