use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use botshield_analytics::{Aggregator, RequestOutcome};
use botshield_bot_score::{
    RateReading, RateSignal, ReputationReading, ReputationSignal, ScoreInput, SignalReadings,
};
use botshield_common::config::FailureAction;
use botshield_common::{AppConfig, ShieldResult};
use botshield_rules::{Action, Decision, EvalContext, PolicyStore};
use bytes::Bytes;
use chrono::Utc;
use http::StatusCode;
use pingora_core::prelude::*;
use pingora_core::upstreams::peer::HttpPeer;
use pingora_http::ResponseHeader;
use pingora_proxy::{ProxyHttp, Session};
use prometheus::{HistogramVec, IntCounter, IntCounterVec, Registry};
use tracing::{debug, info, warn};

use crate::context::RequestContext;
use crate::origin;

/// The per-request dispatcher: platform detection, bot scoring, rule
/// evaluation, analytics recording, and the block-or-forward branch.
pub struct ShieldProxy {
    pub config: Arc<AppConfig>,
    pub policy_store: Arc<dyn PolicyStore>,
    pub aggregator: Arc<Aggregator>,
    pub rate_signal: Option<Arc<dyn RateSignal>>,
    pub reputation_signal: Option<Arc<dyn ReputationSignal>>,
    pub metrics: Arc<ShieldMetrics>,
}

pub struct ShieldMetrics {
    pub registry: Registry,
    pub requests_total: IntCounter,
    pub requests_blocked: IntCounter,
    pub requests_challenged: IntCounter,
    pub platform_requests: IntCounterVec,
    pub request_duration: HistogramVec,
}

impl ShieldMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_total =
            IntCounter::new("botshield_requests_total", "Total requests processed").unwrap();
        let requests_blocked =
            IntCounter::new("botshield_requests_blocked", "Total requests blocked").unwrap();
        let requests_challenged = IntCounter::new(
            "botshield_requests_challenged",
            "Total requests with a challenge decision",
        )
        .unwrap();
        let platform_requests = IntCounterVec::new(
            prometheus::Opts::new(
                "botshield_platform_requests_total",
                "Requests by detected hosting platform",
            ),
            &["platform"],
        )
        .unwrap();
        let request_duration = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "botshield_request_duration_seconds",
                "Request duration in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]),
            &["platform"],
        )
        .unwrap();

        registry.register(Box::new(requests_total.clone())).unwrap();
        registry
            .register(Box::new(requests_blocked.clone()))
            .unwrap();
        registry
            .register(Box::new(requests_challenged.clone()))
            .unwrap();
        registry
            .register(Box::new(platform_requests.clone()))
            .unwrap();
        registry
            .register(Box::new(request_duration.clone()))
            .unwrap();

        Self {
            registry,
            requests_total,
            requests_blocked,
            requests_challenged,
            platform_requests,
            request_duration,
        }
    }
}

impl Default for ShieldMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ShieldProxy {
    pub fn new(
        config: Arc<AppConfig>,
        policy_store: Arc<dyn PolicyStore>,
        aggregator: Arc<Aggregator>,
        rate_signal: Option<Arc<dyn RateSignal>>,
        reputation_signal: Option<Arc<dyn ReputationSignal>>,
    ) -> Self {
        Self {
            config,
            policy_store,
            aggregator,
            rate_signal,
            reputation_signal,
            metrics: Arc::new(ShieldMetrics::new()),
        }
    }

    /// Sample the optional rate sub-scorer under the probe budget.
    async fn probe_rate(&self, client_ip: &str) -> Option<RateReading> {
        let signal = self.rate_signal.as_ref()?;
        let budget = Duration::from_millis(self.config.scoring.probe_timeout_ms);

        match tokio::time::timeout(budget, signal.sample(client_ip)).await {
            Ok(Ok(reading)) => Some(reading),
            Ok(Err(e)) => {
                debug!(client_ip = %client_ip, error = %e, "rate probe failed");
                None
            }
            Err(_) => {
                debug!(client_ip = %client_ip, "rate probe timed out");
                None
            }
        }
    }

    /// Sample the optional IP-reputation sub-scorer under the probe budget.
    async fn probe_reputation(&self, client_ip: &str) -> Option<ReputationReading> {
        let signal = self.reputation_signal.as_ref()?;
        let addr: IpAddr = client_ip.parse().ok()?;
        let budget = Duration::from_millis(self.config.scoring.probe_timeout_ms);

        match tokio::time::timeout(budget, signal.sample(addr)).await {
            Ok(Ok(reading)) => Some(reading),
            Ok(Err(e)) => {
                debug!(client_ip = %client_ip, error = %e, "reputation probe failed");
                None
            }
            Err(_) => {
                debug!(client_ip = %client_ip, "reputation probe timed out");
                None
            }
        }
    }

    /// Load the domain's rules under the policy budget; a slow store reads
    /// as unavailable and the baseline defaults apply.
    async fn load_rules_with_budget(&self, domain: &str) -> Vec<botshield_rules::Rule> {
        let budget = Duration::from_millis(self.config.policy.load_timeout_ms);
        match tokio::time::timeout(
            budget,
            botshield_rules::load_rules(self.policy_store.as_ref(), domain),
        )
        .await
        {
            Ok(rules) => rules,
            Err(_) => {
                warn!(domain = %domain, "policy store load timed out, using baseline rules");
                botshield_rules::defaults::baseline_rules()
            }
        }
    }

    /// Run the classification pipeline for one request. Every degraded path
    /// is handled inside; an error here is an internal failure and the
    /// configured posture decides the outcome.
    async fn classify(&self, session: &Session, ctx: &mut RequestContext) -> ShieldResult<Decision> {
        let headers: Vec<(String, String)> = session
            .req_header()
            .headers
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();

        ctx.platform = botshield_platform::detect(&ctx.domain, &headers);
        self.metrics
            .platform_requests
            .with_label_values(&[ctx.platform.as_str()])
            .inc();

        let signals = SignalReadings {
            rate: self.probe_rate(&ctx.client_ip).await,
            reputation: self.probe_reputation(&ctx.client_ip).await,
        };

        let has = |name: &str| {
            headers
                .iter()
                .any(|(k, _)| k.eq_ignore_ascii_case(name))
        };

        ctx.bot_score = botshield_bot_score::score(&ScoreInput {
            user_agent: &ctx.user_agent,
            country: &ctx.country,
            path: &ctx.path,
            platform: ctx.platform,
            has_accept: has("accept"),
            has_accept_language: has("accept-language"),
            has_accept_encoding: has("accept-encoding"),
            has_connection: has("connection"),
            suspicious_countries: &self.config.scoring.suspicious_countries,
            signals,
        });

        let rules = self.load_rules_with_budget(&ctx.domain).await;

        let decision = botshield_rules::evaluate(
            &EvalContext {
                bot_score: ctx.bot_score,
                country: &ctx.country,
                user_agent: &ctx.user_agent,
                path: &ctx.path,
                rate_limit: signals.rate.map(|r| r.requests_in_window),
                ip_reputation: signals.reputation.map(|r| r.reputation),
            },
            &rules,
        );

        // Fire-and-forget: analytics must never delay or fail the response.
        let outcome = RequestOutcome {
            domain: ctx.domain.clone(),
            client_ip: ctx.client_ip.clone(),
            user_agent: ctx.user_agent.clone(),
            country: ctx.country.clone(),
            platform: ctx.platform,
            bot_score: ctx.bot_score,
            action: decision.action,
            rule: decision.rule_name.clone(),
            timestamp: Utc::now(),
        };
        let aggregator = Arc::clone(&self.aggregator);
        tokio::spawn(async move {
            aggregator.record_outcome(&outcome).await;
        });

        Ok(decision)
    }

    /// Decision applied when classification itself failed.
    fn posture_decision(&self) -> Decision {
        match self.config.posture.on_internal_error {
            FailureAction::Allow => Decision {
                action: Action::Allow,
                rule_id: None,
                rule_name: None,
                reason: "internal failure, failing open".to_string(),
            },
            FailureAction::Block => Decision {
                action: Action::Block,
                rule_id: None,
                rule_name: None,
                reason: "internal failure, failing closed".to_string(),
            },
        }
    }

    async fn write_block_response(
        &self,
        session: &mut Session,
        decision: &Decision,
    ) -> Result<()> {
        let mut resp = ResponseHeader::build(StatusCode::FORBIDDEN, Some(4)).unwrap();
        resp.insert_header("content-type", "text/plain").unwrap();
        resp.insert_header("x-bot-shield", "blocked").unwrap();
        let _ = resp.insert_header("x-block-reason", sanitize_header(&decision.reason));
        if let Some(ref rule_id) = decision.rule_id {
            let _ = resp.insert_header("x-rule-id", sanitize_header(rule_id));
        }
        session.set_keepalive(None);
        session.write_response_header(Box::new(resp), false).await?;
        session
            .write_response_body(Some(Bytes::from("Access Denied\n")), true)
            .await?;
        Ok(())
    }
}

/// Strip characters that cannot appear in a header value.
fn sanitize_header(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { ' ' })
        .collect()
}

/// Extract the client IP: edge header first, then the first hop of
/// x-forwarded-for, then the socket address.
fn client_ip(session: &Session) -> String {
    let headers = &session.req_header().headers;

    if let Some(ip) = headers
        .get("cf-connecting-ip")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
    {
        return ip;
    }

    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
    {
        return ip;
    }

    let mut addr = session
        .client_addr()
        .map(|a| a.to_string())
        .unwrap_or_default();

    // Strip the port from IPv4 socket addresses; bracketless IPv6 stays.
    if addr.contains('.') && !addr.starts_with('[') {
        if let Some((host, _port)) = addr.rsplit_once(':') {
            addr = host.to_string();
        }
    }
    addr
}

#[async_trait]
impl ProxyHttp for ShieldProxy {
    type CTX = RequestContext;

    fn new_ctx(&self) -> Self::CTX {
        RequestContext::new()
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        self.metrics.requests_total.inc();

        let header = session.req_header();
        ctx.method = header.method.as_str().to_string();
        ctx.path = header.uri.path().to_string();
        ctx.user_agent = header
            .headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        ctx.country = header
            .headers
            .get("cf-ipcountry")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        ctx.domain = header
            .headers
            .get("host")
            .and_then(|v| v.to_str().ok())
            .map(|h| h.split(':').next().unwrap_or(h).to_string())
            .unwrap_or_default();
        ctx.client_ip = client_ip(session);

        let decision = match self.classify(session, ctx).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(
                    client_ip = %ctx.client_ip,
                    domain = %ctx.domain,
                    error = %e,
                    "classification failed, applying failure posture"
                );
                self.posture_decision()
            }
        };

        let blocked = decision.blocked();
        match decision.action {
            Action::Block => {
                info!(
                    client_ip = %ctx.client_ip,
                    domain = %ctx.domain,
                    bot_score = ctx.bot_score,
                    rule = decision.rule_name.as_deref().unwrap_or("-"),
                    "request blocked"
                );
                self.metrics.requests_blocked.inc();
            }
            Action::Challenge => {
                // The challenge decision is recorded; executing a challenge
                // is out of scope, so the request continues to the origin.
                debug!(
                    client_ip = %ctx.client_ip,
                    domain = %ctx.domain,
                    bot_score = ctx.bot_score,
                    "challenge decision recorded"
                );
                self.metrics.requests_challenged.inc();
            }
            Action::Allow => {}
        }

        if blocked {
            self.write_block_response(session, &decision).await?;
            ctx.decision = Some(decision);
            return Ok(true);
        }

        ctx.decision = Some(decision);
        Ok(false) // continue to origin
    }

    async fn upstream_peer(
        &self,
        _session: &mut Session,
        _ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        Ok(origin::origin_peer(&self.config.origin))
    }

    async fn response_filter(
        &self,
        _session: &mut Session,
        upstream_response: &mut ResponseHeader,
        ctx: &mut Self::CTX,
    ) -> Result<()>
    where
        Self::CTX: Send + Sync,
    {
        // Observation only; the origin's response is forwarded untouched.
        ctx.response_status = upstream_response.status.as_u16();
        Ok(())
    }

    async fn logging(
        &self,
        _session: &mut Session,
        _error: Option<&pingora_core::Error>,
        ctx: &mut Self::CTX,
    ) {
        let duration = ctx.request_start.elapsed();

        self.metrics
            .request_duration
            .with_label_values(&[ctx.platform.as_str()])
            .observe(duration.as_secs_f64());

        let action = ctx
            .decision
            .as_ref()
            .map(|d| d.action.as_str())
            .unwrap_or("-");
        info!(
            client_ip = %ctx.client_ip,
            domain = %ctx.domain,
            method = %ctx.method,
            path = %ctx.path,
            platform = %ctx.platform,
            bot_score = ctx.bot_score,
            action,
            status = ctx.response_status,
            duration_ms = duration.as_millis() as u64,
            "request completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_header_strips_control_characters() {
        assert_eq!(sanitize_header("plain reason"), "plain reason");
        assert_eq!(sanitize_header("bad\r\nreason"), "bad  reason");
        assert_eq!(sanitize_header("tab\there"), "tab here");
    }

    #[test]
    fn metrics_register_without_conflicts() {
        // Duplicate registrations panic inside new(); constructing the set
        // and ticking a counter is the regression test.
        let metrics = ShieldMetrics::new();
        metrics.requests_total.inc();
        assert_eq!(metrics.requests_total.get(), 1);
    }
}
