use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::state::SharedState;

/// Query parameters for the stats endpoint.
#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub domain: Option<String>,
    #[serde(default = "default_days")]
    pub days: u32,
}

fn default_days() -> u32 {
    7
}

/// GET /api/stats?domain=example.com&days=7
///
/// Aggregated stats for a domain over the requested window, with the
/// domain's inferred platform config attached for the dashboard.
pub async fn get_stats(
    State(state): State<SharedState>,
    Query(params): Query<StatsQuery>,
) -> impl IntoResponse {
    let Some(domain) = params.domain else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "status": "error",
                "message": "domain parameter required"
            })),
        );
    };

    let days = params.days.clamp(1, 365);
    let stats = state.aggregator.get_stats(&domain, days).await;

    // Hostname-only inference: the dashboard has no request headers to offer.
    let platform = botshield_platform::detect(&domain, &[]);

    (
        StatusCode::OK,
        Json(json!({
            "stats": stats,
            "platform": platform,
            "platform_config": platform.config()
        })),
    )
}

/// Query parameters for the realtime endpoint.
#[derive(Debug, Deserialize)]
pub struct RealtimeQuery {
    pub domain: Option<String>,
}

/// GET /api/realtime?domain=example.com
///
/// Running-counter snapshot: cumulative totals and block rate.
pub async fn get_realtime(
    State(state): State<SharedState>,
    Query(params): Query<RealtimeQuery>,
) -> impl IntoResponse {
    let Some(domain) = params.domain else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "status": "error",
                "message": "domain parameter required"
            })),
        );
    };

    let realtime = state.aggregator.get_realtime(&domain).await;
    (StatusCode::OK, Json(json!(realtime)))
}
