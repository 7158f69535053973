use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use botshield_platform::PlatformId;
use serde::Deserialize;
use serde_json::json;

use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct SavingsQuery {
    pub domain: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
}

/// GET /api/savings?domain=example.com&platform=vercel
///
/// 30-day savings report priced with the named platform's cost figures.
/// An unrecognized or omitted platform falls back to the generic default
/// entry.
pub async fn get_savings(
    State(state): State<SharedState>,
    Query(params): Query<SavingsQuery>,
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

    let platform = params
        .platform
        .as_deref()
        .map(|p| p.parse().unwrap_or(PlatformId::Unknown))
        .unwrap_or(PlatformId::Unknown);

    let report = state.aggregator.get_savings_report(&domain, platform).await;
    (StatusCode::OK, Json(json!(report)))
}
