use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use botshield_common::ShieldError;
use botshield_rules::Rule;
use serde::Deserialize;
use serde_json::json;

use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct RulesQuery {
    pub domain: Option<String>,
}

/// GET /api/rules?domain=example.com
///
/// The domain's effective rule set. Domains without a stored set see the
/// baseline defaults, which is also what the proxy enforces for them.
pub async fn get_rules(
    State(state): State<SharedState>,
    Query(params): Query<RulesQuery>,
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

    let rules = botshield_rules::load_rules(state.policy_store.as_ref(), &domain).await;
    (StatusCode::OK, Json(json!({ "domain": domain, "rules": rules })))
}

/// Request body for replacing a domain's rule set.
#[derive(Debug, Deserialize)]
pub struct SaveRulesRequest {
    pub domain: String,
    pub rules: Vec<Rule>,
}

/// PUT /api/rules
///
/// Replaces the domain's whole rule set as one unit. The save is
/// all-or-nothing: any malformed rule rejects the request and leaves the
/// stored set untouched.
pub async fn put_rules(
    State(state): State<SharedState>,
    Json(body): Json<SaveRulesRequest>,
) -> impl IntoResponse {
    if body.domain.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "status": "error",
                "message": "domain must not be empty"
            })),
        );
    }

    match botshield_rules::save_rules(
        state.policy_store.as_ref(),
        &body.domain,
        &body.rules,
        state.max_rules,
    )
    .await
    {
        Ok(()) => {
            tracing::info!(
                domain = %body.domain,
                count = body.rules.len(),
                "rule set replaced via admin API"
            );
            (
                StatusCode::OK,
                Json(json!({
                    "status": "updated",
                    "domain": body.domain,
                    "count": body.rules.len()
                })),
            )
        }
        Err(e @ ShieldError::MalformedRule { .. }) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "status": "error",
                "message": e.to_string()
            })),
        ),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "status": "error",
                "message": e.to_string()
            })),
        ),
    }
}
