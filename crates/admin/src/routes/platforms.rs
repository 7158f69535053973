use axum::Json;
use botshield_platform::PlatformId;
use serde_json::{json, Value};

/// GET /api/platforms
///
/// Supported platforms with their static cost/risk configs, in detection
/// precedence order.
pub async fn list_platforms() -> Json<Value> {
    let platforms: Vec<Value> = PlatformId::all()
        .iter()
        .map(|platform| {
            let config = platform.config();
            json!({
                "id": platform,
                "display_name": config.display_name,
                "cost_per_gb": config.cost_per_gb,
                "cost_per_request": config.cost_per_request,
                "common_paths": config.common_paths,
                "risky_paths": config.risky_paths,
                "description": config.description,
            })
        })
        .collect();

    Json(json!({ "platforms": platforms }))
}
