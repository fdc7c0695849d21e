use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Map, Value};
use tracing::{instrument, warn};

use super::api::AppState;

/// Liveness text served at `/`
pub async fn root() -> &'static str {
    "Kitchen-Cloud server is running"
}

/// Health check endpoint handler; pings every collection
#[instrument(name = "health_check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let mut statuses = state.catalog.check_stores().await;
    statuses.extend(state.reviews.check_stores().await);

    let mut collections = Map::new();
    let mut healthy = true;
    for (collection, status) in statuses {
        let entry = match status {
            Ok(()) => json!("ok"),
            Err(e) => {
                warn!(collection = %collection, error = %e, "Store ping failed");
                healthy = false;
                json!(e.to_string())
            }
        };
        collections.insert(collection.to_string(), entry);
    }

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if healthy { "healthy" } else { "degraded" },
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "collections": collections,
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}
