use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{Json, Response},
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::models::TokenResponse;
use crate::services::{token_from_header, TokenService};

use super::api::AppState;

/// Issue an access token for an arbitrary JSON object payload
#[instrument(name = "issue_token", skip(state, payload))]
pub async fn issue_token(
    State(state): State<AppState>,
    Json(payload): Json<Map<String, Value>>,
) -> Result<Json<TokenResponse>, (StatusCode, Json<Value>)> {
    match state.tokens.issue(payload) {
        Ok(token) => {
            info!("Access token issued");
            Ok(Json(TokenResponse { token }))
        }
        Err(err) => {
            error!("Failed to issue access token: {}", err);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to issue token",
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                })),
            ))
        }
    }
}

/// Verification gate: rejects the request with 401 unless the `Authorization`
/// header carries a valid token, then exposes the decoded claims to the handler.
pub async fn require_token(
    State(tokens): State<Arc<TokenService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<Value>)> {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let claims = token_from_header(header)
        .and_then(|token| tokens.verify(token))
        .map_err(|err| {
            warn!(reason = %err, "Rejected unauthenticated request");
            unauthorized()
        })?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": "unauthorized access" })),
    )
}
