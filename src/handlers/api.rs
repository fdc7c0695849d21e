use axum::{
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post, put},
    Extension, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::models::{
    DeleteResult, Document, EditReviewRequest, InsertOneResult, Pagination, ServiceError,
    ServicesPage, TokenClaims, UpdateResult,
};
use crate::observability::{DatabaseTracingMiddleware, Metrics};
use crate::repositories::{DocumentRepository, InstrumentedRepository};
use crate::services::{CatalogService, ReviewService, TokenService};

use super::auth::{issue_token, require_token};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;

/// Shared application state containing all services
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogService>,
    pub reviews: Arc<ReviewService>,
    pub tokens: Arc<TokenService>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Wire the services over the three collections. Every store call is traced and metered.
    pub fn new(
        services: Arc<dyn DocumentRepository>,
        reviews: Arc<dyn DocumentRepository>,
        food: Arc<dyn DocumentRepository>,
        tokens: Arc<TokenService>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let tracer = DatabaseTracingMiddleware::new(metrics.clone());
        let traced = |repository: Arc<dyn DocumentRepository>| -> Arc<dyn DocumentRepository> {
            Arc::new(InstrumentedRepository::new(repository, tracer.clone()))
        };

        Self {
            catalog: Arc::new(CatalogService::new(traced(services), traced(food))),
            reviews: Arc::new(ReviewService::new(traced(reviews))),
            tokens,
            metrics,
        }
    }
}

impl FromRef<AppState> for Arc<Metrics> {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

/// Raw `page`/`size` values; parsing is lenient so nothing is rejected here
#[derive(Debug, Deserialize)]
pub struct ServicesQuery {
    pub page: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewsQuery {
    pub email: Option<String>,
}

/// Create API router with all endpoints
pub fn create_api_router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/reviews", get(list_reviews))
        .route_layer(middleware::from_fn_with_state(
            state.tokens.clone(),
            require_token,
        ));

    Router::new()
        .route("/jwt", post(issue_token))
        .route("/services", get(list_services))
        .route("/services/:id", get(get_service))
        .route("/foodlist", get(list_food))
        .route("/addservice", post(add_service))
        .route("/review", post(add_review))
        .route("/review/:id", get(get_review).delete(delete_review))
        .route("/myreview/:id", put(update_review))
        .merge(protected)
}

// =============================================================================
// SERVICE ENDPOINTS
// =============================================================================

/// One page of services with the estimated total
#[instrument(name = "list_services", skip(state), fields(
    page = query.page.as_deref(),
    size = query.size.as_deref(),
))]
pub async fn list_services(
    State(state): State<AppState>,
    Query(query): Query<ServicesQuery>,
) -> ApiResult<ServicesPage> {
    let pagination = Pagination::from_query(query.page.as_deref(), query.size.as_deref());

    match state.catalog.list_services(pagination).await {
        Ok(page) => Ok(Json(page)),
        Err(err) => {
            crate::error_with_trace!("Failed to list services: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

/// A single service, or `null` when absent
#[instrument(name = "get_service", skip(state), fields(id = %id))]
pub async fn get_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Option<Document>> {
    state
        .catalog
        .get_service(&id)
        .await
        .map(Json)
        .map_err(|err| {
            crate::error_with_trace!("Failed to get service: {}", err);
            service_error_to_response(err)
        })
}

#[instrument(name = "add_service", skip(state, service))]
pub async fn add_service(
    State(state): State<AppState>,
    Json(service): Json<Document>,
) -> ApiResult<InsertOneResult> {
    state
        .catalog
        .add_service(service)
        .await
        .map(Json)
        .map_err(|err| {
            crate::error_with_trace!("Failed to add service: {}", err);
            service_error_to_response(err)
        })
}

#[instrument(name = "list_food", skip(state))]
pub async fn list_food(State(state): State<AppState>) -> ApiResult<Vec<Document>> {
    state.catalog.list_food().await.map(Json).map_err(|err| {
        crate::error_with_trace!("Failed to list food: {}", err);
        service_error_to_response(err)
    })
}

// =============================================================================
// REVIEW ENDPOINTS
// =============================================================================

/// Looks the id up among services, not reviews
#[instrument(name = "get_review", skip(state), fields(id = %id))]
pub async fn get_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Option<Document>> {
    state
        .catalog
        .get_review_by_id(&id)
        .await
        .map(Json)
        .map_err(|err| {
            crate::error_with_trace!("Failed to get review: {}", err);
            service_error_to_response(err)
        })
}

/// Reviews for the requested email; requires a token carrying the same email
#[instrument(name = "list_reviews", skip(state, claims), fields(email = query.email.as_deref()))]
pub async fn list_reviews(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Query(query): Query<ReviewsQuery>,
) -> ApiResult<Vec<Document>> {
    let requested = query.email.as_deref();

    if !ReviewService::may_list(&claims, requested) {
        crate::warn_with_trace!(token_email = claims.email(), "Review listing forbidden");
        state.metrics.record_review_access(false);
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({ "message": "Forbidden access" })),
        ));
    }
    state.metrics.record_review_access(true);

    match state.reviews.list_reviews(requested).await {
        Ok(reviews) => {
            info!("Successfully listed {} reviews", reviews.len());
            Ok(Json(reviews))
        }
        Err(err) => {
            crate::error_with_trace!("Failed to list reviews: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

#[instrument(name = "add_review", skip(state, review))]
pub async fn add_review(
    State(state): State<AppState>,
    Json(review): Json<Document>,
) -> ApiResult<InsertOneResult> {
    state
        .reviews
        .add_review(review)
        .await
        .map(Json)
        .map_err(|err| {
            crate::error_with_trace!("Failed to add review: {}", err);
            service_error_to_response(err)
        })
}

/// Replace the message of a review; every other field is left alone
#[instrument(name = "update_review", skip(state, request), fields(id = %id))]
pub async fn update_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<EditReviewRequest>,
) -> ApiResult<UpdateResult> {
    state
        .reviews
        .update_message(&id, request.message)
        .await
        .map(Json)
        .map_err(|err| {
            crate::error_with_trace!("Failed to update review: {}", err);
            service_error_to_response(err)
        })
}

#[instrument(name = "delete_review", skip(state), fields(id = %id))]
pub async fn delete_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<DeleteResult> {
    state
        .reviews
        .delete_review(&id)
        .await
        .map(Json)
        .map_err(|err| {
            crate::error_with_trace!("Failed to delete review: {}", err);
            service_error_to_response(err)
        })
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Every service failure, malformed identifiers included, is a server error
fn service_error_to_response(err: ServiceError) -> (StatusCode, Json<Value>) {
    let message = match &err {
        ServiceError::InvalidIdentifier { .. } => err.to_string(),
        ServiceError::Repository { .. } => "Internal server error".to_string(),
    };

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}
