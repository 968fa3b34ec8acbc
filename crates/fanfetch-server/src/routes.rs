use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::admission::limit_in_flight;
use crate::dto::{FetchRequest, FetchResponse, HealthResponse};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/", post(fetch_urls))
        .route("/v1/fetch", post(fetch_urls))
        .layer(middleware::from_fn_with_state(
            state.gate.clone(),
            limit_in_flight,
        ));

    let public = Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(api).with_state(state)
}

// ---------------------------------------------------------------------------
// Fetch
// ---------------------------------------------------------------------------

/// Fetch every URL concurrently and return the bodies keyed by URL.
///
/// Also served at `POST /`. The first failing URL fails the whole request.
#[utoipa::path(
    post,
    path = "/v1/fetch",
    request_body = FetchRequest,
    responses(
        (status = 200, description = "Body of every requested URL", body = FetchResponse),
        (status = 400, description = "Too many or invalid URLs", body = crate::dto::ErrorResponse),
        (status = 429, description = "Too many requests in flight", body = crate::dto::ErrorResponse),
        (status = 502, description = "A URL could not be fetched", body = crate::dto::ErrorResponse),
        (status = 503, description = "Server shutting down", body = crate::dto::ErrorResponse),
        (status = 504, description = "Batch deadline exceeded", body = crate::dto::ErrorResponse),
    ),
    tag = "fetch"
)]
pub async fn fetch_urls(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<FetchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    body.validate(state.max_urls)?;

    let cancel = state.shutdown.child_token();
    let results = state
        .batch
        .fetch_batch_within(&cancel, state.batch_timeout, &body.urls)
        .await?;

    Ok(axum::Json(FetchResponse::from(results)))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    axum::Json(HealthResponse {
        status: "healthy",
        in_flight: state.gate.in_flight(),
        max_in_flight: state.gate.ceiling(),
    })
}
