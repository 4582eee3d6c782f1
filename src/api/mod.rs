pub mod error;
pub mod routes;

pub use error::{ApiError, status_for};
pub use routes::{
    DistributionsResponse, InvalidationRequest, InvalidationResponse, create_invalidation,
    get_invalidation, healthz, list_distributions,
};

use crate::AppState;
use crate::claims::claim_auth_middleware;
use crate::metrics::{metrics_handler, track_metrics};
use crate::middleware::log_requests;
use axum::Router;
use axum::extract::Extension;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub const PATH_PREFIX: &str = "/api/v1beta1";

/// Build the full HTTP surface. Everything under [`PATH_PREFIX`] requires a
/// token; `/healthz` and `/metrics` do not.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/distributions", get(list_distributions))
        .route("/distributions/{name}/invalidations", post(create_invalidation))
        .route(
            "/distributions/{name}/invalidations/{id}",
            get(get_invalidation),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.claim_state.clone(),
            claim_auth_middleware,
        ));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .nest(PATH_PREFIX, api)
        .layer(axum::middleware::from_fn_with_state(
            state.metrics.clone(),
            track_metrics,
        ))
        .layer(axum::middleware::from_fn(log_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(Extension(state))
}
