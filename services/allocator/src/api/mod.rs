//! HTTP surface: probes at the root, allocation endpoints under
//! `/api/allocations`.

mod allocations;
pub mod error;
mod health;
pub mod request_context;

use axum::{
    http::{header, HeaderName, Method},
    middleware, Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let request_id = HeaderName::from_static(request_context::REQUEST_ID_HEADER);
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, request_id.clone()])
        .expose_headers([request_id])
        .allow_origin(Any);

    Router::new()
        .merge(health::routes())
        .nest("/api/allocations", allocations::routes())
        .layer(middleware::from_fn(request_context::propagate_request_id))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
