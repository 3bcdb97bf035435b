use attache_protocol::endpoints;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with all Attaché endpoints.
///
/// Request bodies larger than `max_body_size` are rejected.
pub fn build_router(state: AppState, max_body_size: usize) -> Router {
    Router::new()
        .route(endpoints::HEALTH, get(handler::health_handler))
        .route(endpoints::INFO, get(handler::info_handler))
        .route(
            endpoints::CONTENT,
            get(handler::read_handler)
                .head(handler::read_handler)
                .put(handler::put_handler)
                .post(handler::post_handler)
                .delete(handler::delete_handler),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
