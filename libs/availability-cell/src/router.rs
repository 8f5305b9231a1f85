use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, AvailabilityState};

pub fn availability_routes(state: Arc<AvailabilityState>) -> Router {
    let public_routes = Router::new()
        .route("/", get(handlers::list_windows))
        .route("/{window_id}", get(handlers::get_window))
        .route("/physicians/{physician_id}", get(handlers::list_physician_windows));

    let protected_routes = Router::new()
        .route("/", post(handlers::create_window))
        .route("/{window_id}", put(handlers::update_window).delete(handlers::delete_window))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
