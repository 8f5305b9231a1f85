use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, NotificationState};

pub fn notification_routes(state: Arc<NotificationState>) -> Router {
    Router::new()
        .route("/appointments/{appointment_id}", get(handlers::list_for_appointment))
        .route("/sweep", post(handlers::run_sweep))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
