use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, AppointmentCellState};

pub fn appointment_routes(state: Arc<AppointmentCellState>) -> Router {
    // Patient portal: tokens optional, actor resolved per request
    let public_routes = Router::new()
        .route("/", post(handlers::create_appointment))
        .route("/tracking/{tracking_code}", get(handlers::get_by_tracking_code))
        .route("/tracking/{tracking_code}/cancel", put(handlers::cancel_appointment))
        .route("/physicians/{physician_id}/slots", get(handlers::get_available_slots));

    let protected_routes = Router::new()
        .route("/", get(handlers::list_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/confirm", put(handlers::confirm_appointment))
        .route("/{appointment_id}/reassign", put(handlers::reassign_appointment))
        .route("/{appointment_id}/state", put(handlers::overwrite_state))
        .route("/{appointment_id}/complete", put(handlers::complete_appointment))
        .route("/physicians/{physician_id}/agenda", get(handlers::get_physician_agenda))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
