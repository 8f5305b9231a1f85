use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::handlers::AppointmentCellState;
use appointment_cell::router::appointment_routes;
use availability_cell::handlers::AvailabilityState;
use availability_cell::router::availability_routes;
use notification_cell::handlers::NotificationState;
use notification_cell::router::notification_routes;
use shared_config::AppConfig;

use crate::wiring::Services;

pub fn create_router(config: Arc<AppConfig>, services: &Services) -> Router {
    let availability = Arc::new(AvailabilityState {
        config: config.clone(),
        service: services.availability.clone(),
    });
    let appointments = Arc::new(AppointmentCellState {
        config: config.clone(),
        booking: services.booking.clone(),
    });
    let notifications = Arc::new(NotificationState {
        config,
        scheduler: services.notifications.clone(),
    });

    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/appointments", appointment_routes(appointments))
        .nest("/availability", availability_routes(availability))
        .nest("/notifications", notification_routes(notifications))
}
