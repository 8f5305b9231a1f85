use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::{Actor, User};
use shared_models::error::AppError;
use shared_models::formats::format_time;
use shared_utils::extractor::{actor_for, optional_actor, require_reception};

use crate::models::{
    AppointmentFilter, AppointmentState, AvailableSlotsResponse, CancelAppointmentRequest,
    CancelledBy, ConfirmAppointmentRequest, CreateAppointmentRequest, CreationRequest,
    OverwriteStateRequest, ReassignAppointmentRequest, SlotQuery,
};
use crate::services::AppointmentBookingService;

pub struct AppointmentCellState {
    pub config: Arc<AppConfig>,
    pub booking: Arc<AppointmentBookingService>,
}

type OptionalBearer = Option<TypedHeader<Authorization<Bearer>>>;

// ==============================================================================
// PUBLIC PORTAL
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    auth: OptionalBearer,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let actor = optional_actor(auth, &state.config)?;
    let request = CreationRequest::try_from(request)?;

    let appointment = state.booking.create(actor, request).await?;
    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

#[axum::debug_handler]
pub async fn get_by_tracking_code(
    State(state): State<Arc<AppointmentCellState>>,
    Path(tracking_code): Path<String>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.booking.find_by_tracking_code(&tracking_code).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(tracking_code): Path<String>,
    auth: OptionalBearer,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let cancelled_by = CancelledBy::parse(&request.cancelled_by)?;
    let actor = optional_actor(auth, &state.config)?;

    let appointment = state.booking.cancel(actor, &tracking_code, cancelled_by).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppointmentCellState>>,
    Path(physician_id): Path<i64>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<AvailableSlotsResponse>, AppError> {
    let slots = state.booking.available_slots(physician_id, query.date).await?;
    Ok(Json(AvailableSlotsResponse {
        physician_id,
        date: query.date,
        slots: slots.iter().map(format_time).collect(),
    }))
}

// ==============================================================================
// STAFF
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppointmentCellState>>,
    Extension(user): Extension<User>,
    Query(filter): Query<AppointmentFilter>,
) -> Result<Json<Value>, AppError> {
    require_reception(&actor_for(&user)?)?;
    let appointments = state.booking.list(&filter).await?;
    Ok(Json(json!(appointments)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<i64>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_for(&user)?;
    let appointment = state.booking.get(appointment_id).await?;

    match actor {
        Actor::Reception | Actor::Manager => {}
        Actor::Physician { physician_id } if appointment.physician_id == Some(physician_id) => {}
        other => {
            return Err(AppError::Forbidden(format!("{} cannot read this appointment", other)));
        }
    }
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<i64>,
    Extension(user): Extension<User>,
    Json(request): Json<ConfirmAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_for(&user)?;
    let appointment = state.booking.confirm(actor, appointment_id, request).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn reassign_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<i64>,
    Extension(user): Extension<User>,
    Json(request): Json<ReassignAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_for(&user)?;
    let appointment = state.booking.reassign(actor, appointment_id, request).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn overwrite_state(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<i64>,
    Extension(user): Extension<User>,
    Json(request): Json<OverwriteStateRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_for(&user)?;
    let new_state: AppointmentState = request.state.parse()?;

    let appointment = state.booking.overwrite_state(actor, appointment_id, new_state).await?;
    Ok(Json(json!({
        "message": "Appointment state updated",
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<i64>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_for(&user)?;
    let appointment = state.booking.complete(actor, appointment_id).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_physician_agenda(
    State(state): State<Arc<AppointmentCellState>>,
    Path(physician_id): Path<i64>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    match actor_for(&user)? {
        Actor::Reception | Actor::Manager => {}
        Actor::Physician { physician_id: own } if own == physician_id => {}
        other => {
            return Err(AppError::Forbidden(format!("{} cannot read this agenda", other)));
        }
    }

    let agenda = state.booking.physician_agenda(physician_id).await?;
    Ok(Json(json!(agenda)))
}
