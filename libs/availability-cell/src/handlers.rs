use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::{actor_for, require_manager};

use crate::models::{CreateWindowRequest, UpdateWindowRequest};
use crate::services::AvailabilityService;

pub struct AvailabilityState {
    pub config: Arc<AppConfig>,
    pub service: Arc<AvailabilityService>,
}

fn ensure_manager(user: &User) -> Result<(), AppError> {
    require_manager(&actor_for(user)?)
}

#[axum::debug_handler]
pub async fn list_windows(
    State(state): State<Arc<AvailabilityState>>,
) -> Result<Json<Value>, AppError> {
    let windows = state.service.list_all().await?;
    Ok(Json(json!(windows)))
}

#[axum::debug_handler]
pub async fn get_window(
    State(state): State<Arc<AvailabilityState>>,
    Path(window_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let window = state.service.get_window(window_id).await?;
    Ok(Json(json!(window)))
}

#[axum::debug_handler]
pub async fn list_physician_windows(
    State(state): State<Arc<AvailabilityState>>,
    Path(physician_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let windows = state.service.list_for_physician(physician_id).await?;
    Ok(Json(json!(windows)))
}

#[axum::debug_handler]
pub async fn create_window(
    State(state): State<Arc<AvailabilityState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateWindowRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    ensure_manager(&user)?;
    let window = state.service.create_window(request).await?;
    Ok((StatusCode::CREATED, Json(json!(window))))
}

#[axum::debug_handler]
pub async fn update_window(
    State(state): State<Arc<AvailabilityState>>,
    Path(window_id): Path<i64>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateWindowRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_manager(&user)?;
    let window = state.service.update_window(window_id, request).await?;
    Ok(Json(json!(window)))
}

#[axum::debug_handler]
pub async fn delete_window(
    State(state): State<Arc<AvailabilityState>>,
    Path(window_id): Path<i64>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_manager(&user)?;
    state.service.delete_window(window_id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Availability window deleted"
    })))
}
