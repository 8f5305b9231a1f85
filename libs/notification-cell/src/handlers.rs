use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::{actor_for, require_manager, require_reception};

use crate::services::NotificationScheduler;

pub struct NotificationState {
    pub config: Arc<AppConfig>,
    pub scheduler: Arc<NotificationScheduler>,
}

#[axum::debug_handler]
pub async fn list_for_appointment(
    State(state): State<Arc<NotificationState>>,
    Path(appointment_id): Path<i64>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_reception(&actor_for(&user)?)?;
    let notifications = state.scheduler.list_for_appointment(appointment_id).await?;
    Ok(Json(json!(notifications)))
}

/// Runs a reminder sweep now instead of waiting for the next tick.
#[axum::debug_handler]
pub async fn run_sweep(
    State(state): State<Arc<NotificationState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_manager(&actor_for(&user)?)?;
    let reports = state.scheduler.dispatch_due().await?;
    Ok(Json(json!({
        "dispatched": reports.len(),
        "results": reports,
    })))
}
