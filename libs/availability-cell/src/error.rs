use chrono::NaiveTime;
use thiserror::Error;

use shared_models::error::AppError;

use crate::models::DayOfWeek;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AvailabilityError {
    #[error("Invalid availability request: {0}")]
    InvalidRequest(String),

    #[error("Availability window {0} not found")]
    NotFound(i64),

    #[error("Window {day} {start}-{end} overlaps window {existing_id}")]
    Overlap {
        existing_id: i64,
        day: DayOfWeek,
        start: NaiveTime,
        end: NaiveTime,
    },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<AvailabilityError> for AppError {
    fn from(error: AvailabilityError) -> Self {
        match error {
            AvailabilityError::InvalidRequest(msg) => AppError::BadRequest(msg),
            AvailabilityError::NotFound(_) => AppError::NotFound(error.to_string()),
            AvailabilityError::Overlap { .. } => AppError::Conflict(error.to_string()),
            AvailabilityError::Storage(msg) => AppError::Database(msg),
        }
    }
}
