use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

use availability_cell::AvailabilityError;
use shared_models::error::AppError;

use crate::models::{AppointmentState, Origin};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppointmentError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Origin {origin} cannot be used by {actor}")]
    InvalidOrigin { origin: Origin, actor: String },

    #[error("Invalid actor: {0}")]
    InvalidActor(String),

    #[error("Slot {date} {time} is not available for physician {physician_id}")]
    SlotUnavailable {
        physician_id: i64,
        date: NaiveDate,
        time: NaiveTime,
    },

    #[error("Appointment not found: {0}")]
    NotFound(String),

    #[error("Cannot {event} an appointment that is {from}")]
    InvalidTransition { from: AppointmentState, event: String },

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Failures reported by an appointment store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Slot {date} {time} already taken for physician {physician_id}")]
    SlotTaken {
        physician_id: i64,
        date: NaiveDate,
        time: NaiveTime,
    },

    #[error("Appointment is {actual}, expected {expected}")]
    StateChanged {
        expected: AppointmentState,
        actual: AppointmentState,
    },

    #[error("{0}")]
    Backend(String),
}

impl From<StoreError> for AppointmentError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::SlotTaken { physician_id, date, time } => {
                AppointmentError::SlotUnavailable { physician_id, date, time }
            }
            StoreError::StateChanged { actual, .. } => AppointmentError::InvalidTransition {
                from: actual,
                event: "update".to_string(),
            },
            StoreError::Backend(msg) => AppointmentError::Storage(msg),
        }
    }
}

impl From<AvailabilityError> for AppointmentError {
    fn from(error: AvailabilityError) -> Self {
        match error {
            AvailabilityError::InvalidRequest(msg) => AppointmentError::InvalidRequest(msg),
            other => AppointmentError::Storage(other.to_string()),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(error: AppointmentError) -> Self {
        let message = error.to_string();
        match error {
            AppointmentError::InvalidRequest(_) => AppError::BadRequest(message),
            AppointmentError::InvalidOrigin { .. } | AppointmentError::InvalidActor(_) => {
                AppError::Forbidden(message)
            }
            AppointmentError::SlotUnavailable { .. } | AppointmentError::InvalidTransition { .. } => {
                AppError::Conflict(message)
            }
            AppointmentError::NotFound(_) => AppError::NotFound(message),
            AppointmentError::Storage(_) => AppError::Database(message),
        }
    }
}
