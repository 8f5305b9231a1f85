use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NotificationError {
    #[error("Notification not found: {0}")]
    NotFound(Uuid),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid notification: {0}")]
    Invalid(String),
}

impl From<NotificationError> for AppError {
    fn from(error: NotificationError) -> Self {
        let message = error.to_string();
        match error {
            NotificationError::NotFound(_) => AppError::NotFound(message),
            NotificationError::Delivery(_) => AppError::ExternalService(message),
            NotificationError::Storage(_) => AppError::Database(message),
            NotificationError::Invalid(_) => AppError::BadRequest(message),
        }
    }
}
