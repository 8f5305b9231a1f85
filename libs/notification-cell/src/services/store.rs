use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::NotificationError;
use crate::models::{NewNotification, Notification, NotificationKind, NotificationState};

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, notification: NewNotification) -> Result<Notification, NotificationError>;

    /// Duplicate guard: a still pending record for the same appointment,
    /// kind and scheduled instant.
    async fn exists(
        &self,
        appointment_id: i64,
        kind: NotificationKind,
        scheduled_for: Option<DateTime<Utc>>,
    ) -> Result<bool, NotificationError>;

    /// Pending notifications whose scheduled instant is at or before `now`,
    /// oldest first.
    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<Notification>, NotificationError>;

    async fn list_for_appointment(&self, appointment_id: i64) -> Result<Vec<Notification>, NotificationError>;

    async fn mark_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<Notification, NotificationError>;

    async fn mark_failed(&self, id: Uuid, detail: &str) -> Result<Notification, NotificationError>;
}

#[derive(Default)]
pub struct InMemoryNotificationStore {
    rows: Mutex<Vec<Notification>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn insert(&self, notification: NewNotification) -> Result<Notification, NotificationError> {
        let row = Notification {
            id: Uuid::new_v4(),
            appointment_id: notification.appointment_id,
            kind: notification.kind,
            recipient: notification.recipient,
            subject: notification.subject,
            body: notification.body,
            state: NotificationState::Pending,
            scheduled_for: notification.scheduled_for,
            sent_at: None,
            error_detail: None,
            created_at: Utc::now(),
        };
        self.rows.lock().await.push(row.clone());
        Ok(row)
    }

    async fn exists(
        &self,
        appointment_id: i64,
        kind: NotificationKind,
        scheduled_for: Option<DateTime<Utc>>,
    ) -> Result<bool, NotificationError> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .any(|n| {
                n.state == NotificationState::Pending
                    && n.appointment_id == appointment_id
                    && n.kind == kind
                    && n.scheduled_for == scheduled_for
            }))
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<Notification>, NotificationError> {
        let rows = self.rows.lock().await;
        let mut due: Vec<Notification> = rows
            .iter()
            .filter(|n| n.state == NotificationState::Pending)
            .filter(|n| n.scheduled_for.map_or(false, |at| at <= now))
            .cloned()
            .collect();
        due.sort_by_key(|n| n.scheduled_for);
        Ok(due)
    }

    async fn list_for_appointment(&self, appointment_id: i64) -> Result<Vec<Notification>, NotificationError> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .filter(|n| n.appointment_id == appointment_id)
            .cloned()
            .collect())
    }

    async fn mark_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<Notification, NotificationError> {
        let mut rows = self.rows.lock().await;
        let row = rows
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(NotificationError::NotFound(id))?;
        row.state = NotificationState::Sent;
        row.sent_at = Some(at);
        row.error_detail = None;
        Ok(row.clone())
    }

    async fn mark_failed(&self, id: Uuid, detail: &str) -> Result<Notification, NotificationError> {
        let mut rows = self.rows.lock().await;
        let row = rows
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(NotificationError::NotFound(id))?;
        row.state = NotificationState::Failed;
        row.error_detail = Some(detail.to_string());
        Ok(row.clone())
    }
}
