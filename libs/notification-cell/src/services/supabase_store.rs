use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DatabaseError, SupabaseClient};

use crate::error::NotificationError;
use crate::models::{NewNotification, Notification, NotificationKind};
use crate::services::store::NotificationStore;

const TABLE: &str = "/rest/v1/appointment_notifications";

pub struct SupabaseNotificationStore {
    supabase: SupabaseClient,
}

impl SupabaseNotificationStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn fetch(&self, path: String) -> Result<Vec<Notification>, NotificationError> {
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(storage)?;
        rows.into_iter().map(decode).collect()
    }

    async fn patch_one(&self, id: Uuid, body: Value) -> Result<Notification, NotificationError> {
        let path = format!("{}?id=eq.{}", TABLE, id);
        let rows = self
            .supabase
            .request_returning(Method::PATCH, &path, None, Some(body))
            .await
            .map_err(storage)?;
        rows.into_iter()
            .next()
            .ok_or(NotificationError::NotFound(id))
            .and_then(decode)
    }
}

fn storage(error: DatabaseError) -> NotificationError {
    NotificationError::Storage(error.to_string())
}

fn decode(row: Value) -> Result<Notification, NotificationError> {
    serde_json::from_value(row).map_err(|e| NotificationError::Storage(format!("bad notification row: {}", e)))
}

// PostgREST filters need the `Z` form; `+00:00` would be read as a space.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl NotificationStore for SupabaseNotificationStore {
    async fn insert(&self, notification: NewNotification) -> Result<Notification, NotificationError> {
        let body = json!({
            "id": Uuid::new_v4(),
            "appointment_id": notification.appointment_id,
            "kind": notification.kind,
            "recipient": notification.recipient,
            "subject": notification.subject,
            "body": notification.body,
            "state": "pending",
            "scheduled_for": notification.scheduled_for.as_ref().map(timestamp),
            "created_at": timestamp(&Utc::now()),
        });
        let rows = self
            .supabase
            .request_returning(Method::POST, TABLE, None, Some(body))
            .await
            .map_err(storage)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| NotificationError::Storage("insert returned no rows".to_string()))
            .and_then(decode)
    }

    async fn exists(
        &self,
        appointment_id: i64,
        kind: NotificationKind,
        scheduled_for: Option<DateTime<Utc>>,
    ) -> Result<bool, NotificationError> {
        let scheduled = match scheduled_for {
            Some(at) => format!("eq.{}", timestamp(&at)),
            None => "is.null".to_string(),
        };
        let path = format!(
            "{}?appointment_id=eq.{}&kind=eq.{}&scheduled_for={}&state=eq.pending&select=id",
            TABLE, appointment_id, kind, scheduled
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(storage)?;
        Ok(!rows.is_empty())
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<Notification>, NotificationError> {
        self.fetch(format!(
            "{}?state=eq.pending&scheduled_for=lte.{}&order=scheduled_for.asc",
            TABLE,
            timestamp(&now)
        ))
        .await
    }

    async fn list_for_appointment(&self, appointment_id: i64) -> Result<Vec<Notification>, NotificationError> {
        self.fetch(format!(
            "{}?appointment_id=eq.{}&order=created_at.asc",
            TABLE, appointment_id
        ))
        .await
    }

    async fn mark_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<Notification, NotificationError> {
        self.patch_one(id, json!({"state": "sent", "sent_at": timestamp(&at), "error_detail": null}))
            .await
    }

    async fn mark_failed(&self, id: Uuid, detail: &str) -> Result<Notification, NotificationError> {
        self.patch_one(id, json!({"state": "failed", "error_detail": detail})).await
    }
}
