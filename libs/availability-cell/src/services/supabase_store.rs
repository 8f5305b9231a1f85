use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::{DatabaseError, SupabaseClient};
use shared_models::formats::format_time;

use crate::error::AvailabilityError;
use crate::models::{AvailabilityWindow, DayOfWeek};
use crate::services::store::{AvailabilityStore, WindowDraft};

const TABLE: &str = "/rest/v1/availability_windows";
const ORDER: &str = "order=physician_id.asc,day_of_week.asc,start_time.asc";

/// `availability_windows` table behind PostgREST. Day names are stored as
/// lowercase English.
pub struct SupabaseAvailabilityStore {
    supabase: SupabaseClient,
}

impl SupabaseAvailabilityStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn fetch(&self, path: String) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(storage)?;
        let mut windows = rows
            .into_iter()
            .map(decode)
            .collect::<Result<Vec<_>, _>>()?;
        // The column is text, so restore weekday order locally.
        windows.sort_by_key(|w| (w.physician_id, w.day_of_week, w.start_time, w.id));
        Ok(windows)
    }
}

fn storage(error: DatabaseError) -> AvailabilityError {
    AvailabilityError::Storage(error.to_string())
}

fn decode(row: Value) -> Result<AvailabilityWindow, AvailabilityError> {
    serde_json::from_value(row).map_err(|e| AvailabilityError::Storage(format!("bad window row: {}", e)))
}

fn body(draft: &WindowDraft) -> Value {
    json!({
        "physician_id": draft.physician_id,
        "day_of_week": draft.day_of_week,
        "start_time": format_time(&draft.start_time),
        "end_time": format_time(&draft.end_time),
    })
}

#[async_trait]
impl AvailabilityStore for SupabaseAvailabilityStore {
    async fn list_all(&self) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        self.fetch(format!("{}?{}", TABLE, ORDER)).await
    }

    async fn list_for_physician(&self, physician_id: i64) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        self.fetch(format!("{}?physician_id=eq.{}&{}", TABLE, physician_id, ORDER)).await
    }

    async fn list_for_day(
        &self,
        physician_id: i64,
        day: DayOfWeek,
    ) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        self.fetch(format!(
            "{}?physician_id=eq.{}&day_of_week=eq.{}&{}",
            TABLE, physician_id, day, ORDER
        ))
        .await
    }

    async fn get(&self, id: i64) -> Result<Option<AvailabilityWindow>, AvailabilityError> {
        Ok(self.fetch(format!("{}?id=eq.{}", TABLE, id)).await?.into_iter().next())
    }

    async fn insert(&self, draft: WindowDraft) -> Result<AvailabilityWindow, AvailabilityError> {
        debug!("Inserting availability window for physician {}", draft.physician_id);
        let rows = self
            .supabase
            .request_returning(Method::POST, TABLE, None, Some(body(&draft)))
            .await
            .map_err(storage)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| AvailabilityError::Storage("insert returned no rows".to_string()))?;
        decode(row)
    }

    async fn update(&self, id: i64, draft: WindowDraft) -> Result<Option<AvailabilityWindow>, AvailabilityError> {
        let path = format!("{}?id=eq.{}", TABLE, id);
        let rows = self
            .supabase
            .request_returning(Method::PATCH, &path, None, Some(body(&draft)))
            .await
            .map_err(storage)?;
        rows.into_iter().next().map(decode).transpose()
    }

    async fn delete(&self, id: i64) -> Result<bool, AvailabilityError> {
        let path = format!("{}?id=eq.{}", TABLE, id);
        let rows = self
            .supabase
            .request_returning(Method::DELETE, &path, None, None)
            .await
            .map_err(storage)?;
        Ok(!rows.is_empty())
    }
}
