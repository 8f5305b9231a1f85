use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, error};

use shared_config::AppConfig;
use shared_database::{DatabaseError, SupabaseClient};
use shared_models::formats::format_time;

use crate::error::StoreError;
use crate::models::{Appointment, AppointmentFilter};
use crate::services::store::{AppointmentDraft, AppointmentStore, AppointmentUpdate};

const TABLE: &str = "/rest/v1/appointments";
const LIST_ORDER: &str = "order=scheduled_date.desc.nullslast,scheduled_time.asc,id.asc";

/// `appointments` table behind PostgREST.
///
/// Inserts go through the `create_appointment(draft, code_year)` function,
/// which draws `nextval('appointment_tracking_seq')` and inserts in one
/// transaction. Occupancy is guarded by the partial unique index on
/// `(physician_id, scheduled_date, scheduled_time) WHERE state <> 'cancelled'`;
/// PostgREST surfaces a violation as 409.
pub struct SupabaseAppointmentStore {
    supabase: SupabaseClient,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn fetch(&self, path: String) -> Result<Vec<Appointment>, StoreError> {
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(backend)?;
        rows.into_iter().map(decode).collect()
    }
}

fn backend(error: DatabaseError) -> StoreError {
    error!("Appointment store failure: {}", error);
    StoreError::Backend(error.to_string())
}

fn decode(row: Value) -> Result<Appointment, StoreError> {
    serde_json::from_value(row).map_err(|e| StoreError::Backend(format!("bad appointment row: {}", e)))
}

fn is_plain_code(code: &str) -> bool {
    !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn draft_body(draft: &AppointmentDraft) -> Value {
    json!({
        "patient_id": draft.patient_id,
        "physician_id": draft.physician_id,
        "request_date": draft.request_date,
        "scheduled_date": draft.scheduled_date,
        "scheduled_time": draft.scheduled_time.as_ref().map(format_time),
        "kind": draft.kind,
        "shift_preference": draft.shift_preference,
        "origin": draft.origin,
        "state": draft.state,
        "confirmation_date": draft.confirmation_date,
    })
}

fn update_body(update: &AppointmentUpdate) -> Value {
    let mut body = Map::new();
    body.insert("state".to_string(), json!(update.state));
    if let Some(id) = update.physician_id {
        body.insert("physician_id".to_string(), json!(id));
    }
    if let Some(date) = update.scheduled_date {
        body.insert("scheduled_date".to_string(), json!(date));
    }
    if let Some(time) = update.scheduled_time {
        body.insert("scheduled_time".to_string(), json!(format_time(&time)));
    }
    if let Some(date) = update.confirmation_date {
        body.insert("confirmation_date".to_string(), json!(date));
    }
    if let Some(actor) = update.cancelled_by {
        body.insert("cancelled_by".to_string(), json!(actor));
    }
    Value::Object(body)
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert(&self, draft: AppointmentDraft, year: i32) -> Result<Appointment, StoreError> {
        let args = json!({ "draft": draft_body(&draft), "code_year": year });
        let result: Result<Value, DatabaseError> = self.supabase.rpc("create_appointment", None, args).await;

        match result {
            Ok(Value::Array(rows)) => rows
                .into_iter()
                .next()
                .ok_or_else(|| StoreError::Backend("create_appointment returned no rows".to_string()))
                .and_then(decode),
            Ok(row) => decode(row),
            Err(e) if e.is_conflict() => match (draft.physician_id, draft.scheduled_date, draft.scheduled_time) {
                (Some(physician_id), Some(date), Some(time)) => {
                    Err(StoreError::SlotTaken { physician_id, date, time })
                }
                _ => Err(backend(e)),
            },
            Err(e) => Err(backend(e)),
        }
    }

    async fn get(&self, id: i64) -> Result<Option<Appointment>, StoreError> {
        Ok(self.fetch(format!("{}?id=eq.{}", TABLE, id)).await?.into_iter().next())
    }

    async fn find_by_tracking_code(&self, code: &str) -> Result<Option<Appointment>, StoreError> {
        if !is_plain_code(code) {
            return Ok(None);
        }
        Ok(self
            .fetch(format!("{}?tracking_code=eq.{}", TABLE, code))
            .await?
            .into_iter()
            .next())
    }

    async fn find_by_physician_and_date(
        &self,
        physician_id: i64,
        date: NaiveDate,
        exclude_cancelled: bool,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut path = format!(
            "{}?physician_id=eq.{}&scheduled_date=eq.{}&order=scheduled_time.asc,id.asc",
            TABLE, physician_id, date
        );
        if exclude_cancelled {
            path.push_str("&state=neq.cancelled");
        }
        self.fetch(path).await
    }

    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError> {
        let mut path = format!("{}?{}", TABLE, LIST_ORDER);
        if let Some(id) = filter.patient_id {
            path.push_str(&format!("&patient_id=eq.{}", id));
        }
        if let Some(id) = filter.physician_id {
            path.push_str(&format!("&physician_id=eq.{}", id));
        }
        if !filter.states.is_empty() {
            let states: Vec<&str> = filter.states.iter().map(|s| s.as_str()).collect();
            path.push_str(&format!("&state=in.({})", states.join(",")));
        }
        self.fetch(path).await
    }

    async fn update(&self, id: i64, update: AppointmentUpdate) -> Result<Option<Appointment>, StoreError> {
        let path = format!("{}?id=eq.{}&state=eq.{}", TABLE, id, update.expected_state);
        debug!("Updating appointment {} ({} -> {})", id, update.expected_state, update.state);

        let rows = match self
            .supabase
            .request_returning(Method::PATCH, &path, None, Some(update_body(&update)))
            .await
        {
            Ok(rows) => rows,
            Err(e) if e.is_conflict() => {
                let current = self.get(id).await?;
                let slot = current.as_ref().map(|c| update.apply(c)).and_then(|next| next.slot());
                return match slot {
                    Some((physician_id, date, time)) => Err(StoreError::SlotTaken { physician_id, date, time }),
                    None => Err(backend(e)),
                };
            }
            Err(e) => return Err(backend(e)),
        };

        if let Some(row) = rows.into_iter().next() {
            return decode(row).map(Some);
        }

        // Nothing matched: either the row is gone or its state moved on.
        match self.get(id).await? {
            None => Ok(None),
            Some(current) => Err(StoreError::StateChanged {
                expected: update.expected_state,
                actual: current.state,
            }),
        }
    }
}
