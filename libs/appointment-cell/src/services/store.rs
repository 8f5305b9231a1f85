use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::models::{
    Appointment, AppointmentFilter, AppointmentKind, AppointmentState, CancelledBy, Origin,
    ShiftPreference, TrackingCode,
};

/// Appointment fields before the store assigns id and tracking code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentDraft {
    pub patient_id: i64,
    pub physician_id: Option<i64>,
    pub request_date: NaiveDate,
    pub scheduled_date: Option<NaiveDate>,
    pub scheduled_time: Option<NaiveTime>,
    pub kind: AppointmentKind,
    pub shift_preference: Option<ShiftPreference>,
    pub origin: Origin,
    pub state: AppointmentState,
    pub confirmation_date: Option<NaiveDate>,
}

impl AppointmentDraft {
    pub(crate) fn into_appointment(self, id: i64, tracking_code: TrackingCode) -> Appointment {
        Appointment {
            id,
            tracking_code,
            patient_id: self.patient_id,
            physician_id: self.physician_id,
            request_date: self.request_date,
            scheduled_date: self.scheduled_date,
            scheduled_time: self.scheduled_time,
            kind: self.kind,
            shift_preference: self.shift_preference,
            origin: self.origin,
            state: self.state,
            confirmation_date: self.confirmation_date,
            cancelled_by: None,
        }
    }
}

/// Conditional write: applied only while the row is still in `expected_state`.
/// `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentUpdate {
    pub expected_state: AppointmentState,
    pub state: AppointmentState,
    pub physician_id: Option<i64>,
    pub scheduled_date: Option<NaiveDate>,
    pub scheduled_time: Option<NaiveTime>,
    pub confirmation_date: Option<NaiveDate>,
    pub cancelled_by: Option<CancelledBy>,
}

impl AppointmentUpdate {
    pub fn transition(expected_state: AppointmentState, state: AppointmentState) -> Self {
        Self {
            expected_state,
            state,
            physician_id: None,
            scheduled_date: None,
            scheduled_time: None,
            confirmation_date: None,
            cancelled_by: None,
        }
    }

    pub fn with_slot(mut self, physician_id: i64, date: NaiveDate, time: NaiveTime) -> Self {
        self.physician_id = Some(physician_id);
        self.scheduled_date = Some(date);
        self.scheduled_time = Some(time);
        self
    }

    pub fn with_confirmation_date(mut self, date: NaiveDate) -> Self {
        self.confirmation_date = Some(date);
        self
    }

    pub fn with_cancelled_by(mut self, actor: CancelledBy) -> Self {
        self.cancelled_by = Some(actor);
        self
    }

    pub fn apply(&self, current: &Appointment) -> Appointment {
        let mut next = current.clone();
        next.state = self.state;
        if let Some(id) = self.physician_id {
            next.physician_id = Some(id);
        }
        if let Some(date) = self.scheduled_date {
            next.scheduled_date = Some(date);
        }
        if let Some(time) = self.scheduled_time {
            next.scheduled_time = Some(time);
        }
        if let Some(date) = self.confirmation_date {
            next.confirmation_date = Some(date);
        }
        if let Some(actor) = self.cancelled_by {
            next.cancelled_by = Some(actor);
        }
        next
    }
}

/// Single source of truth for occupancy. Implementations must make
/// code reservation + insert atomic, and must refuse any write that would
/// leave two non-cancelled appointments on the same physician, date and time.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Reserves the next sequence number, formats the tracking code for
    /// `year` and inserts the row.
    async fn insert(&self, draft: AppointmentDraft, year: i32) -> Result<Appointment, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<Appointment>, StoreError>;

    async fn find_by_tracking_code(&self, code: &str) -> Result<Option<Appointment>, StoreError>;

    async fn find_by_physician_and_date(
        &self,
        physician_id: i64,
        date: NaiveDate,
        exclude_cancelled: bool,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Newest scheduled date first, unscheduled last, then time ascending.
    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError>;

    /// `Ok(None)` when no appointment has this id.
    async fn update(&self, id: i64, update: AppointmentUpdate) -> Result<Option<Appointment>, StoreError>;
}

pub fn listing_order(a: &Appointment, b: &Appointment) -> Ordering {
    match (a.scheduled_date, b.scheduled_date) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| match (a.scheduled_time, b.scheduled_time) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    })
    .then_with(|| a.id.cmp(&b.id))
}

#[derive(Default)]
struct Rows {
    sequence: u64,
    last_id: i64,
    appointments: BTreeMap<i64, Appointment>,
}

impl Rows {
    fn slot_taken_by_other(&self, candidate: &Appointment) -> Option<StoreError> {
        if candidate.state == AppointmentState::Cancelled {
            return None;
        }
        let (physician_id, date, time) = candidate.slot()?;
        self.appointments
            .values()
            .any(|other| other.id != candidate.id && other.occupies(physician_id, date, time))
            .then_some(StoreError::SlotTaken { physician_id, date, time })
    }
}

/// Process-local store. One mutex covers the sequence and the rows, so a
/// sequence value is never handed out twice and slot checks see every write.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    rows: Mutex<Rows>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert(&self, draft: AppointmentDraft, year: i32) -> Result<Appointment, StoreError> {
        let mut rows = self.rows.lock().await;

        let id = rows.last_id + 1;
        let candidate = draft.clone().into_appointment(id, TrackingCode::new(year, rows.sequence + 1));
        if let Some(conflict) = rows.slot_taken_by_other(&candidate) {
            return Err(conflict);
        }

        rows.sequence += 1;
        rows.last_id = id;
        rows.appointments.insert(id, candidate.clone());
        Ok(candidate)
    }

    async fn get(&self, id: i64) -> Result<Option<Appointment>, StoreError> {
        Ok(self.rows.lock().await.appointments.get(&id).cloned())
    }

    async fn find_by_tracking_code(&self, code: &str) -> Result<Option<Appointment>, StoreError> {
        let rows = self.rows.lock().await;
        Ok(rows
            .appointments
            .values()
            .find(|a| a.tracking_code.as_str() == code)
            .cloned())
    }

    async fn find_by_physician_and_date(
        &self,
        physician_id: i64,
        date: NaiveDate,
        exclude_cancelled: bool,
    ) -> Result<Vec<Appointment>, StoreError> {
        let rows = self.rows.lock().await;
        let mut found: Vec<Appointment> = rows
            .appointments
            .values()
            .filter(|a| a.physician_id == Some(physician_id) && a.scheduled_date == Some(date))
            .filter(|a| !exclude_cancelled || a.state != AppointmentState::Cancelled)
            .cloned()
            .collect();
        found.sort_by_key(|a| (a.scheduled_time, a.id));
        Ok(found)
    }

    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError> {
        let rows = self.rows.lock().await;
        let mut found: Vec<Appointment> = rows
            .appointments
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        found.sort_by(listing_order);
        Ok(found)
    }

    async fn update(&self, id: i64, update: AppointmentUpdate) -> Result<Option<Appointment>, StoreError> {
        let mut rows = self.rows.lock().await;

        let current = match rows.appointments.get(&id) {
            Some(current) => current.clone(),
            None => return Ok(None),
        };
        if current.state != update.expected_state {
            return Err(StoreError::StateChanged {
                expected: update.expected_state,
                actual: current.state,
            });
        }

        let next = update.apply(&current);
        if let Some(conflict) = rows.slot_taken_by_other(&next) {
            return Err(conflict);
        }

        rows.appointments.insert(id, next.clone());
        Ok(Some(next))
    }
}
