// libs/appointment-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use shared_models::formats::{date_option, hhmm, hhmm_option};

use crate::error::AppointmentError;

// ==============================================================================
// CORE APPOINTMENT MODEL
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub tracking_code: TrackingCode,
    pub patient_id: i64,
    #[serde(default)]
    pub physician_id: Option<i64>,
    pub request_date: NaiveDate,
    #[serde(default)]
    pub scheduled_date: Option<NaiveDate>,
    #[serde(with = "hhmm_option", default)]
    pub scheduled_time: Option<NaiveTime>,
    pub kind: AppointmentKind,
    #[serde(default)]
    pub shift_preference: Option<ShiftPreference>,
    pub origin: Origin,
    pub state: AppointmentState,
    #[serde(default)]
    pub confirmation_date: Option<NaiveDate>,
    #[serde(default)]
    pub cancelled_by: Option<CancelledBy>,
}

impl Appointment {
    /// True when this appointment blocks `physician_id` at `date`/`time`.
    pub fn occupies(&self, physician_id: i64, date: NaiveDate, time: NaiveTime) -> bool {
        self.state != AppointmentState::Cancelled
            && self.physician_id == Some(physician_id)
            && self.scheduled_date == Some(date)
            && self.scheduled_time == Some(time)
    }

    /// Physician, date and time when all three are set.
    pub fn slot(&self) -> Option<(i64, NaiveDate, NaiveTime)> {
        Some((self.physician_id?, self.scheduled_date?, self.scheduled_time?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentState {
    #[serde(alias = "pendiente")]
    Pending,
    #[serde(alias = "confirmada")]
    Confirmed,
    #[serde(alias = "cancelada")]
    Cancelled,
    #[serde(alias = "atendida")]
    Completed,
}

impl AppointmentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentState::Pending => "pending",
            AppointmentState::Confirmed => "confirmed",
            AppointmentState::Cancelled => "cancelled",
            AppointmentState::Completed => "completed",
        }
    }
}

impl fmt::Display for AppointmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentState {
    type Err = AppointmentError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "pendiente" => Ok(AppointmentState::Pending),
            "confirmed" | "confirmada" => Ok(AppointmentState::Confirmed),
            "cancelled" | "canceled" | "cancelada" => Ok(AppointmentState::Cancelled),
            "completed" | "atendida" => Ok(AppointmentState::Completed),
            other => Err(AppointmentError::InvalidRequest(format!(
                "unknown appointment state '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    #[serde(alias = "patient-web", alias = "paciente", alias = "web")]
    PatientWeb,
    #[serde(alias = "reception-desk", alias = "recepcion", alias = "desk")]
    ReceptionDesk,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::PatientWeb => write!(f, "patient_web"),
            Origin::ReceptionDesk => write!(f, "reception_desk"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentKind {
    #[serde(alias = "new-visit", alias = "primera_vez", alias = "nueva")]
    NewVisit,
    #[serde(alias = "follow-up", alias = "seguimiento", alias = "control")]
    FollowUp,
}

/// Advisory only; never used to pick a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftPreference {
    #[serde(alias = "manana", alias = "mañana")]
    Morning,
    #[serde(alias = "tarde")]
    Afternoon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    #[serde(alias = "paciente")]
    Patient,
    #[serde(alias = "recepcion")]
    Reception,
}

impl CancelledBy {
    pub fn parse(raw: &str) -> Result<Self, AppointmentError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "patient" | "paciente" => Ok(CancelledBy::Patient),
            "reception" | "recepcion" => Ok(CancelledBy::Reception),
            other => Err(AppointmentError::InvalidActor(format!(
                "'{}' cannot cancel appointments",
                other
            ))),
        }
    }
}

impl fmt::Display for CancelledBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelledBy::Patient => write!(f, "patient"),
            CancelledBy::Reception => write!(f, "reception"),
        }
    }
}

/// Patient-facing identifier, `SEG-<year>-<sequence>` with the sequence
/// padded to at least three digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingCode(String);

impl TrackingCode {
    pub const PREFIX: &'static str = "SEG";

    pub fn new(year: i32, sequence: u64) -> Self {
        TrackingCode(format!("{}-{}-{:03}", Self::PREFIX, year, sequence))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TrackingCode {
    fn from(raw: String) -> Self {
        TrackingCode(raw)
    }
}

// ==============================================================================
// CREATION REQUESTS
// ==============================================================================

/// Self-service request; the patient never picks a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebCreationRequest {
    pub patient_id: i64,
    pub physician_id: Option<i64>,
    pub kind: AppointmentKind,
    pub shift_preference: Option<ShiftPreference>,
}

/// Walk-in booking made at the desk with a concrete slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeskCreationRequest {
    pub patient_id: i64,
    pub physician_id: i64,
    pub kind: AppointmentKind,
    pub shift_preference: Option<ShiftPreference>,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreationRequest {
    Web(WebCreationRequest),
    Desk(DeskCreationRequest),
}

impl CreationRequest {
    pub fn origin(&self) -> Origin {
        match self {
            CreationRequest::Web(_) => Origin::PatientWeb,
            CreationRequest::Desk(_) => Origin::ReceptionDesk,
        }
    }
}

/// Wire shape of `POST /appointments`. Field presence is checked when it is
/// converted into a [`CreationRequest`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateAppointmentRequest {
    #[serde(alias = "created_by")]
    pub origin: Origin,
    pub patient_id: i64,
    #[serde(default)]
    pub physician_id: Option<i64>,
    pub kind: AppointmentKind,
    #[serde(default)]
    pub shift_preference: Option<ShiftPreference>,
    #[serde(with = "date_option", default)]
    pub scheduled_date: Option<NaiveDate>,
    #[serde(with = "hhmm_option", default)]
    pub scheduled_time: Option<NaiveTime>,
    #[serde(with = "date_option", default)]
    pub confirmation_date: Option<NaiveDate>,
}

impl TryFrom<CreateAppointmentRequest> for CreationRequest {
    type Error = AppointmentError;

    fn try_from(request: CreateAppointmentRequest) -> Result<Self, Self::Error> {
        match request.origin {
            Origin::PatientWeb => {
                if request.scheduled_date.is_some()
                    || request.scheduled_time.is_some()
                    || request.confirmation_date.is_some()
                {
                    return Err(AppointmentError::InvalidRequest(
                        "a web request cannot carry a scheduled date, time or confirmation date".to_string(),
                    ));
                }
                Ok(CreationRequest::Web(WebCreationRequest {
                    patient_id: request.patient_id,
                    physician_id: request.physician_id,
                    kind: request.kind,
                    shift_preference: request.shift_preference,
                }))
            }
            Origin::ReceptionDesk => {
                let scheduled_date = request.scheduled_date.ok_or_else(|| {
                    AppointmentError::InvalidRequest("a desk booking requires scheduled_date".to_string())
                })?;
                let scheduled_time = request.scheduled_time.ok_or_else(|| {
                    AppointmentError::InvalidRequest("a desk booking requires scheduled_time".to_string())
                })?;
                let physician_id = request.physician_id.ok_or_else(|| {
                    AppointmentError::InvalidRequest("a desk booking requires physician_id".to_string())
                })?;
                Ok(CreationRequest::Desk(DeskCreationRequest {
                    patient_id: request.patient_id,
                    physician_id,
                    kind: request.kind,
                    shift_preference: request.shift_preference,
                    scheduled_date,
                    scheduled_time,
                }))
            }
        }
    }
}

// ==============================================================================
// TRANSITION REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConfirmAppointmentRequest {
    pub scheduled_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub scheduled_time: NaiveTime,
    /// Assigns a physician to a web request that did not name one.
    #[serde(default)]
    pub physician_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReassignAppointmentRequest {
    pub scheduled_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub scheduled_time: NaiveTime,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CancelAppointmentRequest {
    pub cancelled_by: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OverwriteStateRequest {
    pub state: String,
}

// ==============================================================================
// QUERIES
// ==============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AppointmentFilter {
    #[serde(default)]
    pub patient_id: Option<i64>,
    #[serde(default)]
    pub physician_id: Option<i64>,
    /// Empty means every state.
    #[serde(skip)]
    pub states: Vec<AppointmentState>,
}

impl AppointmentFilter {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.patient_id.map_or(true, |id| appointment.patient_id == id)
            && self.physician_id.map_or(true, |id| appointment.physician_id == Some(id))
            && (self.states.is_empty() || self.states.contains(&appointment.state))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailableSlotsResponse {
    pub physician_id: i64,
    pub date: NaiveDate,
    pub slots: Vec<String>,
}
