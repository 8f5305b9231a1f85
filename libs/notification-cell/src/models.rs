// libs/notification-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    #[serde(alias = "solicitud")]
    RequestAck,
    #[serde(alias = "confirmacion")]
    Confirmation,
    #[serde(rename = "reminder_24h", alias = "recordatorio_24h")]
    Reminder24h,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::RequestAck => "request_ack",
            NotificationKind::Confirmation => "confirmation",
            NotificationKind::Reminder24h => "reminder_24h",
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            NotificationKind::RequestAck => "Appointment request received",
            NotificationKind::Confirmation => "Appointment confirmed",
            NotificationKind::Reminder24h => "Reminder: your appointment is tomorrow",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationState {
    #[serde(alias = "pendiente")]
    Pending,
    #[serde(alias = "enviado")]
    Sent,
    #[serde(alias = "fallido")]
    Failed,
}

impl fmt::Display for NotificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationState::Pending => write!(f, "pending"),
            NotificationState::Sent => write!(f, "sent"),
            NotificationState::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub appointment_id: i64,
    pub kind: NotificationKind,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub state: NotificationState,
    /// `None` for immediate notifications.
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn message(&self, from: &str) -> OutboundMessage {
        OutboundMessage {
            from: from.to_string(),
            to: self.recipient.clone(),
            subject: self.subject.clone(),
            body: self.body.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub appointment_id: i64,
    pub kind: NotificationKind,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub scheduled_for: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    #[serde(rename = "text")]
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientContact {
    pub patient_id: i64,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Sent,
    Failed { detail: String },
    /// The appointment moved after this reminder was scheduled.
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub id: Uuid,
    pub appointment_id: i64,
    pub outcome: DispatchOutcome,
}
