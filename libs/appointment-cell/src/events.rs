use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use tracing::info;

use crate::models::{Appointment, AppointmentState};

/// Emitted after an appointment write has committed.
#[derive(Debug, Clone, PartialEq)]
pub enum AppointmentEvent {
    Requested {
        appointment: Appointment,
    },
    Confirmed {
        appointment: Appointment,
    },
    Rescheduled {
        appointment: Appointment,
        previous_date: NaiveDate,
        previous_time: NaiveTime,
    },
    Cancelled {
        appointment: Appointment,
        previous_state: AppointmentState,
    },
    Completed {
        appointment: Appointment,
    },
    StateOverwritten {
        appointment: Appointment,
        previous_state: AppointmentState,
    },
}

impl AppointmentEvent {
    pub fn appointment(&self) -> &Appointment {
        match self {
            AppointmentEvent::Requested { appointment }
            | AppointmentEvent::Confirmed { appointment }
            | AppointmentEvent::Rescheduled { appointment, .. }
            | AppointmentEvent::Cancelled { appointment, .. }
            | AppointmentEvent::Completed { appointment }
            | AppointmentEvent::StateOverwritten { appointment, .. } => appointment,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AppointmentEvent::Requested { .. } => "requested",
            AppointmentEvent::Confirmed { .. } => "confirmed",
            AppointmentEvent::Rescheduled { .. } => "rescheduled",
            AppointmentEvent::Cancelled { .. } => "cancelled",
            AppointmentEvent::Completed { .. } => "completed",
            AppointmentEvent::StateOverwritten { .. } => "state_overwritten",
        }
    }
}

/// Side-effect hook. An error is logged by the publisher and never reaches
/// the caller of the transition.
#[async_trait]
pub trait AppointmentEventListener: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_event(&self, event: &AppointmentEvent) -> anyhow::Result<()>;
}

/// Writes every lifecycle event to the log. Completed appointments are where
/// the clinical record flow picks up.
pub struct AuditLogListener;

#[async_trait]
impl AppointmentEventListener for AuditLogListener {
    fn name(&self) -> &'static str {
        "audit_log"
    }

    async fn on_event(&self, event: &AppointmentEvent) -> anyhow::Result<()> {
        let appointment = event.appointment();
        info!(
            appointment_id = appointment.id,
            tracking_code = %appointment.tracking_code,
            state = %appointment.state,
            "appointment {}",
            event.name()
        );
        Ok(())
    }
}
