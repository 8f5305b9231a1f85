use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use appointment_cell::{Appointment, AppointmentEvent, AppointmentEventListener, AppointmentState, AppointmentStore};
use shared_config::AppConfig;
use shared_models::clock::Clock;
use shared_models::formats::format_time;

use crate::error::NotificationError;
use crate::models::{
    DispatchOutcome, DispatchReport, NewNotification, Notification, NotificationKind, PatientContact,
};
use crate::services::directory::PatientDirectory;
use crate::services::mailer::NotificationSink;
use crate::services::store::NotificationStore;

pub const SUPERSEDED: &str = "superseded";

/// UTC instant 24 hours before a clinic-local slot.
pub fn reminder_time(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(time) - Duration::hours(24);
    let utc = local - Duration::seconds(i64::from(offset.local_minus_utc()));
    Utc.from_utc_datetime(&utc)
}

/// Turns lifecycle events into notification records and drains due reminders.
///
/// Request acknowledgements and confirmations go out as soon as they are
/// recorded. Reminders wait for [`NotificationScheduler::dispatch_due`].
pub struct NotificationScheduler {
    store: Arc<dyn NotificationStore>,
    directory: Arc<dyn PatientDirectory>,
    sink: Arc<dyn NotificationSink>,
    appointments: Arc<dyn AppointmentStore>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    from: String,
    delivery_timeout: StdDuration,
    sweep_lock: Mutex<()>,
}

impl NotificationScheduler {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn NotificationStore>,
        directory: Arc<dyn PatientDirectory>,
        sink: Arc<dyn NotificationSink>,
        appointments: Arc<dyn AppointmentStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            directory,
            sink,
            appointments,
            clock,
            offset: config.clinic_offset(),
            from: config.mail_from.clone(),
            delivery_timeout: StdDuration::from_secs(config.mail_timeout_secs.max(1)),
            sweep_lock: Mutex::new(()),
        }
    }

    pub fn with_delivery_timeout(mut self, limit: StdDuration) -> Self {
        self.delivery_timeout = limit;
        self
    }

    pub async fn list_for_appointment(&self, appointment_id: i64) -> Result<Vec<Notification>, NotificationError> {
        self.store.list_for_appointment(appointment_id).await
    }

    /// Records a notification unless the patient has no contact on file.
    /// A scheduled one is skipped while an identical record is still pending;
    /// immediate ones are recorded for every transition.
    pub async fn schedule(
        &self,
        appointment: &Appointment,
        kind: NotificationKind,
        scheduled_for: Option<DateTime<Utc>>,
    ) -> Result<Option<Notification>, NotificationError> {
        if scheduled_for.is_some() && self.store.exists(appointment.id, kind, scheduled_for).await? {
            debug!(appointment_id = appointment.id, "{} already scheduled", kind);
            return Ok(None);
        }

        let Some(contact) = self.directory.contact(appointment.patient_id).await? else {
            warn!(
                appointment_id = appointment.id,
                patient_id = appointment.patient_id,
                "No contact on file, skipping {} notification",
                kind
            );
            return Ok(None);
        };

        let notification = self
            .store
            .insert(NewNotification {
                appointment_id: appointment.id,
                kind,
                recipient: contact.email.clone(),
                subject: kind.subject().to_string(),
                body: compose_body(appointment, kind, &contact),
                scheduled_for,
            })
            .await?;

        info!(
            appointment_id = appointment.id,
            notification_id = %notification.id,
            "Scheduled {} notification",
            kind
        );
        Ok(Some(notification))
    }

    async fn send_now(&self, appointment: &Appointment, kind: NotificationKind) -> Result<(), NotificationError> {
        if let Some(notification) = self.schedule(appointment, kind, None).await? {
            self.deliver(&notification).await?;
        }
        Ok(())
    }

    async fn schedule_reminder(&self, appointment: &Appointment) -> Result<(), NotificationError> {
        match (appointment.scheduled_date, appointment.scheduled_time) {
            (Some(date), Some(time)) => {
                let at = reminder_time(date, time, self.offset);
                self.schedule(appointment, NotificationKind::Reminder24h, Some(at)).await?;
            }
            _ => warn!(appointment_id = appointment.id, "Confirmed appointment has no slot, no reminder"),
        }
        Ok(())
    }

    /// Hands one record to the sink, bounded by the delivery timeout, and
    /// stores the result. A delivery failure or timeout lands on the record,
    /// only storage errors are returned.
    async fn deliver(&self, notification: &Notification) -> Result<DispatchOutcome, NotificationError> {
        let message = notification.message(&self.from);
        let delivered = match timeout(self.delivery_timeout, self.sink.deliver(&message)).await {
            Ok(result) => result,
            Err(_) => Err(NotificationError::Delivery(format!(
                "timed out after {}s",
                self.delivery_timeout.as_secs_f32()
            ))),
        };

        match delivered {
            Ok(()) => {
                self.store.mark_sent(notification.id, self.clock.now()).await?;
                Ok(DispatchOutcome::Sent)
            }
            Err(e) => {
                let detail = e.to_string();
                warn!(notification_id = %notification.id, "Delivery failed: {}", detail);
                self.store.mark_failed(notification.id, &detail).await?;
                Ok(DispatchOutcome::Failed { detail })
            }
        }
    }

    /// Sends every pending notification whose time has come and whose
    /// appointment is still confirmed. Items are independent: a failure is
    /// recorded on that item and the sweep moves on.
    #[instrument(skip(self))]
    pub async fn dispatch_due(&self) -> Result<Vec<DispatchReport>, NotificationError> {
        let _sweep = self.sweep_lock.lock().await;

        let now = self.clock.now();
        let due = self.store.due(now).await?;
        debug!("{} notifications due at {}", due.len(), now);

        let mut reports = Vec::with_capacity(due.len());
        for notification in due {
            match self.dispatch_one(&notification).await {
                Ok(Some(outcome)) => reports.push(DispatchReport {
                    id: notification.id,
                    appointment_id: notification.appointment_id,
                    outcome,
                }),
                Ok(None) => {}
                Err(e) => warn!(notification_id = %notification.id, "Skipped in this sweep: {}", e),
            }
        }

        info!("Reminder sweep handled {} notifications", reports.len());
        Ok(reports)
    }

    async fn dispatch_one(&self, notification: &Notification) -> Result<Option<DispatchOutcome>, NotificationError> {
        let appointment = self
            .appointments
            .get(notification.appointment_id)
            .await
            .map_err(|e| NotificationError::Storage(e.to_string()))?;

        let Some(appointment) = appointment.filter(|a| a.state == AppointmentState::Confirmed) else {
            // Stays pending; it goes out if the appointment is confirmed again.
            return Ok(None);
        };

        if notification.kind == NotificationKind::Reminder24h && !self.reminder_matches(notification, &appointment) {
            self.store.mark_failed(notification.id, SUPERSEDED).await?;
            return Ok(Some(DispatchOutcome::Superseded));
        }

        self.deliver(notification).await.map(Some)
    }

    fn reminder_matches(&self, notification: &Notification, appointment: &Appointment) -> bool {
        match (appointment.scheduled_date, appointment.scheduled_time) {
            (Some(date), Some(time)) => notification.scheduled_for == Some(reminder_time(date, time, self.offset)),
            _ => false,
        }
    }
}

#[async_trait]
impl AppointmentEventListener for NotificationScheduler {
    fn name(&self) -> &'static str {
        "notification_scheduler"
    }

    async fn on_event(&self, event: &AppointmentEvent) -> anyhow::Result<()> {
        match event {
            AppointmentEvent::Requested { appointment } => self
                .send_now(appointment, NotificationKind::RequestAck)
                .await
                .context("request acknowledgement")?,
            AppointmentEvent::Confirmed { appointment } => {
                // The reminder is recorded even if the confirmation mail fails.
                let sent = self.send_now(appointment, NotificationKind::Confirmation).await;
                self.schedule_reminder(appointment).await.context("24h reminder")?;
                sent.context("confirmation")?;
            }
            AppointmentEvent::Rescheduled { appointment, .. } => {
                self.schedule_reminder(appointment).await.context("24h reminder")?
            }
            _ => {}
        }
        Ok(())
    }
}

fn compose_body(appointment: &Appointment, kind: NotificationKind, contact: &PatientContact) -> String {
    let greeting = match &contact.full_name {
        Some(name) => format!("Hello {},", name),
        None => "Hello,".to_string(),
    };
    let lead = match kind {
        NotificationKind::RequestAck => {
            "We received your appointment request. Reception will contact you with a date and time."
        }
        NotificationKind::Confirmation => "Your appointment has been confirmed.",
        NotificationKind::Reminder24h => "This is a reminder that your appointment is tomorrow.",
    };

    let mut body = format!("{}\n\n{}\n\nTracking code: {}\n", greeting, lead, appointment.tracking_code);
    if let Some(date) = appointment.scheduled_date {
        body.push_str(&format!("Date: {}\n", date.format("%Y-%m-%d")));
    }
    if let Some(time) = appointment.scheduled_time {
        body.push_str(&format!("Time: {}\n", format_time(&time)));
    }
    body
}
