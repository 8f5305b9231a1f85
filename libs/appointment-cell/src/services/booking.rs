// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{Datelike, FixedOffset, NaiveDate, NaiveTime};
use tracing::{debug, info, instrument, warn};

use availability_cell::AvailabilityService;
use shared_config::AppConfig;
use shared_models::auth::Actor;
use shared_models::clock::Clock;

use crate::error::AppointmentError;
use crate::events::{AppointmentEvent, AppointmentEventListener};
use crate::models::{
    Appointment, AppointmentFilter, AppointmentState, CancelledBy, ConfirmAppointmentRequest,
    CreationRequest, Origin, ReassignAppointmentRequest,
};
use crate::services::conflict::available_slots;
use crate::services::lifecycle::{next_state, LifecycleEvent};
use crate::services::store::{AppointmentDraft, AppointmentStore, AppointmentUpdate};

/// The appointment lifecycle engine. Every write re-reads occupancy from the
/// store, and listeners only hear about writes that committed.
pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    availability: Arc<AvailabilityService>,
    clock: Arc<dyn Clock>,
    clinic_offset: FixedOffset,
    listeners: Vec<Arc<dyn AppointmentEventListener>>,
}

impl AppointmentBookingService {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn AppointmentStore>,
        availability: Arc<AvailabilityService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            availability,
            clock,
            clinic_offset: config.clinic_offset(),
            listeners: Vec::new(),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn AppointmentEventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Calendar date at the clinic.
    pub fn today(&self) -> NaiveDate {
        self.clock.today(self.clinic_offset)
    }

    // ==========================================================================
    // TRANSITIONS
    // ==========================================================================

    #[instrument(skip(self, request), fields(origin = %request.origin()))]
    pub async fn create(&self, actor: Actor, request: CreationRequest) -> Result<Appointment, AppointmentError> {
        let today = self.today();

        let draft = match request {
            CreationRequest::Web(web) => {
                if actor != Actor::Patient {
                    return Err(invalid_origin(Origin::PatientWeb, actor));
                }
                AppointmentDraft {
                    patient_id: web.patient_id,
                    physician_id: web.physician_id,
                    request_date: today,
                    scheduled_date: None,
                    scheduled_time: None,
                    kind: web.kind,
                    shift_preference: web.shift_preference,
                    origin: Origin::PatientWeb,
                    state: AppointmentState::Pending,
                    confirmation_date: None,
                }
            }
            CreationRequest::Desk(desk) => {
                if !is_staff(actor) {
                    return Err(invalid_origin(Origin::ReceptionDesk, actor));
                }
                self.ensure_not_past(desk.scheduled_date)?;
                self.ensure_slot_open(desk.physician_id, desk.scheduled_date, desk.scheduled_time, None)
                    .await?;
                AppointmentDraft {
                    patient_id: desk.patient_id,
                    physician_id: Some(desk.physician_id),
                    request_date: today,
                    scheduled_date: Some(desk.scheduled_date),
                    scheduled_time: Some(desk.scheduled_time),
                    kind: desk.kind,
                    shift_preference: desk.shift_preference,
                    origin: Origin::ReceptionDesk,
                    state: AppointmentState::Confirmed,
                    confirmation_date: Some(today),
                }
            }
        };

        let appointment = self.store.insert(draft, today.year()).await?;
        info!(
            "Created appointment {} ({}) as {}",
            appointment.id, appointment.tracking_code, appointment.state
        );

        let event = match appointment.origin {
            Origin::PatientWeb => AppointmentEvent::Requested {
                appointment: appointment.clone(),
            },
            Origin::ReceptionDesk => AppointmentEvent::Confirmed {
                appointment: appointment.clone(),
            },
        };
        self.publish(event).await;
        Ok(appointment)
    }

    #[instrument(skip(self, request))]
    pub async fn confirm(
        &self,
        actor: Actor,
        appointment_id: i64,
        request: ConfirmAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        require_staff(actor, "confirm")?;
        let current = self.load(appointment_id).await?;
        let target = next_state(current.state, LifecycleEvent::Confirm)?;

        let physician_id = request.physician_id.or(current.physician_id).ok_or_else(|| {
            AppointmentError::InvalidRequest("confirming requires a physician".to_string())
        })?;
        self.ensure_not_past(request.scheduled_date)?;
        self.ensure_slot_open(physician_id, request.scheduled_date, request.scheduled_time, Some(current.id))
            .await?;

        let update = AppointmentUpdate::transition(current.state, target)
            .with_slot(physician_id, request.scheduled_date, request.scheduled_time)
            .with_confirmation_date(self.today());
        let appointment = self.write(current.id, update).await?;
        info!(
            "Confirmed appointment {} for {} {}",
            appointment.tracking_code, request.scheduled_date, request.scheduled_time
        );

        self.publish(AppointmentEvent::Confirmed {
            appointment: appointment.clone(),
        })
        .await;
        Ok(appointment)
    }

    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        actor: Actor,
        tracking_code: &str,
        cancelled_by: CancelledBy,
    ) -> Result<Appointment, AppointmentError> {
        match (actor, cancelled_by) {
            (Actor::Physician { .. }, _) => {
                return Err(AppointmentError::InvalidActor(format!("{} cannot cancel appointments", actor)));
            }
            (Actor::Patient, CancelledBy::Reception) => {
                return Err(AppointmentError::InvalidActor(
                    "only reception staff can cancel on behalf of reception".to_string(),
                ));
            }
            _ => {}
        }

        let current = self
            .store
            .find_by_tracking_code(tracking_code)
            .await?
            .ok_or_else(|| AppointmentError::NotFound(tracking_code.to_string()))?;
        let target = next_state(current.state, LifecycleEvent::Cancel)?;

        let mut update = AppointmentUpdate::transition(current.state, target).with_cancelled_by(cancelled_by);
        if current.state == AppointmentState::Pending {
            // Doubles as the cancellation date for requests that never got a slot.
            update = update.with_confirmation_date(self.today());
        }
        let appointment = self.write(current.id, update).await?;
        info!("Cancelled appointment {} by {}", appointment.tracking_code, cancelled_by);

        self.publish(AppointmentEvent::Cancelled {
            appointment: appointment.clone(),
            previous_state: current.state,
        })
        .await;
        Ok(appointment)
    }

    #[instrument(skip(self))]
    pub async fn complete(&self, actor: Actor, appointment_id: i64) -> Result<Appointment, AppointmentError> {
        let current = self.load(appointment_id).await?;
        match actor {
            Actor::Physician { physician_id } if current.physician_id == Some(physician_id) => {}
            _ => {
                return Err(AppointmentError::InvalidActor(format!(
                    "{} is not the physician of appointment {}",
                    actor, current.tracking_code
                )));
            }
        }
        let target = next_state(current.state, LifecycleEvent::Complete)?;

        let appointment = self
            .write(current.id, AppointmentUpdate::transition(current.state, target))
            .await?;
        info!("Completed appointment {}", appointment.tracking_code);

        self.publish(AppointmentEvent::Completed {
            appointment: appointment.clone(),
        })
        .await;
        Ok(appointment)
    }

    /// Reception moves a confirmed appointment to another open slot of the
    /// same physician.
    #[instrument(skip(self, request))]
    pub async fn reassign(
        &self,
        actor: Actor,
        appointment_id: i64,
        request: ReassignAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        require_staff(actor, "reassign")?;
        let current = self.load(appointment_id).await?;
        let target = next_state(current.state, LifecycleEvent::Reassign)?;

        let (physician_id, previous_date, previous_time) = current.slot().ok_or_else(|| {
            AppointmentError::InvalidRequest("appointment has no slot to move".to_string())
        })?;
        self.ensure_not_past(request.scheduled_date)?;
        self.ensure_slot_open(physician_id, request.scheduled_date, request.scheduled_time, Some(current.id))
            .await?;

        let update = AppointmentUpdate::transition(current.state, target).with_slot(
            physician_id,
            request.scheduled_date,
            request.scheduled_time,
        );
        let appointment = self.write(current.id, update).await?;
        info!(
            "Moved appointment {} from {} {} to {} {}",
            appointment.tracking_code, previous_date, previous_time, request.scheduled_date, request.scheduled_time
        );

        self.publish(AppointmentEvent::Rescheduled {
            appointment: appointment.clone(),
            previous_date,
            previous_time,
        })
        .await;
        Ok(appointment)
    }

    /// Administrative overwrite; any of the four states, no transition table.
    #[instrument(skip(self))]
    pub async fn overwrite_state(
        &self,
        actor: Actor,
        appointment_id: i64,
        state: AppointmentState,
    ) -> Result<Appointment, AppointmentError> {
        require_staff(actor, "overwrite the state of")?;
        let current = self.load(appointment_id).await?;

        let appointment = self
            .write(current.id, AppointmentUpdate::transition(current.state, state))
            .await?;
        warn!(
            "State of appointment {} overwritten: {} -> {}",
            appointment.tracking_code, current.state, appointment.state
        );

        self.publish(AppointmentEvent::StateOverwritten {
            appointment: appointment.clone(),
            previous_state: current.state,
        })
        .await;
        Ok(appointment)
    }

    // ==========================================================================
    // QUERIES
    // ==========================================================================

    pub async fn find_by_tracking_code(&self, tracking_code: &str) -> Result<Appointment, AppointmentError> {
        self.store
            .find_by_tracking_code(tracking_code)
            .await?
            .ok_or_else(|| AppointmentError::NotFound(tracking_code.to_string()))
    }

    pub async fn get(&self, appointment_id: i64) -> Result<Appointment, AppointmentError> {
        self.load(appointment_id).await
    }

    pub async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self.store.list(filter).await?)
    }

    /// Confirmed and completed visits, earliest first.
    pub async fn physician_agenda(&self, physician_id: i64) -> Result<Vec<Appointment>, AppointmentError> {
        let filter = AppointmentFilter {
            physician_id: Some(physician_id),
            states: vec![AppointmentState::Confirmed, AppointmentState::Completed],
            ..AppointmentFilter::default()
        };
        let mut agenda = self.store.list(&filter).await?;
        agenda.sort_by_key(|a| (a.scheduled_date, a.scheduled_time, a.id));
        Ok(agenda)
    }

    pub async fn available_slots(
        &self,
        physician_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<NaiveTime>, AppointmentError> {
        self.ensure_not_past(date)?;
        self.open_slots(physician_id, date, None).await
    }

    // ==========================================================================
    // INTERNALS
    // ==========================================================================

    async fn load(&self, appointment_id: i64) -> Result<Appointment, AppointmentError> {
        self.store
            .get(appointment_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound(format!("id {}", appointment_id)))
    }

    async fn write(&self, appointment_id: i64, update: AppointmentUpdate) -> Result<Appointment, AppointmentError> {
        self.store
            .update(appointment_id, update)
            .await?
            .ok_or_else(|| AppointmentError::NotFound(format!("id {}", appointment_id)))
    }

    fn ensure_not_past(&self, date: NaiveDate) -> Result<(), AppointmentError> {
        let today = self.today();
        if date < today {
            return Err(AppointmentError::InvalidRequest(format!(
                "{} is before today ({})",
                date, today
            )));
        }
        Ok(())
    }

    async fn open_slots(
        &self,
        physician_id: i64,
        date: NaiveDate,
        exclude_id: Option<i64>,
    ) -> Result<Vec<NaiveTime>, AppointmentError> {
        let candidates = self.availability.slots_for_date(physician_id, date).await?;
        let existing: Vec<Appointment> = self
            .store
            .find_by_physician_and_date(physician_id, date, true)
            .await?
            .into_iter()
            .filter(|a| Some(a.id) != exclude_id)
            .collect();
        Ok(available_slots(&candidates, physician_id, date, &existing))
    }

    async fn ensure_slot_open(
        &self,
        physician_id: i64,
        date: NaiveDate,
        time: NaiveTime,
        exclude_id: Option<i64>,
    ) -> Result<(), AppointmentError> {
        let open = self.open_slots(physician_id, date, exclude_id).await?;
        if !open.contains(&time) {
            debug!("Slot {} {} not among {} open slots", date, time, open.len());
            return Err(AppointmentError::SlotUnavailable { physician_id, date, time });
        }
        Ok(())
    }

    async fn publish(&self, event: AppointmentEvent) {
        for listener in &self.listeners {
            if let Err(e) = listener.on_event(&event).await {
                warn!(
                    listener = listener.name(),
                    appointment_id = event.appointment().id,
                    "Listener failed on {} event: {:#}",
                    event.name(),
                    e
                );
            }
        }
    }
}

fn is_staff(actor: Actor) -> bool {
    actor.is_reception() || actor.is_manager()
}

fn require_staff(actor: Actor, action: &str) -> Result<(), AppointmentError> {
    if is_staff(actor) {
        return Ok(());
    }
    Err(AppointmentError::InvalidActor(format!("{} cannot {} appointments", actor, action)))
}

fn invalid_origin(origin: Origin, actor: Actor) -> AppointmentError {
    AppointmentError::InvalidOrigin {
        origin,
        actor: actor.to_string(),
    }
}
