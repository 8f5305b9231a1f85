// libs/notification-cell/tests/scheduler_test.rs
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use appointment_cell::{
    Appointment, AppointmentBookingService, AppointmentKind, AppointmentState, CancelledBy,
    ConfirmAppointmentRequest, CreationRequest, DeskCreationRequest, InMemoryAppointmentStore,
    ReassignAppointmentRequest, WebCreationRequest,
};
use availability_cell::{AvailabilityService, CreateWindowRequest, DayOfWeek, InMemoryAvailabilityStore};
use notification_cell::{
    reminder_time, DispatchOutcome, InMemoryNotificationStore, InMemoryPatientDirectory, NotificationError,
    NotificationKind, NotificationScheduler, NotificationSink, NotificationState, OutboundMessage,
    PatientContact, ReminderSweepWorker,
};
use shared_models::auth::Actor;
use shared_models::clock::{Clock, FixedClock};
use shared_utils::test_utils::TestConfig;

const PHYSICIAN: i64 = 7;
const BOUNCING: &str = "bounce@example.com";
const UNRESPONSIVE: &str = "slow@example.com";

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<OutboundMessage>>,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), NotificationError> {
        if message.to == UNRESPONSIVE {
            std::future::pending::<()>().await;
        }
        if message.to == BOUNCING {
            return Err(NotificationError::Delivery("mailbox unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

impl RecordingSink {
    fn subjects(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|m| m.subject.clone()).collect()
    }
}

struct Harness {
    booking: AppointmentBookingService,
    scheduler: Arc<NotificationScheduler>,
    sink: Arc<RecordingSink>,
    clock: Arc<FixedClock>,
}

fn at(h: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, 0, 0).unwrap()
}

fn next_monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 9).unwrap()
}

async fn harness() -> Harness {
    let config = TestConfig::default().to_app_config();
    let availability = Arc::new(AvailabilityService::new(
        &config,
        Arc::new(InMemoryAvailabilityStore::new()),
    ));
    availability
        .create_window(CreateWindowRequest {
            physician_id: PHYSICIAN,
            day_of_week: DayOfWeek::Monday,
            start_time: at(8),
            end_time: at(12),
        })
        .await
        .unwrap();

    let directory = Arc::new(InMemoryPatientDirectory::new());
    for (patient_id, email) in [(1, "ana@example.com"), (2, BOUNCING), (3, UNRESPONSIVE)] {
        directory
            .register(PatientContact {
                patient_id,
                email: email.to_string(),
                full_name: Some(format!("Patient {}", patient_id)),
            })
            .await;
    }

    // Monday 2025-06-02, clinic on UTC.
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap()));
    let appointments = Arc::new(InMemoryAppointmentStore::new());
    let sink = Arc::new(RecordingSink::default());
    let scheduler = Arc::new(NotificationScheduler::new(
        &config,
        Arc::new(InMemoryNotificationStore::new()),
        directory,
        sink.clone(),
        appointments.clone(),
        clock.clone(),
    )
    .with_delivery_timeout(StdDuration::from_millis(200)));
    let booking = AppointmentBookingService::new(&config, appointments, availability, clock.clone())
        .with_listener(scheduler.clone());

    Harness {
        booking,
        scheduler,
        sink,
        clock,
    }
}

fn web(patient_id: i64) -> CreationRequest {
    CreationRequest::Web(WebCreationRequest {
        patient_id,
        physician_id: Some(PHYSICIAN),
        kind: AppointmentKind::NewVisit,
        shift_preference: None,
    })
}

fn desk(patient_id: i64, hour: u32) -> CreationRequest {
    CreationRequest::Desk(DeskCreationRequest {
        patient_id,
        physician_id: PHYSICIAN,
        kind: AppointmentKind::FollowUp,
        shift_preference: None,
        scheduled_date: next_monday(),
        scheduled_time: at(hour),
    })
}

async fn confirmed(h: &Harness, patient_id: i64, hour: u32) -> Appointment {
    let pending = h.booking.create(Actor::Patient, web(patient_id)).await.unwrap();
    h.booking
        .confirm(
            Actor::Reception,
            pending.id,
            ConfirmAppointmentRequest {
                scheduled_date: next_monday(),
                scheduled_time: at(hour),
                physician_id: None,
            },
        )
        .await
        .unwrap()
}

async fn reassign_to(h: &Harness, appointment_id: i64, hour: u32) {
    h.booking
        .reassign(
            Actor::Reception,
            appointment_id,
            ReassignAppointmentRequest {
                scheduled_date: next_monday(),
                scheduled_time: at(hour),
            },
        )
        .await
        .unwrap();
}

async fn sweep_outcomes(h: &Harness) -> Vec<DispatchOutcome> {
    h.scheduler
        .dispatch_due()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.outcome)
        .collect()
}

#[tokio::test]
async fn web_request_is_acknowledged_immediately() {
    let h = harness().await;
    let appointment = h.booking.create(Actor::Patient, web(1)).await.unwrap();

    let notifications = h.scheduler.list_for_appointment(appointment.id).await.unwrap();
    assert_eq!(notifications.len(), 1);
    let ack = &notifications[0];
    assert_eq!(ack.kind, NotificationKind::RequestAck);
    assert_eq!(ack.state, NotificationState::Sent);
    assert_eq!(ack.scheduled_for, None);
    assert_eq!(ack.sent_at, Some(h.clock.now()));
    assert!(ack.body.contains("SEG-2025-001"));

    let sent = h.sink.sent.lock().unwrap().clone();
    assert_eq!(sent[0].to, "ana@example.com");
    assert_eq!(sent[0].from, "noreply@clinic.local");
    assert_eq!(sent[0].subject, "Appointment request received");
}

#[tokio::test]
async fn confirmation_sends_now_and_schedules_the_reminder() {
    let h = harness().await;
    let appointment = confirmed(&h, 1, 9).await;

    let notifications = h.scheduler.list_for_appointment(appointment.id).await.unwrap();
    let kinds: Vec<_> = notifications.iter().map(|n| (n.kind, n.state)).collect();
    assert_eq!(
        kinds,
        vec![
            (NotificationKind::RequestAck, NotificationState::Sent),
            (NotificationKind::Confirmation, NotificationState::Sent),
            (NotificationKind::Reminder24h, NotificationState::Pending),
        ]
    );

    let reminder = &notifications[2];
    assert_eq!(reminder.scheduled_for, Some(Utc.with_ymd_and_hms(2025, 6, 8, 9, 0, 0).unwrap()));
    assert!(reminder.body.contains("Date: 2025-06-09"));
    assert!(reminder.body.contains("Time: 09:00"));
}

#[tokio::test]
async fn sweep_waits_until_the_reminder_is_due() {
    let h = harness().await;
    let appointment = confirmed(&h, 1, 9).await;

    assert!(h.scheduler.dispatch_due().await.unwrap().is_empty());

    h.clock.set(Utc.with_ymd_and_hms(2025, 6, 8, 8, 59, 0).unwrap());
    assert!(h.scheduler.dispatch_due().await.unwrap().is_empty());

    h.clock.advance(Duration::minutes(1));
    let reports = h.scheduler.dispatch_due().await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].appointment_id, appointment.id);
    assert_eq!(reports[0].outcome, DispatchOutcome::Sent);
    assert_eq!(
        h.sink.subjects().last().map(String::as_str),
        Some("Reminder: your appointment is tomorrow")
    );

    // Already sent.
    assert!(h.scheduler.dispatch_due().await.unwrap().is_empty());
}

#[tokio::test]
async fn reminders_for_cancelled_appointments_are_held_back() {
    let h = harness().await;
    let appointment = confirmed(&h, 1, 9).await;
    h.booking
        .cancel(Actor::Reception, appointment.tracking_code.as_str(), CancelledBy::Reception)
        .await
        .unwrap();

    h.clock.set(Utc.with_ymd_and_hms(2025, 6, 8, 12, 0, 0).unwrap());
    assert!(h.scheduler.dispatch_due().await.unwrap().is_empty());

    let reminder = h
        .scheduler
        .list_for_appointment(appointment.id)
        .await
        .unwrap()
        .into_iter()
        .find(|n| n.kind == NotificationKind::Reminder24h)
        .unwrap();
    assert_eq!(reminder.state, NotificationState::Pending);
}

#[tokio::test]
async fn reassignment_supersedes_the_old_reminder() {
    let h = harness().await;
    let appointment = confirmed(&h, 1, 9).await;
    h.booking
        .reassign(
            Actor::Reception,
            appointment.id,
            ReassignAppointmentRequest {
                scheduled_date: next_monday(),
                scheduled_time: at(10),
            },
        )
        .await
        .unwrap();

    h.clock.set(Utc.with_ymd_and_hms(2025, 6, 8, 10, 0, 0).unwrap());
    let outcomes: Vec<_> = h
        .scheduler
        .dispatch_due()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.outcome)
        .collect();
    assert_eq!(outcomes, vec![DispatchOutcome::Superseded, DispatchOutcome::Sent]);

    let stale = h
        .scheduler
        .list_for_appointment(appointment.id)
        .await
        .unwrap()
        .into_iter()
        .find(|n| n.state == NotificationState::Failed)
        .unwrap();
    assert_eq!(stale.error_detail.as_deref(), Some("superseded"));
}

#[tokio::test]
async fn delivery_failures_are_recorded_per_notification() {
    let h = harness().await;
    let first = h.booking.create(Actor::Reception, desk(1, 9)).await.unwrap();
    let second = h.booking.create(Actor::Reception, desk(2, 10)).await.unwrap();

    // The transition itself is not affected by the failed mail.
    assert_eq!(second.state, AppointmentState::Confirmed);
    let confirmation = h
        .scheduler
        .list_for_appointment(second.id)
        .await
        .unwrap()
        .into_iter()
        .find(|n| n.kind == NotificationKind::Confirmation)
        .unwrap();
    assert_eq!(confirmation.state, NotificationState::Failed);
    assert!(confirmation.error_detail.unwrap().contains("mailbox unavailable"));

    h.clock.set(Utc.with_ymd_and_hms(2025, 6, 8, 10, 0, 0).unwrap());
    let reports = h.scheduler.dispatch_due().await.unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].appointment_id, first.id);
    assert_eq!(reports[0].outcome, DispatchOutcome::Sent);
    assert_eq!(reports[1].appointment_id, second.id);
    assert_matches!(&reports[1].outcome, DispatchOutcome::Failed { detail } if detail.contains("mailbox"));
}

#[tokio::test]
async fn patients_without_contact_are_skipped() {
    let h = harness().await;
    let appointment = h.booking.create(Actor::Patient, web(99)).await.unwrap();

    assert_eq!(appointment.state, AppointmentState::Pending);
    assert!(h.scheduler.list_for_appointment(appointment.id).await.unwrap().is_empty());
    assert!(h.sink.subjects().is_empty());
}

#[tokio::test]
async fn identical_notifications_are_not_recorded_twice() {
    let h = harness().await;
    let appointment = confirmed(&h, 1, 9).await;
    let due_at = reminder_time(next_monday(), at(9), TestConfig::default().to_app_config().clinic_offset());

    let again = h
        .scheduler
        .schedule(&appointment, NotificationKind::Reminder24h, Some(due_at))
        .await
        .unwrap();
    assert_eq!(again, None);
    assert_eq!(h.scheduler.list_for_appointment(appointment.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn overlapping_sweeps_send_each_reminder_once() {
    let h = harness().await;
    confirmed(&h, 1, 9).await;
    h.clock.set(Utc.with_ymd_and_hms(2025, 6, 8, 9, 0, 0).unwrap());

    let (a, b) = tokio::join!(h.scheduler.dispatch_due(), h.scheduler.dispatch_due());
    assert_eq!(a.unwrap().len() + b.unwrap().len(), 1);
}

#[tokio::test]
async fn worker_sweeps_on_start_and_stops_on_shutdown() {
    let h = harness().await;
    confirmed(&h, 1, 9).await;
    h.clock.set(Utc.with_ymd_and_hms(2025, 6, 8, 9, 0, 0).unwrap());

    let worker = Arc::new(ReminderSweepWorker::new(
        &TestConfig::default().to_app_config(),
        h.scheduler.clone(),
    ));
    let handle = tokio::spawn({
        let worker = worker.clone();
        async move { worker.run().await }
    });

    // ack + confirmation + reminder
    for _ in 0..100 {
        if h.sink.subjects().len() == 3 {
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    assert_eq!(h.sink.subjects().len(), 3);

    worker.shutdown();
    let joined = tokio_test::assert_ok!(tokio::time::timeout(StdDuration::from_secs(1), handle).await);
    tokio_test::assert_ok!(joined);
}

#[tokio::test]
async fn moving_back_to_a_superseded_slot_gets_a_fresh_reminder() {
    let h = harness().await;
    let appointment = confirmed(&h, 1, 9).await;
    reassign_to(&h, appointment.id, 10).await;

    h.clock.set(Utc.with_ymd_and_hms(2025, 6, 8, 9, 30, 0).unwrap());
    assert_eq!(sweep_outcomes(&h).await, vec![DispatchOutcome::Superseded]);

    reassign_to(&h, appointment.id, 9).await;
    h.clock.set(Utc.with_ymd_and_hms(2025, 6, 8, 12, 0, 0).unwrap());
    assert_eq!(
        sweep_outcomes(&h).await,
        vec![DispatchOutcome::Sent, DispatchOutcome::Superseded]
    );

    let sent = h.sink.sent.lock().unwrap().clone();
    let reminder = sent.last().unwrap();
    assert_eq!(reminder.subject, "Reminder: your appointment is tomorrow");
    assert!(reminder.body.contains("Time: 09:00"));
}

#[tokio::test]
async fn every_confirmation_is_announced() {
    let h = harness().await;
    let booked = h.booking.create(Actor::Reception, desk(1, 9)).await.unwrap();
    h.booking
        .overwrite_state(Actor::Reception, booked.id, AppointmentState::Pending)
        .await
        .unwrap();
    h.booking
        .confirm(
            Actor::Reception,
            booked.id,
            ConfirmAppointmentRequest {
                scheduled_date: next_monday(),
                scheduled_time: at(11),
                physician_id: None,
            },
        )
        .await
        .unwrap();

    let confirmations: Vec<OutboundMessage> = h
        .sink
        .sent
        .lock()
        .unwrap()
        .iter()
        .filter(|m| m.subject == "Appointment confirmed")
        .cloned()
        .collect();
    assert_eq!(confirmations.len(), 2);
    assert!(confirmations[0].body.contains("Time: 09:00"));
    assert!(confirmations[1].body.contains("Time: 11:00"));
}

#[tokio::test]
async fn unresponsive_mail_does_not_hold_up_the_transition() {
    let h = harness().await;

    let booked = tokio::time::timeout(
        StdDuration::from_secs(3),
        h.booking.create(Actor::Reception, desk(3, 9)),
    )
    .await
    .expect("create should not wait on the mail API")
    .unwrap();
    assert_eq!(booked.state, AppointmentState::Confirmed);

    let confirmation = h
        .scheduler
        .list_for_appointment(booked.id)
        .await
        .unwrap()
        .into_iter()
        .find(|n| n.kind == NotificationKind::Confirmation)
        .unwrap();
    assert_eq!(confirmation.state, NotificationState::Failed);
    assert!(confirmation.error_detail.unwrap().contains("timed out"));

    // The sweep is bounded the same way and leaves the lock free.
    h.clock.set(Utc.with_ymd_and_hms(2025, 6, 8, 9, 0, 0).unwrap());
    let outcomes = tokio::time::timeout(StdDuration::from_secs(3), sweep_outcomes(&h))
        .await
        .expect("sweep should finish");
    assert_matches!(&outcomes[..], [DispatchOutcome::Failed { detail }] if detail.contains("timed out"));
    assert!(tokio::time::timeout(StdDuration::from_secs(3), h.scheduler.dispatch_due())
        .await
        .is_ok());
}
