// libs/appointment-cell/tests/booking_engine_test.rs
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use futures::future::join_all;

use appointment_cell::{
    AppointmentBookingService, AppointmentError, AppointmentEvent, AppointmentEventListener,
    AppointmentFilter, AppointmentKind, AppointmentState, CancelledBy, ConfirmAppointmentRequest,
    CreationRequest, DeskCreationRequest, InMemoryAppointmentStore, ReassignAppointmentRequest,
    WebCreationRequest,
};
use availability_cell::{AvailabilityService, CreateWindowRequest, DayOfWeek, InMemoryAvailabilityStore};
use shared_models::auth::Actor;
use shared_models::clock::FixedClock;
use shared_utils::test_utils::TestConfig;

const PHYSICIAN: i64 = 7;

#[derive(Default)]
struct RecordingListener {
    events: Mutex<Vec<&'static str>>,
}

#[async_trait]
impl AppointmentEventListener for RecordingListener {
    fn name(&self) -> &'static str {
        "recorder"
    }

    async fn on_event(&self, event: &AppointmentEvent) -> anyhow::Result<()> {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.name());
        }
        Ok(())
    }
}

struct FailingListener;

#[async_trait]
impl AppointmentEventListener for FailingListener {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn on_event(&self, _event: &AppointmentEvent) -> anyhow::Result<()> {
        anyhow::bail!("mail relay unreachable")
    }
}

struct Harness {
    booking: Arc<AppointmentBookingService>,
    recorder: Arc<RecordingListener>,
}

fn at(h: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, 0, 0).unwrap()
}

// Monday 2025-06-02 is "today"; the booking target is the next Monday.
fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
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

    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap()));
    let recorder = Arc::new(RecordingListener::default());
    let booking = AppointmentBookingService::new(
        &config,
        Arc::new(InMemoryAppointmentStore::new()),
        availability,
        clock,
    )
    .with_listener(recorder.clone())
    .with_listener(Arc::new(FailingListener));

    Harness {
        booking: Arc::new(booking),
        recorder,
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

fn desk(patient_id: i64, date: NaiveDate, hour: u32) -> CreationRequest {
    CreationRequest::Desk(DeskCreationRequest {
        patient_id,
        physician_id: PHYSICIAN,
        kind: AppointmentKind::FollowUp,
        shift_preference: None,
        scheduled_date: date,
        scheduled_time: at(hour),
    })
}

fn confirm_at(hour: u32) -> ConfirmAppointmentRequest {
    ConfirmAppointmentRequest {
        scheduled_date: next_monday(),
        scheduled_time: at(hour),
        physician_id: None,
    }
}

#[tokio::test]
async fn clinic_example_scenario() {
    let h = harness().await;

    let first = h.booking.create(Actor::Patient, web(1)).await.unwrap();
    assert_eq!(first.state, AppointmentState::Pending);
    assert_eq!(first.tracking_code.as_str(), "SEG-2025-001");
    assert_eq!(first.scheduled_date, None);
    assert_eq!(first.request_date, today());

    let second = h.booking.create(Actor::Patient, web(2)).await.unwrap();
    assert_eq!(second.tracking_code.as_str(), "SEG-2025-002");

    let confirmed = h.booking.confirm(Actor::Reception, first.id, confirm_at(9)).await.unwrap();
    assert_eq!(confirmed.state, AppointmentState::Confirmed);
    assert_eq!(confirmed.confirmation_date, Some(today()));
    assert_eq!(confirmed.slot(), Some((PHYSICIAN, next_monday(), at(9))));

    assert_matches!(
        h.booking.confirm(Actor::Reception, second.id, confirm_at(9)).await,
        Err(AppointmentError::SlotUnavailable { physician_id: PHYSICIAN, .. })
    );
    // The failed confirmation left the appointment untouched.
    assert_eq!(h.booking.get(second.id).await.unwrap().state, AppointmentState::Pending);

    let events = h.recorder.events.lock().unwrap().clone();
    assert_eq!(events, vec!["requested", "requested", "confirmed"]);
}

#[tokio::test]
async fn desk_booking_starts_confirmed_and_checks_the_slot() {
    let h = harness().await;

    let booked = h.booking.create(Actor::Reception, desk(1, next_monday(), 10)).await.unwrap();
    assert_eq!(booked.state, AppointmentState::Confirmed);
    assert_eq!(booked.confirmation_date, Some(today()));

    assert_matches!(
        h.booking.create(Actor::Reception, desk(2, next_monday(), 10)).await,
        Err(AppointmentError::SlotUnavailable { .. })
    );
    // Outside the Monday window
    assert_matches!(
        h.booking.create(Actor::Reception, desk(2, next_monday(), 13)).await,
        Err(AppointmentError::SlotUnavailable { .. })
    );
    let last_week = NaiveDate::from_ymd_opt(2025, 5, 26).unwrap();
    assert_matches!(
        h.booking.create(Actor::Reception, desk(2, last_week, 9)).await,
        Err(AppointmentError::InvalidRequest(_))
    );
}

#[tokio::test]
async fn origin_must_match_actor() {
    let h = harness().await;
    assert_matches!(
        h.booking.create(Actor::Reception, web(1)).await,
        Err(AppointmentError::InvalidOrigin { .. })
    );
    assert_matches!(
        h.booking.create(Actor::Patient, desk(1, next_monday(), 9)).await,
        Err(AppointmentError::InvalidOrigin { .. })
    );
    assert_matches!(
        h.booking
            .create(Actor::Physician { physician_id: PHYSICIAN }, web(1))
            .await,
        Err(AppointmentError::InvalidOrigin { .. })
    );
}

#[tokio::test]
async fn cancelling_frees_the_slot() {
    let h = harness().await;
    let booked = h.booking.create(Actor::Reception, desk(1, next_monday(), 9)).await.unwrap();

    let open = h.booking.available_slots(PHYSICIAN, next_monday()).await.unwrap();
    assert_eq!(open, vec![at(8), at(10), at(11)]);

    let cancelled = h
        .booking
        .cancel(Actor::Patient, booked.tracking_code.as_str(), CancelledBy::Patient)
        .await
        .unwrap();
    assert_eq!(cancelled.state, AppointmentState::Cancelled);
    assert_eq!(cancelled.cancelled_by, Some(CancelledBy::Patient));

    let open = h.booking.available_slots(PHYSICIAN, next_monday()).await.unwrap();
    assert_eq!(open, vec![at(8), at(9), at(10), at(11)]);

    assert_matches!(
        h.booking
            .cancel(Actor::Reception, booked.tracking_code.as_str(), CancelledBy::Reception)
            .await,
        Err(AppointmentError::InvalidTransition { from: AppointmentState::Cancelled, .. })
    );
}

#[tokio::test]
async fn cancelling_a_request_stamps_the_date() {
    let h = harness().await;
    let pending = h.booking.create(Actor::Patient, web(1)).await.unwrap();

    let cancelled = h
        .booking
        .cancel(Actor::Reception, pending.tracking_code.as_str(), CancelledBy::Reception)
        .await
        .unwrap();
    assert_eq!(cancelled.confirmation_date, Some(today()));
    assert_eq!(cancelled.cancelled_by, Some(CancelledBy::Reception));
}

#[tokio::test]
async fn cancel_rejects_unknown_codes_and_actors() {
    let h = harness().await;
    let pending = h.booking.create(Actor::Patient, web(1)).await.unwrap();

    assert_matches!(
        h.booking.cancel(Actor::Patient, "SEG-2025-999", CancelledBy::Patient).await,
        Err(AppointmentError::NotFound(_))
    );
    assert_matches!(
        h.booking
            .cancel(
                Actor::Physician { physician_id: PHYSICIAN },
                pending.tracking_code.as_str(),
                CancelledBy::Patient
            )
            .await,
        Err(AppointmentError::InvalidActor(_))
    );
    assert_matches!(
        h.booking
            .cancel(Actor::Patient, pending.tracking_code.as_str(), CancelledBy::Reception)
            .await,
        Err(AppointmentError::InvalidActor(_))
    );
    assert_matches!(CancelledBy::parse("medico"), Err(AppointmentError::InvalidActor(_)));
}

#[tokio::test]
async fn only_the_assigned_physician_completes() {
    let h = harness().await;
    let pending = h.booking.create(Actor::Patient, web(1)).await.unwrap();

    assert_matches!(
        h.booking
            .complete(Actor::Physician { physician_id: PHYSICIAN }, pending.id)
            .await,
        Err(AppointmentError::InvalidTransition { from: AppointmentState::Pending, .. })
    );

    h.booking.confirm(Actor::Reception, pending.id, confirm_at(8)).await.unwrap();
    assert_matches!(
        h.booking.complete(Actor::Physician { physician_id: 99 }, pending.id).await,
        Err(AppointmentError::InvalidActor(_))
    );
    assert_matches!(
        h.booking.complete(Actor::Reception, pending.id).await,
        Err(AppointmentError::InvalidActor(_))
    );

    let done = h
        .booking
        .complete(Actor::Physician { physician_id: PHYSICIAN }, pending.id)
        .await
        .unwrap();
    assert_eq!(done.state, AppointmentState::Completed);
}

#[tokio::test]
async fn terminal_states_only_yield_to_overwrite() {
    let h = harness().await;
    let booked = h.booking.create(Actor::Reception, desk(1, next_monday(), 11)).await.unwrap();
    h.booking
        .complete(Actor::Physician { physician_id: PHYSICIAN }, booked.id)
        .await
        .unwrap();

    assert_matches!(
        h.booking.confirm(Actor::Reception, booked.id, confirm_at(11)).await,
        Err(AppointmentError::InvalidTransition { .. })
    );
    assert_matches!(
        h.booking
            .cancel(Actor::Reception, booked.tracking_code.as_str(), CancelledBy::Reception)
            .await,
        Err(AppointmentError::InvalidTransition { .. })
    );
    assert_matches!(
        h.booking.overwrite_state(Actor::Patient, booked.id, AppointmentState::Pending).await,
        Err(AppointmentError::InvalidActor(_))
    );

    let reopened = h
        .booking
        .overwrite_state(Actor::Reception, booked.id, AppointmentState::Confirmed)
        .await
        .unwrap();
    assert_eq!(reopened.state, AppointmentState::Confirmed);
    assert_eq!(reopened.tracking_code, booked.tracking_code);
}

#[tokio::test]
async fn reassign_moves_to_another_open_slot() {
    let h = harness().await;
    let booked = h.booking.create(Actor::Reception, desk(1, next_monday(), 9)).await.unwrap();
    h.booking.create(Actor::Reception, desk(2, next_monday(), 10)).await.unwrap();

    assert_matches!(
        h.booking
            .reassign(
                Actor::Reception,
                booked.id,
                ReassignAppointmentRequest { scheduled_date: next_monday(), scheduled_time: at(10) },
            )
            .await,
        Err(AppointmentError::SlotUnavailable { .. })
    );

    let moved = h
        .booking
        .reassign(
            Actor::Reception,
            booked.id,
            ReassignAppointmentRequest { scheduled_date: next_monday(), scheduled_time: at(11) },
        )
        .await
        .unwrap();
    assert_eq!(moved.state, AppointmentState::Confirmed);
    assert_eq!(moved.scheduled_time, Some(at(11)));

    let open = h.booking.available_slots(PHYSICIAN, next_monday()).await.unwrap();
    assert_eq!(open, vec![at(8), at(9)]);
    assert!(h.recorder.events.lock().unwrap().contains(&"rescheduled"));
}

#[tokio::test]
async fn past_dates_have_no_slots() {
    let h = harness().await;
    let last_week = NaiveDate::from_ymd_opt(2025, 5, 26).unwrap();
    assert_matches!(
        h.booking.available_slots(PHYSICIAN, last_week).await,
        Err(AppointmentError::InvalidRequest(_))
    );
    // Today is still bookable.
    assert_eq!(
        h.booking.available_slots(PHYSICIAN, today()).await.unwrap(),
        vec![at(8), at(9), at(10), at(11)]
    );
}

#[tokio::test]
async fn agenda_and_listing_order() {
    let h = harness().await;
    let later = h.booking.create(Actor::Reception, desk(1, next_monday(), 11)).await.unwrap();
    let earlier = h.booking.create(Actor::Reception, desk(2, next_monday(), 8)).await.unwrap();
    let pending = h.booking.create(Actor::Patient, web(3)).await.unwrap();
    let week_after = NaiveDate::from_ymd_opt(2025, 6, 16).unwrap();
    let far = h.booking.create(Actor::Reception, desk(4, week_after, 9)).await.unwrap();

    let agenda: Vec<i64> = h
        .booking
        .physician_agenda(PHYSICIAN)
        .await
        .unwrap()
        .iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(agenda, vec![earlier.id, later.id, far.id]);

    let listing: Vec<i64> = h
        .booking
        .list(&AppointmentFilter::default())
        .await
        .unwrap()
        .iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(listing, vec![far.id, earlier.id, later.id, pending.id]);

    let for_patient = h
        .booking
        .list(&AppointmentFilter { patient_id: Some(3), ..AppointmentFilter::default() })
        .await
        .unwrap();
    assert_eq!(for_patient.len(), 1);
}

#[tokio::test]
async fn concurrent_requests_get_distinct_codes() {
    let h = harness().await;

    let handles: Vec<_> = (0..40)
        .map(|patient_id| {
            let booking = Arc::clone(&h.booking);
            tokio::spawn(async move { booking.create(Actor::Patient, web(patient_id)).await })
        })
        .collect();

    let codes: HashSet<String> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().tracking_code.to_string())
        .collect();

    assert_eq!(codes.len(), 40);
    for sequence in 1..=40 {
        assert!(codes.contains(&format!("SEG-2025-{:03}", sequence)));
    }
}

#[tokio::test]
async fn concurrent_confirmations_of_one_slot_admit_one() {
    let h = harness().await;
    let mut ids = Vec::new();
    for patient_id in 0..8 {
        ids.push(h.booking.create(Actor::Patient, web(patient_id)).await.unwrap().id);
    }

    let handles: Vec<_> = ids
        .into_iter()
        .map(|id| {
            let booking = Arc::clone(&h.booking);
            tokio::spawn(async move { booking.confirm(Actor::Reception, id, confirm_at(9)).await })
        })
        .collect();

    let mut confirmed = 0;
    for result in join_all(handles).await {
        match result.unwrap() {
            Ok(_) => confirmed += 1,
            Err(e) => assert_matches!(e, AppointmentError::SlotUnavailable { .. }),
        }
    }
    assert_eq!(confirmed, 1);
}
