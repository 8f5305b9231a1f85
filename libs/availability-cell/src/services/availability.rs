use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, info, instrument, warn};

use shared_config::AppConfig;

use crate::error::AvailabilityError;
use crate::models::{AvailabilityWindow, CreateWindowRequest, DayOfWeek, UpdateWindowRequest};
use crate::services::slots::generate_slots;
use crate::services::store::{AvailabilityStore, WindowDraft};

/// Manages physicians' weekly windows and answers "which slots exist on
/// this date" for the booking side.
pub struct AvailabilityService {
    store: Arc<dyn AvailabilityStore>,
    slot_duration_minutes: u32,
    reject_overlaps: bool,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig, store: Arc<dyn AvailabilityStore>) -> Self {
        Self {
            store,
            slot_duration_minutes: config.slot_duration_minutes,
            reject_overlaps: config.reject_overlapping_windows,
        }
    }

    #[instrument(skip(self))]
    pub async fn create_window(&self, request: CreateWindowRequest) -> Result<AvailabilityWindow, AvailabilityError> {
        validate_range(request.start_time, request.end_time)?;
        if request.physician_id <= 0 {
            return Err(AvailabilityError::InvalidRequest("physician_id must be positive".to_string()));
        }

        self.check_overlaps(request.physician_id, request.day_of_week, request.start_time, request.end_time, None)
            .await?;

        let window = self
            .store
            .insert(WindowDraft {
                physician_id: request.physician_id,
                day_of_week: request.day_of_week,
                start_time: request.start_time,
                end_time: request.end_time,
            })
            .await?;

        info!("Created availability window {} for physician {}", window.id, window.physician_id);
        Ok(window)
    }

    #[instrument(skip(self))]
    pub async fn update_window(
        &self,
        window_id: i64,
        request: UpdateWindowRequest,
    ) -> Result<AvailabilityWindow, AvailabilityError> {
        validate_range(request.start_time, request.end_time)?;

        let current = self
            .store
            .get(window_id)
            .await?
            .ok_or(AvailabilityError::NotFound(window_id))?;

        self.check_overlaps(
            current.physician_id,
            request.day_of_week,
            request.start_time,
            request.end_time,
            Some(window_id),
        )
        .await?;

        let draft = WindowDraft {
            physician_id: current.physician_id,
            day_of_week: request.day_of_week,
            start_time: request.start_time,
            end_time: request.end_time,
        };

        self.store
            .update(window_id, draft)
            .await?
            .ok_or(AvailabilityError::NotFound(window_id))
    }

    #[instrument(skip(self))]
    pub async fn delete_window(&self, window_id: i64) -> Result<(), AvailabilityError> {
        if !self.store.delete(window_id).await? {
            return Err(AvailabilityError::NotFound(window_id));
        }
        info!("Deleted availability window {}", window_id);
        Ok(())
    }

    pub async fn get_window(&self, window_id: i64) -> Result<AvailabilityWindow, AvailabilityError> {
        self.store
            .get(window_id)
            .await?
            .ok_or(AvailabilityError::NotFound(window_id))
    }

    pub async fn list_for_physician(&self, physician_id: i64) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        self.store.list_for_physician(physician_id).await
    }

    pub async fn list_all(&self) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        self.store.list_all().await
    }

    /// Windows matching the weekday of `date`.
    pub async fn windows_for_date(
        &self,
        physician_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        self.store.list_for_day(physician_id, DayOfWeek::of(date)).await
    }

    /// Every slot start the physician's windows offer on `date`, ignoring bookings.
    pub async fn slots_for_date(
        &self,
        physician_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<NaiveTime>, AvailabilityError> {
        let windows = self.windows_for_date(physician_id, date).await?;
        let slots = generate_slots(&windows, date, self.slot_duration_minutes);
        debug!("{} slots for physician {} on {}", slots.len(), physician_id, date);
        Ok(slots)
    }

    async fn check_overlaps(
        &self,
        physician_id: i64,
        day: DayOfWeek,
        start: NaiveTime,
        end: NaiveTime,
        exclude_id: Option<i64>,
    ) -> Result<(), AvailabilityError> {
        if !self.reject_overlaps {
            return Ok(());
        }

        let existing = self.store.list_for_day(physician_id, day).await?;
        if let Some(clash) = existing
            .iter()
            .filter(|w| Some(w.id) != exclude_id)
            .find(|w| w.overlaps(day, start, end))
        {
            warn!("Window {} {}-{} overlaps window {}", day, start, end, clash.id);
            return Err(AvailabilityError::Overlap {
                existing_id: clash.id,
                day,
                start,
                end,
            });
        }

        Ok(())
    }
}

fn validate_range(start: NaiveTime, end: NaiveTime) -> Result<(), AvailabilityError> {
    if start >= end {
        return Err(AvailabilityError::InvalidRequest(
            "Start time must be before end time".to_string(),
        ));
    }
    Ok(())
}
