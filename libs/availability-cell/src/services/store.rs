use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveTime;
use tokio::sync::RwLock;

use crate::error::AvailabilityError;
use crate::models::{AvailabilityWindow, DayOfWeek};

/// Window fields without the store-assigned id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowDraft {
    pub physician_id: i64,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl WindowDraft {
    fn into_window(self, id: i64) -> AvailabilityWindow {
        AvailabilityWindow {
            id,
            physician_id: self.physician_id,
            day_of_week: self.day_of_week,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

/// Persistence seam for availability windows. Listings come back ordered by
/// day then start time.
#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    async fn list_all(&self) -> Result<Vec<AvailabilityWindow>, AvailabilityError>;

    async fn list_for_physician(&self, physician_id: i64) -> Result<Vec<AvailabilityWindow>, AvailabilityError>;

    async fn list_for_day(
        &self,
        physician_id: i64,
        day: DayOfWeek,
    ) -> Result<Vec<AvailabilityWindow>, AvailabilityError>;

    async fn get(&self, id: i64) -> Result<Option<AvailabilityWindow>, AvailabilityError>;

    async fn insert(&self, draft: WindowDraft) -> Result<AvailabilityWindow, AvailabilityError>;

    async fn update(&self, id: i64, draft: WindowDraft) -> Result<Option<AvailabilityWindow>, AvailabilityError>;

    async fn delete(&self, id: i64) -> Result<bool, AvailabilityError>;
}

#[derive(Default)]
struct Windows {
    last_id: i64,
    rows: BTreeMap<i64, AvailabilityWindow>,
}

#[derive(Default)]
pub struct InMemoryAvailabilityStore {
    inner: RwLock<Windows>,
}

impl InMemoryAvailabilityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted(mut windows: Vec<AvailabilityWindow>) -> Vec<AvailabilityWindow> {
    windows.sort_by_key(|w| (w.physician_id, w.day_of_week, w.start_time, w.id));
    windows
}

#[async_trait]
impl AvailabilityStore for InMemoryAvailabilityStore {
    async fn list_all(&self) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        let inner = self.inner.read().await;
        Ok(sorted(inner.rows.values().cloned().collect()))
    }

    async fn list_for_physician(&self, physician_id: i64) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        let inner = self.inner.read().await;
        Ok(sorted(
            inner
                .rows
                .values()
                .filter(|w| w.physician_id == physician_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_for_day(
        &self,
        physician_id: i64,
        day: DayOfWeek,
    ) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        let inner = self.inner.read().await;
        Ok(sorted(
            inner
                .rows
                .values()
                .filter(|w| w.physician_id == physician_id && w.day_of_week == day)
                .cloned()
                .collect(),
        ))
    }

    async fn get(&self, id: i64) -> Result<Option<AvailabilityWindow>, AvailabilityError> {
        Ok(self.inner.read().await.rows.get(&id).cloned())
    }

    async fn insert(&self, draft: WindowDraft) -> Result<AvailabilityWindow, AvailabilityError> {
        let mut inner = self.inner.write().await;
        inner.last_id += 1;
        let window = draft.into_window(inner.last_id);
        inner.rows.insert(window.id, window.clone());
        Ok(window)
    }

    async fn update(&self, id: i64, draft: WindowDraft) -> Result<Option<AvailabilityWindow>, AvailabilityError> {
        let mut inner = self.inner.write().await;
        match inner.rows.get_mut(&id) {
            Some(slot) => {
                *slot = draft.into_window(id);
                Ok(Some(slot.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: i64) -> Result<bool, AvailabilityError> {
        Ok(self.inner.write().await.rows.remove(&id).is_some())
    }
}
