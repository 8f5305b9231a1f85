use chrono::{NaiveDate, NaiveTime};
use tracing::debug;

use crate::models::Appointment;

/// Candidate slots minus those occupied by a non-cancelled appointment of
/// the same physician on the same date. Order is preserved.
///
/// Past dates are the caller's problem; nothing here looks at the clock.
pub fn available_slots(
    candidates: &[NaiveTime],
    physician_id: i64,
    date: NaiveDate,
    existing: &[Appointment],
) -> Vec<NaiveTime> {
    let open: Vec<NaiveTime> = candidates
        .iter()
        .copied()
        .filter(|slot| !existing.iter().any(|a| a.occupies(physician_id, date, *slot)))
        .collect();

    debug!(
        "{} of {} slots open for physician {} on {}",
        open.len(),
        candidates.len(),
        physician_id,
        date
    );
    open
}
