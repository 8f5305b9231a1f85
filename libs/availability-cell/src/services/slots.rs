use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime, Timelike};

use crate::models::{AvailabilityWindow, DayOfWeek};

pub const DEFAULT_SLOT_DURATION_MINUTES: u32 = 60;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Start times of every full slot the windows offer on `date`, ascending and
/// without duplicates. A trailing remainder shorter than the slot is dropped.
pub fn generate_slots(
    windows: &[AvailabilityWindow],
    date: NaiveDate,
    slot_duration_minutes: u32,
) -> Vec<NaiveTime> {
    if slot_duration_minutes == 0 {
        return Vec::new();
    }

    let day = DayOfWeek::of(date);
    let mut slots = BTreeSet::new();

    for window in windows.iter().filter(|w| w.day_of_week == day) {
        let end = minutes_of(window.end_time);
        let mut cursor = minutes_of(window.start_time);

        while cursor + slot_duration_minutes <= end {
            if let Some(time) = time_of(cursor) {
                slots.insert(time);
            }
            cursor += slot_duration_minutes;
        }
    }

    slots.into_iter().collect()
}

fn minutes_of(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

fn time_of(minutes: u32) -> Option<NaiveTime> {
    if minutes >= MINUTES_PER_DAY {
        return None;
    }
    NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
}
