// libs/availability-cell/src/models.rs
use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use shared_models::formats::hhmm;

// ==============================================================================
// WEEKLY AVAILABILITY
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    #[serde(alias = "Monday", alias = "lunes", alias = "Lunes", alias = "mon")]
    Monday,
    #[serde(alias = "Tuesday", alias = "martes", alias = "Martes", alias = "tue")]
    Tuesday,
    #[serde(alias = "Wednesday", alias = "miercoles", alias = "miércoles", alias = "Miércoles", alias = "wed")]
    Wednesday,
    #[serde(alias = "Thursday", alias = "jueves", alias = "Jueves", alias = "thu")]
    Thursday,
    #[serde(alias = "Friday", alias = "viernes", alias = "Viernes", alias = "fri")]
    Friday,
    #[serde(alias = "Saturday", alias = "sabado", alias = "sábado", alias = "Sábado", alias = "sat")]
    Saturday,
    #[serde(alias = "Sunday", alias = "domingo", alias = "Domingo", alias = "sun")]
    Sunday,
}

impl DayOfWeek {
    pub fn of(date: NaiveDate) -> Self {
        date.weekday().into()
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        };
        write!(f, "{}", name)
    }
}

/// A recurring weekly interval during which a physician accepts appointments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: i64,
    pub physician_id: i64,
    pub day_of_week: DayOfWeek,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
}

impl AvailabilityWindow {
    pub fn overlaps(&self, day: DayOfWeek, start: NaiveTime, end: NaiveTime) -> bool {
        self.day_of_week == day && start < self.end_time && self.start_time < end
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateWindowRequest {
    pub physician_id: i64,
    pub day_of_week: DayOfWeek,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateWindowRequest {
    pub day_of_week: DayOfWeek,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
}
