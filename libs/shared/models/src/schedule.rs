use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DAYS_OF_WEEK: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

pub const DEFAULT_SLOT_MINUTES: i32 = 30;
pub const MIN_SLOT_MINUTES: i32 = 10;
pub const MAX_SLOT_MINUTES: i32 = 120;

/// Weekday index with Monday = 0 and Sunday = 6.
pub fn day_index(date: NaiveDate) -> i16 {
    date.weekday().num_days_from_monday() as i16
}

pub fn day_name(day_of_week: i16) -> &'static str {
    usize::try_from(day_of_week)
        .ok()
        .and_then(|i| DAYS_OF_WEEK.get(i).copied())
        .unwrap_or("Unknown")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Schedule {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration_minutes: i32,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewSchedule {
    pub doctor_id: Uuid,
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration_minutes: i32,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScheduleChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_duration_minutes: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeSlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_available: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monday_is_day_zero() {
        let monday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(day_index(monday), 0);
        assert_eq!(day_name(day_index(monday)), "Monday");

        let sunday = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        assert_eq!(day_index(sunday), 6);
    }

    #[test]
    fn out_of_range_day_has_no_name() {
        assert_eq!(day_name(7), "Unknown");
        assert_eq!(day_name(-1), "Unknown");
    }
}
