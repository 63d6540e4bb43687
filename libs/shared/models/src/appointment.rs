use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schedule::DEFAULT_SLOT_MINUTES;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::InProgress => write!(f, "in_progress"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

impl AppointmentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }

    /// Whether an appointment in this state still holds its time on the doctor's calendar.
    pub fn occupies_slot(self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::NoShow)
    }
}

fn default_duration() -> i32 {
    DEFAULT_SLOT_MINUTES
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub date_time: DateTime<Utc>,
    #[serde(default = "default_duration")]
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub ai_consultation_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn end_time(&self) -> DateTime<Utc> {
        let minutes = if self.duration_minutes > 0 {
            self.duration_minutes
        } else {
            DEFAULT_SLOT_MINUTES
        };
        self.date_time + Duration::minutes(i64::from(minutes))
    }

    /// Half-open interval overlap against `[start, end)`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.date_time < end && start < self.end_time()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewAppointment {
    pub date_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub ai_consultation_id: Option<Uuid>,
}

impl NewAppointment {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.date_time + Duration::minutes(i64::from(self.duration_minutes))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AppointmentChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Listing filter shared by patient, doctor and admin views.
#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl AppointmentFilter {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.status.map_or(true, |s| appointment.status == s)
            && self.date_from.map_or(true, |from| appointment.date_time >= from)
            && self.date_to.map_or(true, |to| appointment.date_time <= to)
    }
}
