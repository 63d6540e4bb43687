use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::appointment::{AppointmentFilter, AppointmentStatus};
use shared_models::error::AppError;
use shared_models::Page;
use shared_utils::validation::validate_optional_length;

// ==============================================================================
// REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub doctor_id: Uuid,
    /// Defaults to the caller.
    pub patient_id: Option<Uuid>,
    pub date_time: DateTime<Utc>,
    pub notes: Option<String>,
    pub ai_consultation_id: Option<Uuid>,
}

impl CreateAppointmentRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_optional_length("notes", self.notes.as_deref(), 0, 2000)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub date_time: Option<DateTime<Utc>>,
    pub status: Option<AppointmentStatus>,
    pub notes: Option<String>,
}

impl UpdateAppointmentRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_optional_length("notes", self.notes.as_deref(), 0, 2000)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<AppointmentStatus>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    shared_models::DEFAULT_PAGE_LIMIT
}

impl Default for AppointmentListQuery {
    fn default() -> Self {
        Self {
            status: None,
            date_from: None,
            date_to: None,
            skip: 0,
            limit: default_limit(),
        }
    }
}

impl AppointmentListQuery {
    pub fn filter(&self) -> AppointmentFilter {
        AppointmentFilter {
            status: self.status,
            date_from: self.date_from,
            date_to: self.date_to,
        }
    }

    pub fn page(&self) -> Page {
        Page::new(self.skip, self.limit)
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("AI consultation not found")]
    ConsultationNotFound,

    #[error("You can only book appointments for yourself")]
    NotThePatient,

    #[error("Not enough permissions")]
    NotParticipant,

    #[error("Appointment time must be in the future")]
    PastTime,

    #[error("Patients can only cancel appointments")]
    PatientStatusChange(AppointmentStatus),

    #[error("Cannot cancel appointment with status {0}")]
    NotCancellable(AppointmentStatus),

    #[error("Cannot change an appointment with status {0}")]
    Finished(AppointmentStatus),

    #[error("This time slot is already booked")]
    SlotTaken,
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        let message = err.to_string();
        match err {
            AppointmentError::NotFound
            | AppointmentError::DoctorNotFound
            | AppointmentError::ConsultationNotFound => AppError::NotFound(message),
            AppointmentError::NotThePatient
            | AppointmentError::NotParticipant
            | AppointmentError::PatientStatusChange(_) => AppError::Forbidden(message),
            AppointmentError::PastTime
            | AppointmentError::NotCancellable(_)
            | AppointmentError::Finished(_) => AppError::ValidationError(message),
            AppointmentError::SlotTaken => AppError::Conflict(message),
        }
    }
}
