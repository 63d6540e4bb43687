use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::doctor::DoctorStatus;
use shared_models::error::AppError;
use shared_models::schedule::{DEFAULT_SLOT_MINUTES, MAX_SLOT_MINUTES, MIN_SLOT_MINUTES};
use shared_models::Page;
use shared_utils::validation::{validate_length, validate_optional_length, validate_range};

// ==============================================================================
// DOCTOR PROFILES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDoctorRequest {
    pub bio: String,
    pub experience_years: i32,
    pub license_number: String,
    pub specialization_id: Uuid,
}

impl RegisterDoctorRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_length("bio", &self.bio, 10, 2000)?;
        validate_range("experience_years", self.experience_years, 0, 70)?;
        validate_length("license_number", &self.license_number, 5, 100)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminCreateDoctorRequest {
    pub user_id: Uuid,
    pub bio: String,
    pub experience_years: i32,
    pub license_number: String,
    pub specialization_id: Uuid,
    pub rating: Option<f64>,
}

impl AdminCreateDoctorRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_length("bio", &self.bio, 10, 2000)?;
        validate_range("experience_years", self.experience_years, 0, 70)?;
        validate_length("license_number", &self.license_number, 5, 100)?;
        if let Some(rating) = self.rating {
            validate_range("rating", rating, 0.0, 5.0)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDoctorRequest {
    pub bio: Option<String>,
    pub experience_years: Option<i32>,
    pub license_number: Option<String>,
    pub specialization_id: Option<Uuid>,
    /// Only honoured for admins.
    pub rating: Option<f64>,
}

impl UpdateDoctorRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_optional_length("bio", self.bio.as_deref(), 10, 2000)?;
        if let Some(years) = self.experience_years {
            validate_range("experience_years", years, 0, 70)?;
        }
        validate_optional_length("license_number", self.license_number.as_deref(), 5, 100)?;
        if let Some(rating) = self.rating {
            validate_range("rating", rating, 0.0, 5.0)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReasonRequest {
    pub reason: String,
}

impl StatusReasonRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_length("reason", self.reason.trim(), 1, 1000)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorListQuery {
    pub status: Option<DoctorStatus>,
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    shared_models::DEFAULT_PAGE_LIMIT
}

impl DoctorListQuery {
    pub fn page(&self) -> Page {
        Page::new(self.skip, self.limit)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplicationStatus {
    pub has_application: bool,
    pub status: Option<DoctorStatus>,
    pub rejection_reason: Option<String>,
}

// ==============================================================================
// SPECIALIZATIONS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSpecializationRequest {
    pub title: String,
    pub description: Option<String>,
}

impl CreateSpecializationRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_length("title", self.title.trim(), 2, 100)?;
        validate_optional_length("description", self.description.as_deref(), 0, 1000)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSpecializationRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl UpdateSpecializationRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_optional_length("title", self.title.as_deref().map(str::trim), 2, 100)?;
        validate_optional_length("description", self.description.as_deref(), 0, 1000)
    }
}

// ==============================================================================
// SCHEDULES
// ==============================================================================

fn default_slot_minutes() -> i32 {
    DEFAULT_SLOT_MINUTES
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateScheduleRequest {
    /// Defaults to the caller's own doctor profile.
    pub doctor_id: Option<Uuid>,
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default = "default_slot_minutes")]
    pub slot_duration_minutes: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateScheduleRequest {
    pub day_of_week: Option<i16>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub slot_duration_minutes: Option<i32>,
    pub is_active: Option<bool>,
}

/// Rules every stored schedule satisfies, checked on create and on the
/// merged record of an update.
pub fn validate_schedule_window(
    day_of_week: i16,
    start_time: NaiveTime,
    end_time: NaiveTime,
    slot_duration_minutes: i32,
) -> Result<(), AppError> {
    if !(0..=6).contains(&day_of_week) {
        return Err(AppError::ValidationError(
            "Day of week must be between 0 (Monday) and 6 (Sunday)".to_string(),
        ));
    }
    if start_time >= end_time {
        return Err(AppError::ValidationError(
            "Start time must be before end time".to_string(),
        ));
    }
    if !(MIN_SLOT_MINUTES..=MAX_SLOT_MINUTES).contains(&slot_duration_minutes) {
        return Err(AppError::ValidationError(format!(
            "Slot duration must be between {} and {} minutes",
            MIN_SLOT_MINUTES, MAX_SLOT_MINUTES
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
}
