use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;
use shared_models::Page;
use shared_utils::validation::{validate_length, validate_optional_length};

const DIAGNOSIS_MIN: usize = 5;
const DIAGNOSIS_MAX: usize = 5000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMedicalRecordRequest {
    pub diagnosis: String,
    pub prescription: Option<String>,
    pub notes: Option<String>,
    pub patient_id: Uuid,
    /// Defaults to the caller's doctor profile.
    pub doctor_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
}

impl CreateMedicalRecordRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_length("diagnosis", &self.diagnosis, DIAGNOSIS_MIN, DIAGNOSIS_MAX)?;
        validate_optional_length("prescription", self.prescription.as_deref(), 0, 5000)?;
        validate_optional_length("notes", self.notes.as_deref(), 0, 5000)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateMedicalRecordRequest {
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub notes: Option<String>,
}

impl UpdateMedicalRecordRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_optional_length("diagnosis", self.diagnosis.as_deref(), DIAGNOSIS_MIN, DIAGNOSIS_MAX)?;
        validate_optional_length("prescription", self.prescription.as_deref(), 0, 5000)?;
        validate_optional_length("notes", self.notes.as_deref(), 0, 5000)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RecordListQuery {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

impl From<RecordListQuery> for Page {
    fn from(query: RecordListQuery) -> Self {
        Page::new(query.skip, query.limit)
    }
}
