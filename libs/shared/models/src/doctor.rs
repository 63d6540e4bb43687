use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DoctorStatus {
    Pending,
    Approved,
    Rejected,
    Suspended,
}

impl fmt::Display for DoctorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DoctorStatus::Pending => write!(f, "pending"),
            DoctorStatus::Approved => write!(f, "approved"),
            DoctorStatus::Rejected => write!(f, "rejected"),
            DoctorStatus::Suspended => write!(f, "suspended"),
        }
    }
}

/// Admin-driven lifecycle transitions of a doctor profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoctorTransition {
    Approve,
    Reject,
    Suspend,
    Reinstate,
}

impl DoctorStatus {
    /// Resolves the target state of `transition`, or explains why the current
    /// state is not its predecessor.
    pub fn apply(self, transition: DoctorTransition) -> Result<DoctorStatus, AppError> {
        use DoctorStatus::*;
        use DoctorTransition::*;

        match (transition, self) {
            (Approve, Pending) => Ok(Approved),
            (Reject, Pending) => Ok(Rejected),
            (Suspend, Approved) => Ok(Suspended),
            (Reinstate, Suspended) => Ok(Approved),
            (Approve | Reject, current) => Err(AppError::ValidationError(format!(
                "Doctor is already {}",
                current
            ))),
            (Suspend, _) => Err(AppError::ValidationError(
                "Can only suspend approved doctors".to_string(),
            )),
            (Reinstate, _) => Err(AppError::ValidationError(
                "Can only reinstate suspended doctors".to_string(),
            )),
        }
    }

    pub fn is_public(self) -> bool {
        self == DoctorStatus::Approved
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bio: String,
    pub rating: f64,
    pub experience_years: i32,
    pub license_number: String,
    pub status: DoctorStatus,
    pub rejection_reason: Option<String>,
    pub specialization_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Doctor joined with its owner and specialization for listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorDetails {
    #[serde(flatten)]
    pub doctor: Doctor,
    pub full_name: String,
    pub email: String,
    pub specialization_title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewDoctor {
    pub user_id: Uuid,
    pub bio: String,
    pub rating: f64,
    pub experience_years: i32,
    pub license_number: String,
    pub status: DoctorStatus,
    pub specialization_id: Uuid,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DoctorChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience_years: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Specialization {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpecializationWithCount {
    #[serde(flatten)]
    pub specialization: Specialization,
    pub doctor_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewSpecialization {
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SpecializationChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use DoctorStatus::*;
    use DoctorTransition::*;

    #[test]
    fn transitions_follow_the_lifecycle() {
        assert_eq!(Pending.apply(Approve).unwrap(), Approved);
        assert_eq!(Pending.apply(Reject).unwrap(), Rejected);
        assert_eq!(Approved.apply(Suspend).unwrap(), Suspended);
        assert_eq!(Suspended.apply(Reinstate).unwrap(), Approved);
    }

    #[test]
    fn transitions_from_wrong_state_are_rejected() {
        for status in [Approved, Rejected, Suspended] {
            assert!(status.apply(Approve).is_err());
            assert!(status.apply(Reject).is_err());
        }
        for status in [Pending, Rejected, Suspended] {
            assert!(status.apply(Suspend).is_err());
        }
        for status in [Pending, Approved, Rejected] {
            assert!(status.apply(Reinstate).is_err());
        }
    }

    #[test]
    fn approving_a_rejected_doctor_names_the_state() {
        let err = Rejected.apply(Approve).unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Doctor is already rejected");
    }
}
