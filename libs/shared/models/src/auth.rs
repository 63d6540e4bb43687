use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::doctor::{Doctor, DoctorStatus};
use crate::error::AppError;
use crate::user::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub typ: TokenKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

impl TokenPair {
    pub fn bearer(access_token: String, refresh_token: String) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// The authenticated caller, resolved once per request by the auth middleware
/// and handed to handlers through request extensions.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub doctor: Option<Doctor>,
}

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_admin
    }

    /// Doctor profile in any lifecycle state.
    pub fn doctor(&self) -> Option<&Doctor> {
        self.doctor.as_ref()
    }

    pub fn doctor_id(&self) -> Option<Uuid> {
        self.doctor.as_ref().map(|d| d.id)
    }

    pub fn owns_doctor(&self, doctor_id: Uuid) -> bool {
        self.doctor_id() == Some(doctor_id)
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Not enough permissions".to_string()))
        }
    }

    pub fn require_doctor(&self) -> Result<&Doctor, AppError> {
        self.doctor()
            .ok_or_else(|| AppError::Forbidden("User is not a doctor".to_string()))
    }

    /// Doctor profile that has passed admin review.
    pub fn require_approved_doctor(&self) -> Result<&Doctor, AppError> {
        match self.doctor() {
            None => Err(AppError::Forbidden("User is not a doctor".to_string())),
            Some(d) if d.status != DoctorStatus::Approved => Err(AppError::Forbidden(format!(
                "Doctor profile is {}",
                d.status
            ))),
            Some(d) => Ok(d),
        }
    }
}
