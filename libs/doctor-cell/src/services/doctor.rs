use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{DoctorRepository, SpecializationRepository, UserRepository};
use shared_models::auth::AuthUser;
use shared_models::doctor::{
    Doctor, DoctorChanges, DoctorDetails, DoctorStatus, DoctorTransition, NewDoctor,
};
use shared_models::error::AppError;
use shared_models::Page;

use crate::models::{
    AdminCreateDoctorRequest, ApplicationStatus, RegisterDoctorRequest, StatusReasonRequest,
    UpdateDoctorRequest,
};

/// Doctor applications and the admin approval lifecycle.
pub struct DoctorService {
    doctors: Arc<dyn DoctorRepository>,
    users: Arc<dyn UserRepository>,
    specializations: Arc<dyn SpecializationRepository>,
}

fn doctor_not_found() -> AppError {
    AppError::NotFound("Doctor not found".to_string())
}

impl DoctorService {
    pub fn new(
        doctors: Arc<dyn DoctorRepository>,
        users: Arc<dyn UserRepository>,
        specializations: Arc<dyn SpecializationRepository>,
    ) -> Self {
        Self {
            doctors,
            users,
            specializations,
        }
    }

    async fn ensure_specialization(&self, specialization_id: Uuid) -> Result<(), AppError> {
        match self.specializations.get_by_id(specialization_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound("Specialization not found".to_string())),
        }
    }

    async fn ensure_license_free(&self, license_number: &str, owner: Option<Uuid>) -> Result<(), AppError> {
        match self.doctors.get_by_license_number(license_number).await? {
            Some(existing) if Some(existing.id) != owner => Err(AppError::Conflict(
                "License number already registered".to_string(),
            )),
            _ => Ok(()),
        }
    }

    async fn load(&self, doctor_id: Uuid) -> Result<Doctor, AppError> {
        self.doctors
            .get_by_id(doctor_id)
            .await?
            .ok_or_else(doctor_not_found)
    }

    async fn details(&self, doctor_id: Uuid) -> Result<DoctorDetails, AppError> {
        self.doctors
            .get_details(doctor_id)
            .await?
            .ok_or_else(doctor_not_found)
    }

    pub async fn register_as_doctor(
        &self,
        caller: &AuthUser,
        request: RegisterDoctorRequest,
    ) -> Result<Doctor, AppError> {
        request.validate()?;
        debug!("User {} applying as doctor", caller.id());

        if let Some(existing) = self.doctors.get_by_user_id(caller.id()).await? {
            let message = match existing.status {
                DoctorStatus::Pending => "Your application is pending approval".to_string(),
                DoctorStatus::Rejected => format!(
                    "Your previous application was rejected: {}",
                    existing.rejection_reason.unwrap_or_default()
                ),
                DoctorStatus::Approved | DoctorStatus::Suspended => {
                    "You already have a doctor profile".to_string()
                }
            };
            return Err(AppError::Conflict(message));
        }

        self.ensure_license_free(&request.license_number, None).await?;
        self.ensure_specialization(request.specialization_id).await?;

        let doctor = self
            .doctors
            .create(NewDoctor {
                user_id: caller.id(),
                bio: request.bio,
                rating: 0.0,
                experience_years: request.experience_years,
                license_number: request.license_number,
                status: DoctorStatus::Pending,
                specialization_id: request.specialization_id,
            })
            .await?;

        info!("Doctor application {} submitted by user {}", doctor.id, caller.id());
        Ok(doctor)
    }

    pub async fn admin_create(
        &self,
        caller: &AuthUser,
        request: AdminCreateDoctorRequest,
    ) -> Result<Doctor, AppError> {
        caller.require_admin()?;
        request.validate()?;

        if self.users.get_by_id(request.user_id).await?.is_none() {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        if self.doctors.get_by_user_id(request.user_id).await?.is_some() {
            return Err(AppError::Conflict("User already has a doctor profile".to_string()));
        }
        self.ensure_license_free(&request.license_number, None).await?;
        self.ensure_specialization(request.specialization_id).await?;

        let doctor = self
            .doctors
            .create(NewDoctor {
                user_id: request.user_id,
                bio: request.bio,
                rating: request.rating.unwrap_or(0.0),
                experience_years: request.experience_years,
                license_number: request.license_number,
                status: DoctorStatus::Approved,
                specialization_id: request.specialization_id,
            })
            .await?;

        info!("Doctor {} created and approved by admin {}", doctor.id, caller.id());
        Ok(doctor)
    }

    async fn transition(
        &self,
        caller: &AuthUser,
        doctor_id: Uuid,
        transition: DoctorTransition,
        reason: Option<String>,
    ) -> Result<Doctor, AppError> {
        caller.require_admin()?;
        let doctor = self.load(doctor_id).await?;

        let next = doctor.status.apply(transition).map_err(|e| {
            warn!("Rejected {:?} of doctor {} in state {}", transition, doctor_id, doctor.status);
            e
        })?;

        let updated = self.doctors.set_status(doctor_id, next, reason).await?;
        info!("Doctor {} moved {} -> {}", doctor_id, doctor.status, next);
        Ok(updated)
    }

    pub async fn approve(&self, caller: &AuthUser, doctor_id: Uuid) -> Result<Doctor, AppError> {
        self.transition(caller, doctor_id, DoctorTransition::Approve, None)
            .await
    }

    pub async fn reject(
        &self,
        caller: &AuthUser,
        doctor_id: Uuid,
        request: StatusReasonRequest,
    ) -> Result<Doctor, AppError> {
        request.validate()?;
        self.transition(caller, doctor_id, DoctorTransition::Reject, Some(request.reason))
            .await
    }

    pub async fn suspend(
        &self,
        caller: &AuthUser,
        doctor_id: Uuid,
        request: StatusReasonRequest,
    ) -> Result<Doctor, AppError> {
        request.validate()?;
        self.transition(caller, doctor_id, DoctorTransition::Suspend, Some(request.reason))
            .await
    }

    pub async fn reinstate(&self, caller: &AuthUser, doctor_id: Uuid) -> Result<Doctor, AppError> {
        self.transition(caller, doctor_id, DoctorTransition::Reinstate, None)
            .await
    }

    pub async fn update(
        &self,
        caller: &AuthUser,
        doctor_id: Uuid,
        request: UpdateDoctorRequest,
    ) -> Result<Doctor, AppError> {
        request.validate()?;
        let doctor = self.load(doctor_id).await?;

        if !caller.is_admin() && doctor.user_id != caller.id() {
            return Err(AppError::Forbidden(
                "You can only update your own doctor profile".to_string(),
            ));
        }

        if let Some(license) = &request.license_number {
            self.ensure_license_free(license, Some(doctor_id)).await?;
        }
        if let Some(specialization_id) = request.specialization_id {
            self.ensure_specialization(specialization_id).await?;
        }

        let changes = DoctorChanges {
            bio: request.bio,
            rating: request.rating.filter(|_| caller.is_admin()),
            experience_years: request.experience_years,
            license_number: request.license_number,
            specialization_id: request.specialization_id,
        };

        self.doctors.update(doctor_id, changes).await
    }

    /// Admins may delete any profile; doctors may only withdraw a pending application.
    pub async fn delete(&self, caller: &AuthUser, doctor_id: Uuid) -> Result<(), AppError> {
        let doctor = self.load(doctor_id).await?;

        if !caller.is_admin() {
            if doctor.user_id != caller.id() {
                return Err(AppError::Forbidden(
                    "You can only delete your own doctor profile".to_string(),
                ));
            }
            if doctor.status != DoctorStatus::Pending {
                return Err(AppError::Forbidden(
                    "Can only withdraw pending applications".to_string(),
                ));
            }
        }

        self.doctors.delete(doctor_id).await?;
        info!("Doctor profile {} deleted by {}", doctor_id, caller.id());
        Ok(())
    }

    pub async fn withdraw_application(&self, caller: &AuthUser) -> Result<(), AppError> {
        let doctor = caller
            .doctor()
            .ok_or_else(|| AppError::NotFound("No doctor application found".to_string()))?;
        self.delete(caller, doctor.id).await
    }

    pub async fn my_profile(&self, caller: &AuthUser) -> Result<DoctorDetails, AppError> {
        let doctor = caller
            .doctor()
            .ok_or_else(|| AppError::NotFound("Doctor profile not found".to_string()))?;
        self.details(doctor.id).await
    }

    pub async fn application_status(&self, caller: &AuthUser) -> Result<ApplicationStatus, AppError> {
        let doctor = self.doctors.get_by_user_id(caller.id()).await?;
        Ok(match doctor {
            Some(d) => ApplicationStatus {
                has_application: true,
                status: Some(d.status),
                rejection_reason: d.rejection_reason,
            },
            None => ApplicationStatus {
                has_application: false,
                status: None,
                rejection_reason: None,
            },
        })
    }

    /// Public lookup; anything but an approved doctor reads as absent.
    pub async fn get_public(&self, doctor_id: Uuid) -> Result<DoctorDetails, AppError> {
        let details = self.details(doctor_id).await?;
        if !details.doctor.status.is_public() {
            return Err(doctor_not_found());
        }
        Ok(details)
    }

    pub async fn list_public(&self, page: Page) -> Result<Vec<DoctorDetails>, AppError> {
        self.doctors.list(Some(DoctorStatus::Approved), page).await
    }

    pub async fn list_admin(
        &self,
        caller: &AuthUser,
        status: Option<DoctorStatus>,
        page: Page,
    ) -> Result<Vec<DoctorDetails>, AppError> {
        caller.require_admin()?;
        self.doctors.list(status, page).await
    }

    pub async fn list_pending(&self, caller: &AuthUser, page: Page) -> Result<Vec<DoctorDetails>, AppError> {
        self.list_admin(caller, Some(DoctorStatus::Pending), page).await
    }

    pub async fn list_by_specialization(&self, specialization_id: Uuid) -> Result<Vec<DoctorDetails>, AppError> {
        self.ensure_specialization(specialization_id).await?;
        self.doctors
            .list_by_specialization(specialization_id, Some(DoctorStatus::Approved))
            .await
    }
}
