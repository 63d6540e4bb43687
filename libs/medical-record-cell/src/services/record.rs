use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use shared_database::{AppointmentRepository, MedicalRecordRepository};
use shared_models::auth::AuthUser;
use shared_models::error::AppError;
use shared_models::medical_record::{MedicalRecord, MedicalRecordChanges, NewMedicalRecord};
use shared_models::Page;

use crate::models::{CreateMedicalRecordRequest, UpdateMedicalRecordRequest};

pub struct MedicalRecordService {
    records: Arc<dyn MedicalRecordRepository>,
    appointments: Arc<dyn AppointmentRepository>,
}

impl MedicalRecordService {
    pub fn new(
        records: Arc<dyn MedicalRecordRepository>,
        appointments: Arc<dyn AppointmentRepository>,
    ) -> Self {
        Self {
            records,
            appointments,
        }
    }

    async fn load(&self, record_id: Uuid) -> Result<MedicalRecord, AppError> {
        self.records
            .get_by_id(record_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Medical record not found".to_string()))
    }

    /// Loads a record the caller authored.
    async fn authored(&self, caller: &AuthUser, record_id: Uuid, action: &str) -> Result<MedicalRecord, AppError> {
        let record = self.load(record_id).await?;
        if !caller.owns_doctor(record.doctor_id) {
            return Err(AppError::Forbidden(format!(
                "Cannot {} another doctor's medical record",
                action
            )));
        }
        Ok(record)
    }

    pub async fn create(
        &self,
        caller: &AuthUser,
        request: CreateMedicalRecordRequest,
    ) -> Result<MedicalRecord, AppError> {
        let doctor = caller
            .doctor()
            .ok_or_else(|| AppError::Forbidden("Only doctors can create medical records".to_string()))?;
        let doctor_id = request.doctor_id.unwrap_or(doctor.id);
        if doctor_id != doctor.id {
            return Err(AppError::Forbidden(
                "Cannot create medical record for another doctor".to_string(),
            ));
        }
        request.validate()?;

        if let Some(appointment_id) = request.appointment_id {
            let appointment = self
                .appointments
                .get_by_id(appointment_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Appointment not found".to_string()))?;
            if appointment.doctor_id != doctor_id || appointment.patient_id != request.patient_id {
                return Err(AppError::ValidationError(
                    "Appointment does not belong to this doctor and patient".to_string(),
                ));
            }
            if self.records.get_by_appointment(appointment_id).await?.is_some() {
                return Err(AppError::Conflict(
                    "Medical record already exists for this appointment".to_string(),
                ));
            }
        }

        let record = self
            .records
            .create(NewMedicalRecord {
                diagnosis: request.diagnosis,
                prescription: request.prescription,
                notes: request.notes,
                patient_id: request.patient_id,
                doctor_id,
                appointment_id: request.appointment_id,
            })
            .await?;

        info!("Medical record {} written by doctor {}", record.id, doctor_id);
        Ok(record)
    }

    pub async fn update(
        &self,
        caller: &AuthUser,
        record_id: Uuid,
        request: UpdateMedicalRecordRequest,
    ) -> Result<MedicalRecord, AppError> {
        self.authored(caller, record_id, "update").await?;
        request.validate()?;
        self.records
            .update(
                record_id,
                MedicalRecordChanges {
                    diagnosis: request.diagnosis,
                    prescription: request.prescription,
                    notes: request.notes,
                },
            )
            .await
    }

    pub async fn delete(&self, caller: &AuthUser, record_id: Uuid) -> Result<(), AppError> {
        if caller.is_admin() {
            self.load(record_id).await?;
        } else {
            self.authored(caller, record_id, "delete").await?;
        }
        self.records.delete(record_id).await?;
        info!("Medical record {} deleted by {}", record_id, caller.id());
        Ok(())
    }

    pub async fn get(&self, caller: &AuthUser, record_id: Uuid) -> Result<MedicalRecord, AppError> {
        let record = self.load(record_id).await?;
        let allowed = caller.is_admin()
            || caller.id() == record.patient_id
            || caller.owns_doctor(record.doctor_id);
        if !allowed {
            return Err(AppError::Forbidden(
                "Access denied to this medical record".to_string(),
            ));
        }
        Ok(record)
    }

    pub async fn list_mine(&self, caller: &AuthUser, page: Page) -> Result<Vec<MedicalRecord>, AppError> {
        self.records.list_by_patient(caller.id(), page).await
    }

    /// Admins and the patient see everything; a doctor sees only what they wrote.
    pub async fn list_for_patient(
        &self,
        caller: &AuthUser,
        patient_id: Uuid,
        page: Page,
    ) -> Result<Vec<MedicalRecord>, AppError> {
        if caller.is_admin() || caller.id() == patient_id {
            return self.records.list_by_patient(patient_id, page).await;
        }

        let doctor = caller
            .doctor()
            .ok_or_else(|| AppError::Forbidden("Access denied".to_string()))?;
        debug!("Doctor {} reading records of patient {}", doctor.id, patient_id);

        let records = self.records.list_by_patient(patient_id, page).await?;
        Ok(records
            .into_iter()
            .filter(|r| r.doctor_id == doctor.id)
            .collect())
    }

    pub async fn list_for_doctor(
        &self,
        caller: &AuthUser,
        doctor_id: Uuid,
        page: Page,
    ) -> Result<Vec<MedicalRecord>, AppError> {
        if !caller.is_admin() && !caller.owns_doctor(doctor_id) {
            return Err(AppError::Forbidden(
                "Access denied to these medical records".to_string(),
            ));
        }
        self.records.list_by_doctor(doctor_id, page).await
    }
}
