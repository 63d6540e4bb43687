use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use doctor_cell::AvailabilityService;
use shared_database::{AppointmentRepository, ConsultationRepository, DoctorRepository, Repositories};
use shared_models::appointment::{
    Appointment, AppointmentChanges, AppointmentStatus, NewAppointment,
};
use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::models::{
    AppointmentError, AppointmentListQuery, CreateAppointmentRequest, UpdateAppointmentRequest,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::{
    check_cancellable, check_not_finished, check_status_change, Participant,
};

pub struct AppointmentBookingService {
    appointments: Arc<dyn AppointmentRepository>,
    doctors: Arc<dyn DoctorRepository>,
    consultations: Arc<dyn ConsultationRepository>,
    availability: AvailabilityService,
    conflicts: ConflictDetectionService,
}

impl AppointmentBookingService {
    pub fn new(repos: &Repositories) -> Self {
        Self {
            appointments: repos.appointments.clone(),
            doctors: repos.doctors.clone(),
            consultations: repos.consultations.clone(),
            availability: AvailabilityService::new(
                repos.schedules.clone(),
                repos.appointments.clone(),
            ),
            conflicts: ConflictDetectionService::new(repos.appointments.clone()),
        }
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, AppError> {
        self.appointments
            .get_by_id(appointment_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound.into())
    }

    fn ensure_future(date_time: DateTime<Utc>) -> Result<(), AppError> {
        if date_time <= Utc::now() {
            return Err(AppointmentError::PastTime.into());
        }
        Ok(())
    }

    /// Future-time, schedule window and overlap checks shared by booking and
    /// rescheduling. Returns the slot length the appointment will occupy.
    async fn check_bookable(
        &self,
        doctor_id: Uuid,
        date_time: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<i32, AppError> {
        Self::ensure_future(date_time)?;
        let schedule = self
            .availability
            .resolve_booking_window(doctor_id, date_time)
            .await?;
        self.conflicts
            .ensure_free(doctor_id, date_time, schedule.slot_duration_minutes, exclude)
            .await?;
        Ok(schedule.slot_duration_minutes)
    }

    pub async fn book_appointment(
        &self,
        caller: &AuthUser,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, AppError> {
        request.validate()?;
        let patient_id = request.patient_id.unwrap_or(caller.id());
        if patient_id != caller.id() {
            return Err(AppointmentError::NotThePatient.into());
        }

        debug!(
            "Booking appointment for patient {} with doctor {} at {}",
            patient_id, request.doctor_id, request.date_time
        );

        Self::ensure_future(request.date_time)?;

        let doctor = self
            .doctors
            .get_by_id(request.doctor_id)
            .await?
            .filter(|d| d.status.is_public())
            .ok_or(AppointmentError::DoctorNotFound)?;

        if let Some(consultation_id) = request.ai_consultation_id {
            let owned = self
                .consultations
                .get_by_id(consultation_id)
                .await?
                .is_some_and(|c| c.patient_id == patient_id);
            if !owned {
                return Err(AppointmentError::ConsultationNotFound.into());
            }
        }

        let duration_minutes = self
            .check_bookable(doctor.id, request.date_time, None)
            .await?;

        let appointment = self
            .appointments
            .create(NewAppointment {
                date_time: request.date_time,
                duration_minutes,
                status: AppointmentStatus::Scheduled,
                notes: request.notes,
                patient_id,
                doctor_id: doctor.id,
                ai_consultation_id: request.ai_consultation_id,
            })
            .await?;

        info!(
            "Appointment {} booked with doctor {} at {}",
            appointment.id, appointment.doctor_id, appointment.date_time
        );
        Ok(appointment)
    }

    pub async fn update_appointment(
        &self,
        caller: &AuthUser,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
    ) -> Result<Appointment, AppError> {
        request.validate()?;
        let current = self.load(appointment_id).await?;
        let participant = Participant::resolve(caller, &current)?;

        if let Some(status) = request.status {
            check_status_change(participant, status)?;
        }
        let new_time = request.date_time.filter(|t| *t != current.date_time);
        check_not_finished(current.status, request.status, new_time.is_some())?;

        let mut changes = AppointmentChanges {
            status: request.status,
            notes: request.notes,
            ..Default::default()
        };

        if let Some(date_time) = new_time {
            let duration_minutes = self
                .check_bookable(current.doctor_id, date_time, Some(appointment_id))
                .await?;
            changes.date_time = Some(date_time);
            changes.duration_minutes = Some(duration_minutes);
            info!("Appointment {} rescheduled to {}", appointment_id, date_time);
        }

        let updated = self.appointments.update(appointment_id, changes).await?;
        if updated.status != current.status {
            info!(
                "Appointment {} moved {} -> {}",
                appointment_id, current.status, updated.status
            );
        }
        Ok(updated)
    }

    pub async fn cancel_appointment(
        &self,
        caller: &AuthUser,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppError> {
        let current = self.load(appointment_id).await?;
        let is_party = current.patient_id == caller.id() || caller.owns_doctor(current.doctor_id);
        if !is_party {
            return Err(AppointmentError::NotParticipant.into());
        }
        check_cancellable(current.status)?;

        let cancelled = self
            .appointments
            .update(
                appointment_id,
                AppointmentChanges {
                    status: Some(AppointmentStatus::Cancelled),
                    ..Default::default()
                },
            )
            .await?;

        info!("Appointment {} cancelled by {}", appointment_id, caller.id());
        Ok(cancelled)
    }

    pub async fn get_appointment(
        &self,
        caller: &AuthUser,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppError> {
        let appointment = self.load(appointment_id).await?;
        Participant::resolve(caller, &appointment)?;
        Ok(appointment)
    }

    pub async fn my_appointments(
        &self,
        caller: &AuthUser,
        query: AppointmentListQuery,
    ) -> Result<Vec<Appointment>, AppError> {
        self.appointments
            .list_by_patient(caller.id(), query.filter(), query.page())
            .await
    }

    pub async fn my_doctor_appointments(
        &self,
        caller: &AuthUser,
        query: AppointmentListQuery,
    ) -> Result<Vec<Appointment>, AppError> {
        let doctor = caller.require_doctor()?;
        self.appointments
            .list_by_doctor(doctor.id, query.filter(), query.page())
            .await
    }

    pub async fn doctor_appointments(
        &self,
        caller: &AuthUser,
        doctor_id: Uuid,
        query: AppointmentListQuery,
    ) -> Result<Vec<Appointment>, AppError> {
        if !caller.is_admin() && !caller.owns_doctor(doctor_id) {
            return Err(AppointmentError::NotParticipant.into());
        }
        self.appointments
            .list_by_doctor(doctor_id, query.filter(), query.page())
            .await
    }
}
