use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::ScheduleRepository;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;
use shared_models::schedule::{day_name, NewSchedule, Schedule, ScheduleChanges};

use crate::models::{validate_schedule_window, CreateScheduleRequest, UpdateScheduleRequest};

pub struct ScheduleService {
    schedules: Arc<dyn ScheduleRepository>,
}

impl ScheduleService {
    pub fn new(schedules: Arc<dyn ScheduleRepository>) -> Self {
        Self { schedules }
    }

    async fn ensure_day_free(
        &self,
        doctor_id: Uuid,
        day_of_week: i16,
        except: Option<Uuid>,
    ) -> Result<(), AppError> {
        match self.schedules.get_for_day(doctor_id, day_of_week).await? {
            Some(existing) if Some(existing.id) != except => {
                warn!(
                    "Doctor {} already has a schedule on {}",
                    doctor_id,
                    day_name(day_of_week)
                );
                Err(AppError::Conflict(
                    "Schedule already exists for this day".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Loads a schedule and checks the caller owns the doctor profile it belongs to.
    async fn owned(&self, caller: &AuthUser, schedule_id: Uuid) -> Result<Schedule, AppError> {
        caller.require_doctor()?;
        let schedule = self.get(schedule_id).await?;
        if !caller.owns_doctor(schedule.doctor_id) {
            return Err(AppError::Forbidden(
                "You can only manage your own schedules".to_string(),
            ));
        }
        Ok(schedule)
    }

    pub async fn create(
        &self,
        caller: &AuthUser,
        request: CreateScheduleRequest,
    ) -> Result<Schedule, AppError> {
        let doctor = caller.require_approved_doctor()?;
        let doctor_id = request.doctor_id.unwrap_or(doctor.id);
        if doctor_id != doctor.id {
            return Err(AppError::Forbidden(
                "You can only create schedules for yourself".to_string(),
            ));
        }

        validate_schedule_window(
            request.day_of_week,
            request.start_time,
            request.end_time,
            request.slot_duration_minutes,
        )?;
        self.ensure_day_free(doctor_id, request.day_of_week, None)
            .await?;

        let schedule = self
            .schedules
            .create(NewSchedule {
                doctor_id,
                day_of_week: request.day_of_week,
                start_time: request.start_time,
                end_time: request.end_time,
                slot_duration_minutes: request.slot_duration_minutes,
                is_active: request.is_active,
            })
            .await?;

        info!(
            "Schedule {} created for doctor {} on {}",
            schedule.id,
            doctor_id,
            day_name(schedule.day_of_week)
        );
        Ok(schedule)
    }

    pub async fn update(
        &self,
        caller: &AuthUser,
        schedule_id: Uuid,
        request: UpdateScheduleRequest,
    ) -> Result<Schedule, AppError> {
        let current = self.owned(caller, schedule_id).await?;

        validate_schedule_window(
            request.day_of_week.unwrap_or(current.day_of_week),
            request.start_time.unwrap_or(current.start_time),
            request.end_time.unwrap_or(current.end_time),
            request
                .slot_duration_minutes
                .unwrap_or(current.slot_duration_minutes),
        )?;

        if let Some(day) = request.day_of_week.filter(|d| *d != current.day_of_week) {
            self.ensure_day_free(current.doctor_id, day, Some(schedule_id))
                .await?;
        }

        debug!("Updating schedule {}", schedule_id);
        self.schedules
            .update(
                schedule_id,
                ScheduleChanges {
                    day_of_week: request.day_of_week,
                    start_time: request.start_time,
                    end_time: request.end_time,
                    slot_duration_minutes: request.slot_duration_minutes,
                    is_active: request.is_active,
                },
            )
            .await
    }

    pub async fn delete(&self, caller: &AuthUser, schedule_id: Uuid) -> Result<(), AppError> {
        self.owned(caller, schedule_id).await?;
        self.schedules.delete(schedule_id).await?;
        info!("Schedule {} deleted", schedule_id);
        Ok(())
    }

    pub async fn get(&self, schedule_id: Uuid) -> Result<Schedule, AppError> {
        self.schedules
            .get_by_id(schedule_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Schedule not found".to_string()))
    }

    pub async fn list_by_doctor(&self, doctor_id: Uuid) -> Result<Vec<Schedule>, AppError> {
        self.schedules.list_by_doctor(doctor_id).await
    }

    pub async fn list_mine(&self, caller: &AuthUser) -> Result<Vec<Schedule>, AppError> {
        let doctor = caller.require_doctor()?;
        self.schedules.list_by_doctor(doctor.id).await
    }
}
