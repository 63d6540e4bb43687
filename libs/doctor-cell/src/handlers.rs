use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared_database::Repositories;
use shared_models::auth::AuthUser;
use shared_models::doctor::{Doctor, DoctorDetails, Specialization, SpecializationWithCount};
use shared_models::error::AppError;
use shared_models::schedule::{Schedule, TimeSlot};

use crate::models::{
    AdminCreateDoctorRequest, ApplicationStatus, CreateScheduleRequest,
    CreateSpecializationRequest, DoctorListQuery, RegisterDoctorRequest, SlotsQuery,
    StatusReasonRequest, UpdateDoctorRequest, UpdateScheduleRequest, UpdateSpecializationRequest,
};
use crate::services::{AvailabilityService, DoctorService, ScheduleService, SpecializationService};

pub struct DoctorState {
    pub doctors: DoctorService,
    pub specializations: SpecializationService,
    pub schedules: ScheduleService,
    pub availability: AvailabilityService,
}

impl DoctorState {
    pub fn new(repos: &Repositories) -> Self {
        Self {
            doctors: DoctorService::new(
                repos.doctors.clone(),
                repos.users.clone(),
                repos.specializations.clone(),
            ),
            specializations: SpecializationService::new(repos.specializations.clone()),
            schedules: ScheduleService::new(repos.schedules.clone()),
            availability: AvailabilityService::new(
                repos.schedules.clone(),
                repos.appointments.clone(),
            ),
        }
    }
}

// ==============================================================================
// DOCTORS
// ==============================================================================

pub async fn register_as_doctor(
    State(state): State<Arc<DoctorState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<RegisterDoctorRequest>,
) -> Result<(StatusCode, Json<Doctor>), AppError> {
    let doctor = state.doctors.register_as_doctor(&user, request).await?;
    Ok((StatusCode::CREATED, Json(doctor)))
}

pub async fn get_my_profile(
    State(state): State<Arc<DoctorState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DoctorDetails>, AppError> {
    Ok(Json(state.doctors.my_profile(&user).await?))
}

pub async fn get_my_application_status(
    State(state): State<Arc<DoctorState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApplicationStatus>, AppError> {
    Ok(Json(state.doctors.application_status(&user).await?))
}

pub async fn withdraw_application(
    State(state): State<Arc<DoctorState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<StatusCode, AppError> {
    state.doctors.withdraw_application(&user).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_doctor(
    State(state): State<Arc<DoctorState>>,
    Extension(user): Extension<AuthUser>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Doctor>, AppError> {
    Ok(Json(state.doctors.update(&user, doctor_id, request).await?))
}

pub async fn admin_create_doctor(
    State(state): State<Arc<DoctorState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<AdminCreateDoctorRequest>,
) -> Result<(StatusCode, Json<Doctor>), AppError> {
    let doctor = state.doctors.admin_create(&user, request).await?;
    Ok((StatusCode::CREATED, Json(doctor)))
}

pub async fn list_pending(
    State(state): State<Arc<DoctorState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<DoctorListQuery>,
) -> Result<Json<Vec<DoctorDetails>>, AppError> {
    Ok(Json(state.doctors.list_pending(&user, query.page()).await?))
}

pub async fn list_all(
    State(state): State<Arc<DoctorState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<DoctorListQuery>,
) -> Result<Json<Vec<DoctorDetails>>, AppError> {
    Ok(Json(
        state
            .doctors
            .list_admin(&user, query.status, query.page())
            .await?,
    ))
}

pub async fn approve_doctor(
    State(state): State<Arc<DoctorState>>,
    Extension(user): Extension<AuthUser>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Doctor>, AppError> {
    Ok(Json(state.doctors.approve(&user, doctor_id).await?))
}

pub async fn reject_doctor(
    State(state): State<Arc<DoctorState>>,
    Extension(user): Extension<AuthUser>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<StatusReasonRequest>,
) -> Result<Json<Doctor>, AppError> {
    Ok(Json(state.doctors.reject(&user, doctor_id, request).await?))
}

pub async fn suspend_doctor(
    State(state): State<Arc<DoctorState>>,
    Extension(user): Extension<AuthUser>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<StatusReasonRequest>,
) -> Result<Json<Doctor>, AppError> {
    Ok(Json(state.doctors.suspend(&user, doctor_id, request).await?))
}

pub async fn reinstate_doctor(
    State(state): State<Arc<DoctorState>>,
    Extension(user): Extension<AuthUser>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Doctor>, AppError> {
    Ok(Json(state.doctors.reinstate(&user, doctor_id).await?))
}

pub async fn delete_doctor(
    State(state): State<Arc<DoctorState>>,
    Extension(user): Extension<AuthUser>,
    Path(doctor_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.doctors.delete(&user, doctor_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_doctors(
    State(state): State<Arc<DoctorState>>,
    Query(query): Query<DoctorListQuery>,
) -> Result<Json<Vec<DoctorDetails>>, AppError> {
    Ok(Json(state.doctors.list_public(query.page()).await?))
}

pub async fn list_by_specialization(
    State(state): State<Arc<DoctorState>>,
    Path(specialization_id): Path<Uuid>,
) -> Result<Json<Vec<DoctorDetails>>, AppError> {
    Ok(Json(
        state
            .doctors
            .list_by_specialization(specialization_id)
            .await?,
    ))
}

pub async fn get_doctor(
    State(state): State<Arc<DoctorState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<DoctorDetails>, AppError> {
    Ok(Json(state.doctors.get_public(doctor_id).await?))
}

// ==============================================================================
// SPECIALIZATIONS
// ==============================================================================

pub async fn create_specialization(
    State(state): State<Arc<DoctorState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateSpecializationRequest>,
) -> Result<(StatusCode, Json<Specialization>), AppError> {
    let specialization = state.specializations.create(&user, request).await?;
    Ok((StatusCode::CREATED, Json(specialization)))
}

pub async fn update_specialization(
    State(state): State<Arc<DoctorState>>,
    Extension(user): Extension<AuthUser>,
    Path(specialization_id): Path<Uuid>,
    Json(request): Json<UpdateSpecializationRequest>,
) -> Result<Json<Specialization>, AppError> {
    Ok(Json(
        state
            .specializations
            .update(&user, specialization_id, request)
            .await?,
    ))
}

pub async fn delete_specialization(
    State(state): State<Arc<DoctorState>>,
    Extension(user): Extension<AuthUser>,
    Path(specialization_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .specializations
        .delete(&user, specialization_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_specializations(
    State(state): State<Arc<DoctorState>>,
) -> Result<Json<Vec<SpecializationWithCount>>, AppError> {
    Ok(Json(state.specializations.list().await?))
}

pub async fn get_specialization(
    State(state): State<Arc<DoctorState>>,
    Path(specialization_id): Path<Uuid>,
) -> Result<Json<Specialization>, AppError> {
    Ok(Json(state.specializations.get(specialization_id).await?))
}

// ==============================================================================
// SCHEDULES
// ==============================================================================

pub async fn create_schedule(
    State(state): State<Arc<DoctorState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateScheduleRequest>,
) -> Result<(StatusCode, Json<Schedule>), AppError> {
    let schedule = state.schedules.create(&user, request).await?;
    Ok((StatusCode::CREATED, Json(schedule)))
}

pub async fn list_my_schedules(
    State(state): State<Arc<DoctorState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Schedule>>, AppError> {
    Ok(Json(state.schedules.list_mine(&user).await?))
}

pub async fn update_schedule(
    State(state): State<Arc<DoctorState>>,
    Extension(user): Extension<AuthUser>,
    Path(schedule_id): Path<Uuid>,
    Json(request): Json<UpdateScheduleRequest>,
) -> Result<Json<Schedule>, AppError> {
    Ok(Json(
        state.schedules.update(&user, schedule_id, request).await?,
    ))
}

pub async fn delete_schedule(
    State(state): State<Arc<DoctorState>>,
    Extension(user): Extension<AuthUser>,
    Path(schedule_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.schedules.delete(&user, schedule_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_schedule(
    State(state): State<Arc<DoctorState>>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<Schedule>, AppError> {
    Ok(Json(state.schedules.get(schedule_id).await?))
}

pub async fn list_doctor_schedules(
    State(state): State<Arc<DoctorState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Vec<Schedule>>, AppError> {
    Ok(Json(state.schedules.list_by_doctor(doctor_id).await?))
}

pub async fn get_available_slots(
    State(state): State<Arc<DoctorState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<Vec<TimeSlot>>, AppError> {
    Ok(Json(
        state
            .availability
            .compute_available_slots(doctor_id, query.date)
            .await?,
    ))
}
