use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared_models::appointment::Appointment;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::models::{AppointmentListQuery, CreateAppointmentRequest, UpdateAppointmentRequest};
use crate::services::booking::AppointmentBookingService;

pub struct AppointmentState {
    pub booking: AppointmentBookingService,
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let appointment = state.booking.book_appointment(&user, request).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<AuthUser>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(
        state
            .booking
            .update_appointment(&user, appointment_id, request)
            .await?,
    ))
}

pub async fn cancel_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<AuthUser>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(
        state
            .booking
            .cancel_appointment(&user, appointment_id)
            .await?,
    ))
}

// ==============================================================================
// LISTINGS
// ==============================================================================

pub async fn get_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<AuthUser>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(
        state.booking.get_appointment(&user, appointment_id).await?,
    ))
}

pub async fn get_my_appointments(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    Ok(Json(state.booking.my_appointments(&user, query).await?))
}

pub async fn get_my_doctor_appointments(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    Ok(Json(
        state.booking.my_doctor_appointments(&user, query).await?,
    ))
}

pub async fn get_doctor_appointments(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<AuthUser>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    Ok(Json(
        state
            .booking
            .doctor_appointments(&user, doctor_id, query)
            .await?,
    ))
}
