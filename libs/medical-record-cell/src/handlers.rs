use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared_models::auth::AuthUser;
use shared_models::error::AppError;
use shared_models::medical_record::MedicalRecord;

use crate::models::{CreateMedicalRecordRequest, RecordListQuery, UpdateMedicalRecordRequest};
use crate::services::record::MedicalRecordService;

pub struct MedicalRecordState {
    pub records: MedicalRecordService,
}

pub async fn create_record(
    State(state): State<Arc<MedicalRecordState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateMedicalRecordRequest>,
) -> Result<(StatusCode, Json<MedicalRecord>), AppError> {
    let record = state.records.create(&user, request).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_my_records(
    State(state): State<Arc<MedicalRecordState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<RecordListQuery>,
) -> Result<Json<Vec<MedicalRecord>>, AppError> {
    Ok(Json(state.records.list_mine(&user, query.into()).await?))
}

pub async fn get_patient_records(
    State(state): State<Arc<MedicalRecordState>>,
    Extension(user): Extension<AuthUser>,
    Path(patient_id): Path<Uuid>,
    Query(query): Query<RecordListQuery>,
) -> Result<Json<Vec<MedicalRecord>>, AppError> {
    Ok(Json(
        state
            .records
            .list_for_patient(&user, patient_id, query.into())
            .await?,
    ))
}

pub async fn get_doctor_records(
    State(state): State<Arc<MedicalRecordState>>,
    Extension(user): Extension<AuthUser>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<RecordListQuery>,
) -> Result<Json<Vec<MedicalRecord>>, AppError> {
    Ok(Json(
        state
            .records
            .list_for_doctor(&user, doctor_id, query.into())
            .await?,
    ))
}

pub async fn get_record(
    State(state): State<Arc<MedicalRecordState>>,
    Extension(user): Extension<AuthUser>,
    Path(record_id): Path<Uuid>,
) -> Result<Json<MedicalRecord>, AppError> {
    Ok(Json(state.records.get(&user, record_id).await?))
}

pub async fn update_record(
    State(state): State<Arc<MedicalRecordState>>,
    Extension(user): Extension<AuthUser>,
    Path(record_id): Path<Uuid>,
    Json(request): Json<UpdateMedicalRecordRequest>,
) -> Result<Json<MedicalRecord>, AppError> {
    Ok(Json(state.records.update(&user, record_id, request).await?))
}

pub async fn delete_record(
    State(state): State<Arc<MedicalRecordState>>,
    Extension(user): Extension<AuthUser>,
    Path(record_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.records.delete(&user, record_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
