use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Extension, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use shared_models::auth::AuthUser;
use shared_models::consultation::{AiConsultation, ChatMessage};
use shared_models::error::AppError;

use crate::models::{
    ConsultationAnalysis, ConsultationListQuery, ConsultationWithMessages, SendMessageRequest,
    StartConsultationRequest,
};
use crate::services::consultation::ConsultationService;

pub struct ConsultationState {
    pub consultations: ConsultationService,
}

pub async fn start_consultation(
    State(state): State<Arc<ConsultationState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<StartConsultationRequest>,
) -> Result<(StatusCode, Json<AiConsultation>), AppError> {
    let consultation = state.consultations.start(&user, request).await?;
    Ok((StatusCode::CREATED, Json(consultation)))
}

pub async fn get_my_consultations(
    State(state): State<Arc<ConsultationState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ConsultationListQuery>,
) -> Result<Json<Vec<AiConsultation>>, AppError> {
    Ok(Json(state.consultations.list_mine(&user, query.into()).await?))
}

pub async fn get_consultation(
    State(state): State<Arc<ConsultationState>>,
    Extension(user): Extension<AuthUser>,
    Path(consultation_id): Path<Uuid>,
) -> Result<Json<ConsultationWithMessages>, AppError> {
    Ok(Json(
        state
            .consultations
            .with_messages(&user, consultation_id)
            .await?,
    ))
}

pub async fn get_messages(
    State(state): State<Arc<ConsultationState>>,
    Extension(user): Extension<AuthUser>,
    Path(consultation_id): Path<Uuid>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    Ok(Json(state.consultations.messages(&user, consultation_id).await?))
}

pub async fn send_message(
    State(state): State<Arc<ConsultationState>>,
    Extension(user): Extension<AuthUser>,
    Path(consultation_id): Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<ChatMessage>, AppError> {
    Ok(Json(
        state
            .consultations
            .send_message(&user, consultation_id, request)
            .await?,
    ))
}

/// Answers with the assistant's reply as a chunked `text/plain` body, one
/// chunk per model fragment.
pub async fn send_message_stream(
    State(state): State<Arc<ConsultationState>>,
    Extension(user): Extension<AuthUser>,
    Path(consultation_id): Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Response, AppError> {
    let turn = state
        .consultations
        .send_message_stream(&user, consultation_id, request)
        .await?;

    let headers = [
        (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
        (header::CACHE_CONTROL, "no-cache"),
    ];
    Ok((headers, Body::from_stream(turn.into_fragments())).into_response())
}

pub async fn complete_consultation(
    State(state): State<Arc<ConsultationState>>,
    Extension(user): Extension<AuthUser>,
    Path(consultation_id): Path<Uuid>,
) -> Result<Json<ConsultationAnalysis>, AppError> {
    Ok(Json(state.consultations.complete(&user, consultation_id).await?))
}
