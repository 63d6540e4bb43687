use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::{AuthUser, TokenPair};
use shared_models::error::AppError;
use shared_models::user::User;

use crate::models::{
    AdminUpdateUserRequest, ListQuery, LoginRequest, RefreshRequest, RegisterRequest,
    UpdateProfileRequest,
};
use crate::services::user::UserService;

pub struct UserState {
    pub service: UserService,
}

pub async fn register(
    State(state): State<Arc<UserState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = state.service.register(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<Arc<UserState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenPair>, AppError> {
    debug!("Login attempt for {}", request.email);
    Ok(Json(state.service.login(request).await?))
}

pub async fn refresh(
    State(state): State<Arc<UserState>>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, AppError> {
    Ok(Json(state.service.refresh(&request.refresh_token).await?))
}

pub async fn get_me(Extension(user): Extension<AuthUser>) -> Json<User> {
    Json(user.user)
}

pub async fn update_me(
    State(state): State<Arc<UserState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.service.update_profile(&user, request).await?))
}

pub async fn list_users(
    State(state): State<Arc<UserState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.service.list_users(&user, query.into()).await?))
}

pub async fn list_patients(
    State(state): State<Arc<UserState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.service.list_patients(&user, query.into()).await?))
}

pub async fn get_user(
    State(state): State<Arc<UserState>>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.service.get_user(&user, user_id).await?))
}

pub async fn update_user(
    State(state): State<Arc<UserState>>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<AdminUpdateUserRequest>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.service.admin_update(&user, user_id, request).await?))
}

pub async fn delete_user(
    State(state): State<Arc<UserState>>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.service.delete_user(&user, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
