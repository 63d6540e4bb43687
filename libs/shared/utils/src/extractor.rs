use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::typed_header::{TypedHeader, TypedHeaderRejection};
use headers::{authorization::Bearer, Authorization};
use tracing::debug;

use shared_database::{DoctorRepository, UserRepository};
use shared_models::auth::{AuthUser, TokenKind};
use shared_models::error::AppError;

use crate::jwt::TokenService;

/// What the auth layer needs to turn a bearer token into an `AuthUser`.
#[derive(Clone)]
pub struct AuthState {
    pub tokens: Arc<TokenService>,
    pub users: Arc<dyn UserRepository>,
    pub doctors: Arc<dyn DoctorRepository>,
}

impl AuthState {
    /// Verifies an access token and loads the caller with its doctor profile.
    pub async fn authenticate(&self, token: &str) -> Result<AuthUser, AppError> {
        let user_id = self.tokens.verify(token, TokenKind::Access)?;

        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::Auth("Invalid token".to_string()))?;

        let doctor = self.doctors.get_by_user_id(user.id).await?;

        debug!(user_id = %user.id, is_admin = user.is_admin, is_doctor = doctor.is_some(), "authenticated");
        Ok(AuthUser { user, doctor })
    }
}

pub async fn auth_middleware(
    State(auth): State<Arc<AuthState>>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(Authorization(bearer)) = bearer.map_err(|rejection| {
        if rejection.is_missing() {
            AppError::Auth("Token is required".to_string())
        } else {
            AppError::Auth("Invalid authorization header format".to_string())
        }
    })?;

    let user = auth.authenticate(bearer.token()).await?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
