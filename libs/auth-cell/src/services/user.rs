use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::UserRepository;
use shared_models::auth::{AuthUser, TokenKind, TokenPair};
use shared_models::error::AppError;
use shared_models::user::{NewUser, User, UserChanges};
use shared_models::Page;
use shared_utils::jwt::TokenService;

use crate::models::{AdminUpdateUserRequest, LoginRequest, RegisterRequest, UpdateProfileRequest};
use crate::services::password::PasswordService;

pub struct UserService {
    users: Arc<dyn UserRepository>,
    tokens: Arc<TokenService>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>, tokens: Arc<TokenService>) -> Self {
        Self { users, tokens }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<User, AppError> {
        request.validate()?;
        debug!("Registering user {}", request.email);

        if self.users.get_by_email(&request.email).await?.is_some() {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let password_hash = PasswordService::hash_blocking(request.password).await?;

        let user = self
            .users
            .create(NewUser {
                email: request.email,
                password_hash,
                full_name: request.full_name.trim().to_string(),
                phone: request.phone,
                is_admin: false,
            })
            .await?;

        info!("User {} registered", user.id);
        Ok(user)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<TokenPair, AppError> {
        let user = self
            .users
            .get_by_email(&request.email)
            .await?
            .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))?;

        let valid = PasswordService::verify_blocking(request.password, user.password_hash.clone()).await?;
        if !valid {
            warn!("Failed login for user {}", user.id);
            return Err(AppError::ValidationError("Invalid credentials".to_string()));
        }

        self.tokens.issue_pair(user.id)
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        let user_id = self.tokens.verify(refresh_token, TokenKind::Refresh)?;

        if self.users.get_by_id(user_id).await?.is_none() {
            return Err(AppError::Auth("User not found".to_string()));
        }

        self.tokens.issue_pair(user_id)
    }

    async fn changes_from(&self, user_id: Uuid, request: UpdateProfileRequest) -> Result<UserChanges, AppError> {
        request.validate()?;

        if let Some(email) = &request.email {
            if let Some(existing) = self.users.get_by_email(email).await? {
                if existing.id != user_id {
                    return Err(AppError::Conflict("Email already registered".to_string()));
                }
            }
        }

        let password_hash = match request.password {
            Some(password) => Some(PasswordService::hash_blocking(password).await?),
            None => None,
        };

        Ok(UserChanges {
            email: request.email,
            password_hash,
            full_name: request.full_name,
            phone: request.phone,
            is_admin: None,
        })
    }

    pub async fn update_profile(&self, caller: &AuthUser, request: UpdateProfileRequest) -> Result<User, AppError> {
        let changes = self.changes_from(caller.id(), request).await?;
        if changes.is_empty() {
            return Ok(caller.user.clone());
        }
        self.users.update(caller.id(), changes).await
    }

    pub async fn list_users(&self, caller: &AuthUser, page: Page) -> Result<Vec<User>, AppError> {
        caller.require_admin()?;
        self.users.list(page).await
    }

    pub async fn list_patients(&self, caller: &AuthUser, page: Page) -> Result<Vec<User>, AppError> {
        caller.require_admin()?;
        self.users.list_patients(page).await
    }

    pub async fn get_user(&self, caller: &AuthUser, user_id: Uuid) -> Result<User, AppError> {
        caller.require_admin()?;
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn admin_update(
        &self,
        caller: &AuthUser,
        user_id: Uuid,
        request: AdminUpdateUserRequest,
    ) -> Result<User, AppError> {
        caller.require_admin()?;
        let current = self.get_user(caller, user_id).await?;

        let mut changes = self.changes_from(user_id, request.profile).await?;
        changes.is_admin = request.is_admin;
        if changes.is_empty() {
            return Ok(current);
        }

        let user = self.users.update(user_id, changes).await?;
        info!("User {} updated by admin {}", user_id, caller.id());
        Ok(user)
    }

    pub async fn delete_user(&self, caller: &AuthUser, user_id: Uuid) -> Result<(), AppError> {
        caller.require_admin()?;
        if !self.users.delete(user_id).await? {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        info!("User {} deleted by admin {}", user_id, caller.id());
        Ok(())
    }
}
