use serde::{Deserialize, Serialize};

use shared_models::error::AppError;
use shared_models::Page;
use shared_utils::validation::{validate_email, validate_length, validate_optional_length};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_email(&self.email)?;
        validate_length("password", &self.password, 8, 128)?;
        validate_length("full_name", self.full_name.trim(), 1, 100)?;
        validate_optional_length("phone", self.phone.as_deref(), 10, 20)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

impl UpdateProfileRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        validate_optional_length("password", self.password.as_deref(), 8, 128)?;
        validate_optional_length("full_name", self.full_name.as_deref(), 1, 100)?;
        validate_optional_length("phone", self.phone.as_deref(), 10, 20)
    }
}

/// Admin edit of any account, including the admin flag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminUpdateUserRequest {
    #[serde(flatten)]
    pub profile: UpdateProfileRequest,
    pub is_admin: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    shared_models::DEFAULT_PAGE_LIMIT
}

impl From<ListQuery> for Page {
    fn from(query: ListQuery) -> Self {
        Page::new(query.skip, query.limit)
    }
}
