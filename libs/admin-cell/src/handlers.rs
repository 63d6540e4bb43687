use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};

use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::models::AdminStats;
use crate::services::stats::StatsService;

pub struct AdminState {
    pub stats: StatsService,
}

pub async fn get_admin_stats(
    State(state): State<Arc<AdminState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<AdminStats>, AppError> {
    Ok(Json(state.stats.admin_stats(&user).await?))
}
