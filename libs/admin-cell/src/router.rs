use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_utils::extractor::{auth_middleware, AuthState};

use crate::handlers::{self, AdminState};

pub fn admin_stats_routes(state: Arc<AdminState>, auth: Arc<AuthState>) -> Router {
    let protected_routes = Router::new()
        .route("/", get(handlers::get_admin_stats))
        .layer(middleware::from_fn_with_state(auth, auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
