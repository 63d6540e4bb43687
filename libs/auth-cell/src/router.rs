use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::{auth_middleware, AuthState};

use crate::handlers::{self, UserState};

pub fn user_routes(state: Arc<UserState>, auth: Arc<AuthState>) -> Router {
    let public_routes = Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/refresh", post(handlers::refresh));

    let protected_routes = Router::new()
        .route("/me", get(handlers::get_me).patch(handlers::update_me))
        .layer(middleware::from_fn_with_state(auth, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

pub fn admin_user_routes(state: Arc<UserState>, auth: Arc<AuthState>) -> Router {
    Router::new()
        .route("/", get(handlers::list_users))
        .route("/patients", get(handlers::list_patients))
        .route(
            "/{user_id}",
            get(handlers::get_user)
                .patch(handlers::update_user)
                .delete(handlers::delete_user),
        )
        .layer(middleware::from_fn_with_state(auth, auth_middleware))
        .with_state(state)
}
