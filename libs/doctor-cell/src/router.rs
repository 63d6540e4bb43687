use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};

use shared_utils::extractor::{auth_middleware, AuthState};

use crate::handlers::{self, DoctorState};

pub fn doctor_routes(state: Arc<DoctorState>, auth: Arc<AuthState>) -> Router {
    let public_routes = Router::new()
        .route("/", get(handlers::list_doctors))
        .route(
            "/specialization/{specialization_id}",
            get(handlers::list_by_specialization),
        )
        .route("/{doctor_id}", get(handlers::get_doctor));

    let protected_routes = Router::new()
        .route("/register", post(handlers::register_as_doctor))
        .route(
            "/me",
            get(handlers::get_my_profile).delete(handlers::withdraw_application),
        )
        .route("/me/status", get(handlers::get_my_application_status))
        .route("/{doctor_id}", patch(handlers::update_doctor))
        .route("/admin/create", post(handlers::admin_create_doctor))
        .route("/admin/pending", get(handlers::list_pending))
        .route("/admin/all", get(handlers::list_all))
        .route("/admin/{doctor_id}/approve", post(handlers::approve_doctor))
        .route("/admin/{doctor_id}/reject", post(handlers::reject_doctor))
        .route("/admin/{doctor_id}/suspend", post(handlers::suspend_doctor))
        .route("/admin/{doctor_id}/reinstate", post(handlers::reinstate_doctor))
        .route("/admin/{doctor_id}", delete(handlers::delete_doctor))
        .layer(middleware::from_fn_with_state(auth, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

pub fn specialization_routes(state: Arc<DoctorState>, auth: Arc<AuthState>) -> Router {
    let public_routes = Router::new()
        .route("/", get(handlers::list_specializations))
        .route("/{specialization_id}", get(handlers::get_specialization));

    let protected_routes = Router::new()
        .route("/", post(handlers::create_specialization))
        .route(
            "/{specialization_id}",
            patch(handlers::update_specialization).delete(handlers::delete_specialization),
        )
        .layer(middleware::from_fn_with_state(auth, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

pub fn schedule_routes(state: Arc<DoctorState>, auth: Arc<AuthState>) -> Router {
    let public_routes = Router::new()
        .route("/{schedule_id}", get(handlers::get_schedule))
        .route("/doctor/{doctor_id}", get(handlers::list_doctor_schedules))
        .route("/doctor/{doctor_id}/slots", get(handlers::get_available_slots));

    let protected_routes = Router::new()
        .route("/", post(handlers::create_schedule))
        .route("/me", get(handlers::list_my_schedules))
        .route(
            "/{schedule_id}",
            patch(handlers::update_schedule).delete(handlers::delete_schedule),
        )
        .layer(middleware::from_fn_with_state(auth, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
