use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::{auth_middleware, AuthState};

use crate::handlers::{self, AppointmentState};

pub fn appointment_routes(state: Arc<AppointmentState>, auth: Arc<AuthState>) -> Router {
    // Every appointment operation requires authentication
    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/me", get(handlers::get_my_appointments))
        .route("/doctor/me", get(handlers::get_my_doctor_appointments))
        .route("/doctor/{doctor_id}", get(handlers::get_doctor_appointments))
        .route(
            "/{appointment_id}",
            get(handlers::get_appointment).patch(handlers::update_appointment),
        )
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .layer(middleware::from_fn_with_state(auth, auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
