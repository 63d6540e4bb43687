use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::{auth_middleware, AuthState};

use crate::handlers::{self, MedicalRecordState};

pub fn medical_record_routes(state: Arc<MedicalRecordState>, auth: Arc<AuthState>) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::create_record))
        .route("/me", get(handlers::get_my_records))
        .route("/patient/{patient_id}", get(handlers::get_patient_records))
        .route("/doctor/{doctor_id}", get(handlers::get_doctor_records))
        .route(
            "/{record_id}",
            get(handlers::get_record)
                .patch(handlers::update_record)
                .delete(handlers::delete_record),
        )
        .layer(middleware::from_fn_with_state(auth, auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
