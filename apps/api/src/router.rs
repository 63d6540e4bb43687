use std::sync::Arc;

use axum::{routing::get, Router};

use admin_cell::router::admin_stats_routes;
use admin_cell::{AdminState, StatsService};
use ai_consultation_cell::router::{chat_socket_routes, consultation_routes};
use ai_consultation_cell::{ChatCompletion, ChatSessions, ConsultationService, ConsultationState};
use appointment_cell::router::appointment_routes;
use appointment_cell::{AppointmentBookingService, AppointmentState};
use auth_cell::router::{admin_user_routes, user_routes};
use auth_cell::{UserService, UserState};
use doctor_cell::router::{doctor_routes, schedule_routes, specialization_routes};
use doctor_cell::DoctorState;
use medical_record_cell::router::medical_record_routes;
use medical_record_cell::{MedicalRecordService, MedicalRecordState};
use shared_config::AppConfig;
use shared_database::Repositories;
use shared_utils::extractor::AuthState;
use shared_utils::jwt::TokenService;

pub const API_PREFIX: &str = "/api/v1";

/// Wires every cell over one set of repositories and one chat model.
pub fn create_router(
    config: &AppConfig,
    repos: Repositories,
    llm: Arc<dyn ChatCompletion>,
) -> Router {
    let tokens = Arc::new(TokenService::new(config));
    let auth = Arc::new(AuthState {
        tokens: tokens.clone(),
        users: repos.users.clone(),
        doctors: repos.doctors.clone(),
    });

    let users = Arc::new(UserState {
        service: UserService::new(repos.users.clone(), tokens),
    });
    let doctors = Arc::new(DoctorState::new(&repos));
    let appointments = Arc::new(AppointmentState {
        booking: AppointmentBookingService::new(&repos),
    });
    let records = Arc::new(MedicalRecordState {
        records: MedicalRecordService::new(
            repos.medical_records.clone(),
            repos.appointments.clone(),
        ),
    });
    let consultations = ConsultationService::new(&repos, llm);
    let sessions = Arc::new(ChatSessions::new(consultations.clone(), auth.clone()));
    let consultations = Arc::new(ConsultationState { consultations });
    let admin = Arc::new(AdminState {
        stats: StatsService::new(&repos),
    });

    let api = Router::new()
        .nest("/users", user_routes(users.clone(), auth.clone()))
        .nest("/admin/users", admin_user_routes(users, auth.clone()))
        .nest("/doctors", doctor_routes(doctors.clone(), auth.clone()))
        .nest(
            "/specializations",
            specialization_routes(doctors.clone(), auth.clone()),
        )
        .nest("/schedules", schedule_routes(doctors, auth.clone()))
        .nest("/appointments", appointment_routes(appointments, auth.clone()))
        .nest("/medical-records", medical_record_routes(records, auth.clone()))
        .nest(
            "/ai-consultations",
            consultation_routes(consultations, auth.clone()),
        )
        .nest("/admin/stats", admin_stats_routes(admin, auth));

    Router::new()
        .route("/", get(|| async { "HealthBook API is running!" }))
        .nest(API_PREFIX, api)
        .nest("/ws", chat_socket_routes(sessions))
}
