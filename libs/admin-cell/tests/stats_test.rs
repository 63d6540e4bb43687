use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use tower::ServiceExt;
use uuid::Uuid;

use admin_cell::router::admin_stats_routes;
use admin_cell::{AdminState, AdminStats, StatsService};
use shared_models::appointment::{AppointmentStatus, NewAppointment};
use shared_models::error::AppError;
use shared_models::medical_record::NewMedicalRecord;
use shared_utils::test_utils::TestWorld;

fn app(world: &TestWorld) -> Router {
    let state = Arc::new(AdminState {
        stats: StatsService::new(&world.repos),
    });
    Router::new().nest("/admin/stats", admin_stats_routes(state, world.auth_state()))
}

async fn book(
    world: &TestWorld,
    patient_id: Uuid,
    doctor_id: Uuid,
    date_time: DateTime<Utc>,
    status: AppointmentStatus,
) -> Uuid {
    world
        .repos
        .appointments
        .create(NewAppointment {
            date_time,
            duration_minutes: 30,
            status,
            notes: None,
            patient_id,
            doctor_id,
            ai_consultation_id: None,
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn counts_every_table() {
    let world = TestWorld::new();
    let patient = world.patient("p@example.com").await;
    world.admin("admin@example.com").await;
    let cardiology = world.specialization("Cardiology").await;
    let (_, doctor) = world.approved_doctor("doc@example.com", cardiology.id).await;

    let now = Utc.with_ymd_and_hms(2026, 5, 12, 12, 0, 0).unwrap();
    let yesterday = now - Duration::days(1);
    book(&world, patient.id, doctor.id, now + Duration::hours(2), AppointmentStatus::Scheduled).await;
    book(&world, patient.id, doctor.id, now - Duration::hours(3), AppointmentStatus::Completed).await;
    let older = book(&world, patient.id, doctor.id, yesterday, AppointmentStatus::Completed).await;
    book(&world, patient.id, doctor.id, yesterday + Duration::hours(1), AppointmentStatus::Cancelled).await;

    world
        .repos
        .medical_records
        .create(NewMedicalRecord {
            diagnosis: "Stable angina".into(),
            prescription: None,
            notes: None,
            patient_id: patient.id,
            doctor_id: doctor.id,
            appointment_id: Some(older),
        })
        .await
        .unwrap();

    let stats = StatsService::new(&world.repos).collect(now).await.unwrap();
    assert_eq!(
        stats,
        AdminStats {
            total_users: 3,
            total_doctors: 1,
            total_bookings: 4,
            today_bookings: 2,
            pending_bookings: 1,
            completed_bookings: 2,
            total_emrs: 1,
        }
    );
}

#[tokio::test]
async fn today_excludes_next_midnight() {
    let world = TestWorld::new();
    let patient = world.patient("p@example.com").await;
    let spec = world.specialization("Neurology").await;
    let (_, doctor) = world.approved_doctor("doc@example.com", spec.id).await;

    let now = Utc.with_ymd_and_hms(2026, 5, 12, 23, 0, 0).unwrap();
    let midnight = Utc.with_ymd_and_hms(2026, 5, 13, 0, 0, 0).unwrap();
    book(&world, patient.id, doctor.id, midnight, AppointmentStatus::Scheduled).await;
    book(&world, patient.id, doctor.id, midnight - Duration::minutes(30), AppointmentStatus::Scheduled).await;

    let stats = StatsService::new(&world.repos).collect(now).await.unwrap();
    assert_eq!(stats.today_bookings, 1);
    assert_eq!(stats.pending_bookings, 2);
}

#[tokio::test]
async fn only_admins_see_stats() {
    let world = TestWorld::new();
    let patient = world.patient("p@example.com").await;
    let caller = world.caller(&patient).await;

    let result = StatsService::new(&world.repos).admin_stats(&caller).await;
    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn stats_endpoint_returns_dashboard_shape() {
    let world = TestWorld::new();
    let admin = world.admin("admin@example.com").await;
    world.patient("p@example.com").await;

    let response = app(&world)
        .oneshot(
            Request::builder()
                .uri("/admin/stats")
                .header("authorization", world.bearer(&admin))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["totalUsers"], 2);
    assert_eq!(json["totalEMRs"], 0);
    assert_eq!(json["todayBookings"], 0);
}

#[tokio::test]
async fn stats_endpoint_rejects_patients() {
    let world = TestWorld::new();
    let patient = world.patient("p@example.com").await;

    let response = app(&world)
        .oneshot(
            Request::builder()
                .uri("/admin/stats")
                .header("authorization", world.bearer(&patient))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let anonymous = app(&world)
        .oneshot(Request::builder().uri("/admin/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
}
