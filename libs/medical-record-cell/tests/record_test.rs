use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

use medical_record_cell::models::{CreateMedicalRecordRequest, UpdateMedicalRecordRequest};
use medical_record_cell::router::medical_record_routes;
use medical_record_cell::{MedicalRecordService, MedicalRecordState};
use shared_models::appointment::{Appointment, AppointmentStatus, NewAppointment};
use shared_models::error::AppError;
use shared_models::Page;
use shared_utils::test_utils::TestWorld;

fn service(world: &TestWorld) -> MedicalRecordService {
    MedicalRecordService::new(world.repos.medical_records.clone(), world.repos.appointments.clone())
}

fn app(world: &TestWorld) -> Router {
    let state = Arc::new(MedicalRecordState { records: service(world) });
    Router::new().nest("/medical-records", medical_record_routes(state, world.auth_state()))
}

async fn appointment(world: &TestWorld, patient_id: Uuid, doctor_id: Uuid) -> Appointment {
    world
        .repos
        .appointments
        .create(NewAppointment {
            date_time: Utc::now() + Duration::days(3),
            duration_minutes: 30,
            status: AppointmentStatus::Completed,
            notes: None,
            patient_id,
            doctor_id,
            ai_consultation_id: None,
        })
        .await
        .unwrap()
}

fn record_for(patient_id: Uuid, appointment_id: Option<Uuid>) -> CreateMedicalRecordRequest {
    CreateMedicalRecordRequest {
        diagnosis: "Seasonal allergic rhinitis".into(),
        prescription: Some("Cetirizine 10mg daily".into()),
        notes: None,
        patient_id,
        doctor_id: None,
        appointment_id,
    }
}

#[tokio::test]
async fn one_record_per_appointment() {
    let world = TestWorld::new();
    let spec = world.specialization("Allergy").await;
    let (doc_user, doctor) = world.approved_doctor("doc@example.com", spec.id).await;
    let patient = world.patient("p@example.com").await;
    let appt = appointment(&world, patient.id, doctor.id).await;
    let caller = world.caller(&doc_user).await;
    let records = service(&world);

    let record = records
        .create(&caller, record_for(patient.id, Some(appt.id)))
        .await
        .unwrap();
    assert_eq!(record.doctor_id, doctor.id);

    let again = records.create(&caller, record_for(patient.id, Some(appt.id))).await;
    assert_matches!(again, Err(AppError::Conflict(_)));
}

#[tokio::test]
async fn only_doctors_write_records_for_themselves() {
    let world = TestWorld::new();
    let spec = world.specialization("Allergy").await;
    let (doc_user, _) = world.approved_doctor("doc@example.com", spec.id).await;
    let (_, other_doctor) = world.approved_doctor("other@example.com", spec.id).await;
    let patient = world.patient("p@example.com").await;
    let records = service(&world);

    let as_patient = records
        .create(&world.caller(&patient).await, record_for(patient.id, None))
        .await;
    assert_matches!(as_patient, Err(AppError::Forbidden(_)));

    let mut impersonated = record_for(patient.id, None);
    impersonated.doctor_id = Some(other_doctor.id);
    let result = records.create(&world.caller(&doc_user).await, impersonated).await;
    assert_matches!(result, Err(AppError::Forbidden(msg)) if msg == "Cannot create medical record for another doctor");
}

#[tokio::test]
async fn short_diagnosis_is_rejected() {
    let world = TestWorld::new();
    let spec = world.specialization("Allergy").await;
    let (doc_user, _) = world.approved_doctor("doc@example.com", spec.id).await;
    let patient = world.patient("p@example.com").await;

    let mut request = record_for(patient.id, None);
    request.diagnosis = "Flu".into();
    let result = service(&world).create(&world.caller(&doc_user).await, request).await;
    assert_matches!(result, Err(AppError::ValidationError(_)));
}

#[tokio::test]
async fn doctors_see_only_their_own_entries_for_a_patient() {
    let world = TestWorld::new();
    let spec = world.specialization("Allergy").await;
    let (first_user, _) = world.approved_doctor("first@example.com", spec.id).await;
    let (second_user, _) = world.approved_doctor("second@example.com", spec.id).await;
    let patient = world.patient("p@example.com").await;
    let records = service(&world);
    let first = world.caller(&first_user).await;
    let second = world.caller(&second_user).await;

    records.create(&first, record_for(patient.id, None)).await.unwrap();
    records.create(&second, record_for(patient.id, None)).await.unwrap();

    let seen_by_first = records
        .list_for_patient(&first, patient.id, Page::default())
        .await
        .unwrap();
    assert_eq!(seen_by_first.len(), 1);

    let seen_by_patient = records
        .list_for_patient(&world.caller(&patient).await, patient.id, Page::default())
        .await
        .unwrap();
    assert_eq!(seen_by_patient.len(), 2);

    let stranger = world.caller(&world.patient("s@example.com").await).await;
    assert_matches!(
        records.list_for_patient(&stranger, patient.id, Page::default()).await,
        Err(AppError::Forbidden(_))
    );
}

#[tokio::test]
async fn only_the_author_updates_and_admins_may_delete() {
    let world = TestWorld::new();
    let spec = world.specialization("Allergy").await;
    let (author_user, _) = world.approved_doctor("author@example.com", spec.id).await;
    let (other_user, _) = world.approved_doctor("other@example.com", spec.id).await;
    let patient = world.patient("p@example.com").await;
    let admin = world.caller(&world.admin("a@example.com").await).await;
    let records = service(&world);
    let author = world.caller(&author_user).await;

    let record = records.create(&author, record_for(patient.id, None)).await.unwrap();
    let edit = UpdateMedicalRecordRequest {
        notes: Some("Review in two weeks".into()),
        ..Default::default()
    };

    assert_matches!(
        records
            .update(&world.caller(&other_user).await, record.id, edit.clone())
            .await,
        Err(AppError::Forbidden(_))
    );
    let updated = records.update(&author, record.id, edit).await.unwrap();
    assert_eq!(updated.notes.as_deref(), Some("Review in two weeks"));

    records.delete(&admin, record.id).await.unwrap();
    assert_matches!(records.get(&author, record.id).await, Err(AppError::NotFound(_)));
}

#[tokio::test]
async fn patient_reads_own_records_over_http() {
    let world = TestWorld::new();
    let spec = world.specialization("Allergy").await;
    let (doc_user, _) = world.approved_doctor("doc@example.com", spec.id).await;
    let patient = world.patient("p@example.com").await;

    let created = app(&world)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/medical-records")
                .header("authorization", world.bearer(&doc_user))
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "diagnosis": "Mild persistent asthma",
                        "patient_id": patient.id
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);

    let mine = app(&world)
        .oneshot(
            Request::builder()
                .uri("/medical-records/me")
                .header("authorization", world.bearer(&patient))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(mine.status(), StatusCode::OK);
    let body = axum::body::to_bytes(mine.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json[0]["diagnosis"], "Mild persistent asthma");
}
