use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::{AppConfig, StorageBackend};
use shared_database::{
    AppointmentRepository, ConsultationRepository, DoctorRepository, PostgrestStore,
    SpecializationRepository, UserRepository,
};
use shared_models::appointment::{AppointmentStatus, NewAppointment};
use shared_models::consultation::ChatRole;
use shared_models::error::AppError;

fn config(url: String) -> AppConfig {
    AppConfig {
        storage_backend: StorageBackend::Supabase,
        supabase_url: url,
        supabase_service_key: "service-key".to_string(),
        jwt_access_secret: "access".to_string(),
        jwt_refresh_secret: "refresh".to_string(),
        access_token_ttl_minutes: 60,
        refresh_token_ttl_days: 30,
        openai_api_key: String::new(),
        openai_model: "gpt-4-turbo-preview".to_string(),
        openai_base_url: String::new(),
        server_port: 0,
    }
}

fn user_row(id: Uuid, email: &str) -> serde_json::Value {
    json!({
        "id": id,
        "email": email,
        "password_hash": "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA",
        "full_name": "Jane Roe",
        "phone": null,
        "is_admin": false,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z"
    })
}

#[tokio::test]
async fn get_by_email_sends_service_key_and_encoded_filter() {
    let mock_server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("email", "eq.jane+test@example.com"))
        .and(header("apikey", "service-key"))
        .and(header("authorization", "Bearer service-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([user_row(id, "jane+test@example.com")])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = PostgrestStore::new(&config(mock_server.uri()));
    let user = UserRepository::get_by_email(&store, "jane+test@example.com")
        .await
        .unwrap()
        .expect("user row");

    assert_eq!(user.id, id);
    assert!(user.password_hash.starts_with("$argon2id$"));
}

#[tokio::test]
async fn count_reads_content_range_total() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/medical_records"))
        .and(header("prefer", "count=exact"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "0-0/17")
                .set_body_json(json!([{ "id": Uuid::new_v4() }])),
        )
        .mount(&mock_server)
        .await;

    let store = PostgrestStore::new(&config(mock_server.uri()));
    let total = shared_database::MedicalRecordRepository::count(&store).await.unwrap();

    assert_eq!(total, 17);
}

#[tokio::test]
async fn exclusion_violation_maps_to_slot_conflict() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(header("prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23P01",
            "message": "conflicting key value violates exclusion constraint \"appointments_no_overlap\""
        })))
        .mount(&mock_server)
        .await;

    let store = PostgrestStore::new(&config(mock_server.uri()));
    let result = AppointmentRepository::create(
        &store,
        NewAppointment {
            date_time: Utc.with_ymd_and_hms(2030, 1, 8, 9, 0, 0).unwrap(),
            duration_minutes: 30,
            status: AppointmentStatus::Scheduled,
            notes: None,
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            ai_consultation_id: None,
        },
    )
    .await;

    assert_matches!(result, Err(AppError::Conflict(msg)) if msg == "This time slot is already booked");
}

#[tokio::test]
async fn doctor_details_flatten_embedded_rows() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": doctor_id,
            "user_id": Uuid::new_v4(),
            "bio": "Cardiologist with a focus on prevention",
            "rating": 4.7,
            "experience_years": 12,
            "license_number": "LIC-12345",
            "status": "approved",
            "rejection_reason": null,
            "specialization_id": Uuid::new_v4(),
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z",
            "users": { "full_name": "Dr. Ada Heart", "email": "ada@example.com" },
            "specializations": { "title": "Cardiology" }
        }])))
        .mount(&mock_server)
        .await;

    let store = PostgrestStore::new(&config(mock_server.uri()));
    let details = store.get_details(doctor_id).await.unwrap().expect("doctor");

    assert_eq!(details.full_name, "Dr. Ada Heart");
    assert_eq!(details.specialization_title, "Cardiology");
    assert_eq!(details.doctor.experience_years, 12);
}

#[tokio::test]
async fn specialization_counts_come_from_embedded_aggregate() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/specializations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4(), "title": "Cardiology", "description": null, "doctors": [{ "count": 3 }] },
            { "id": Uuid::new_v4(), "title": "Dermatology", "description": "Skin", "doctors": [] }
        ])))
        .mount(&mock_server)
        .await;

    let store = PostgrestStore::new(&config(mock_server.uri()));
    let rows = store.list_with_doctor_count().await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].doctor_count, 3);
    assert_eq!(rows[1].doctor_count, 0);
}

#[tokio::test]
async fn append_message_goes_through_rpc() {
    let mock_server = MockServer::start().await;
    let consultation_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/append_chat_message"))
        .and(body_partial_json(json!({
            "p_consultation_id": consultation_id,
            "p_role": "assistant"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": Uuid::new_v4(),
            "consultation_id": consultation_id,
            "role": "assistant",
            "content": "Could you describe the pain?",
            "created_at": "2024-01-01T00:00:01.000001Z"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = PostgrestStore::new(&config(mock_server.uri()));
    let message = store
        .append_message(consultation_id, ChatRole::Assistant, "Could you describe the pain?".into())
        .await
        .unwrap();

    assert_eq!(message.role, ChatRole::Assistant);
}

#[tokio::test]
async fn server_errors_stay_internal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&mock_server)
        .await;

    let store = PostgrestStore::new(&config(mock_server.uri()));
    let result = DoctorRepository::get_by_id(&store, Uuid::new_v4()).await;

    assert_matches!(result, Err(AppError::Database(_)));
}
