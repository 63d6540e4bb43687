use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use futures::{stream, StreamExt};
use mockall::mock;
use serde_json::{json, Value};
use tower::ServiceExt;

use ai_consultation_cell::llm::{ChatCompletion, ChatRequest, ChatTurn, FragmentStream, LlmError};
use ai_consultation_cell::router::consultation_routes;
use ai_consultation_cell::{ConsultationService, ConsultationState};
use shared_models::user::User;
use shared_utils::test_utils::TestWorld;

mock! {
    pub Llm {}

    #[async_trait]
    impl ChatCompletion for Llm {
        async fn chat(&self, request: ChatRequest) -> Result<String, LlmError>;
        async fn chat_stream(&self, request: ChatRequest) -> Result<FragmentStream, LlmError>;
        async fn analyze_symptoms(&self, symptoms: String, turns: Vec<ChatTurn>) -> Result<Value, LlmError>;
    }
}

fn app(world: &TestWorld, llm: MockLlm) -> Router {
    let state = Arc::new(ConsultationState {
        consultations: ConsultationService::new(&world.repos, Arc::new(llm)),
    });
    Router::new().nest("/ai-consultations", consultation_routes(state, world.auth_state()))
}

fn post_json(uri: &str, bearer: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", bearer)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, bearer: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", bearer)
        .body(Body::empty())
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

async fn start(world: &TestWorld, patient: &User) -> String {
    let response = app(world, MockLlm::new())
        .oneshot(post_json(
            "/ai-consultations",
            &world.bearer(patient),
            json!({"symptoms_text": "Itchy rash on both forearms since last week"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn consultations_require_a_token() {
    let world = TestWorld::new();
    let response = app(&world, MockLlm::new())
        .oneshot(
            Request::builder()
                .uri("/ai-consultations/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn start_and_read_back() {
    let world = TestWorld::new();
    let patient = world.patient("p@example.com").await;
    let id = start(&world, &patient).await;

    let response = app(&world, MockLlm::new())
        .oneshot(get(&format!("/ai-consultations/{}", id), &world.bearer(&patient)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["consultation"]["status"], "active");
    assert_eq!(json["messages"].as_array().unwrap().len(), 1);
    assert_eq!(json["messages"][0]["role"], "user");

    let mine = app(&world, MockLlm::new())
        .oneshot(get("/ai-consultations/me", &world.bearer(&patient)))
        .await
        .unwrap();
    assert_eq!(body_json(mine).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn too_short_symptoms_are_a_bad_request() {
    let world = TestWorld::new();
    let patient = world.patient("p@example.com").await;

    let response = app(&world, MockLlm::new())
        .oneshot(post_json(
            "/ai-consultations",
            &world.bearer(&patient),
            json!({"symptoms_text": "rash"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn strangers_cannot_read_a_consultation() {
    let world = TestWorld::new();
    let owner = world.patient("owner@example.com").await;
    let stranger = world.patient("stranger@example.com").await;
    let id = start(&world, &owner).await;

    let response = app(&world, MockLlm::new())
        .oneshot(get(&format!("/ai-consultations/{}/messages", id), &world.bearer(&stranger)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn message_reply_is_returned() {
    let world = TestWorld::new();
    let patient = world.patient("p@example.com").await;
    let id = start(&world, &patient).await;

    let mut llm = MockLlm::new();
    llm.expect_chat()
        .returning(|_| Ok("Does the rash itch more at night?".to_string()));

    let response = app(&world, llm)
        .oneshot(post_json(
            &format!("/ai-consultations/{}/messages", id),
            &world.bearer(&patient),
            json!({"content": "It started after I changed detergent"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["role"], "assistant");
    assert_eq!(json["content"], "Does the rash itch more at night?");
}

#[tokio::test]
async fn streamed_reply_is_plain_text() {
    let world = TestWorld::new();
    let patient = world.patient("p@example.com").await;
    let id = start(&world, &patient).await;

    let mut llm = MockLlm::new();
    llm.expect_chat_stream().returning(|_| {
        Ok(stream::iter(vec![Ok("Try a ".to_string()), Ok("fragrance-free soap.".to_string())]).boxed())
    });

    let response = app(&world, llm)
        .oneshot(post_json(
            &format!("/ai-consultations/{}/messages/stream", id),
            &world.bearer(&patient),
            json!({"content": "What should I do?"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert_eq!(body_bytes(response).await, b"Try a fragrance-free soap.".to_vec());
}

#[tokio::test]
async fn completion_returns_analysis() {
    let world = TestWorld::new();
    let patient = world.patient("p@example.com").await;
    let dermatology = world.specialization("Dermatology").await;
    let (_, doctor) = world.approved_doctor("derm@example.com", dermatology.id).await;
    let id = start(&world, &patient).await;

    let mut llm = MockLlm::new();
    llm.expect_analyze_symptoms().returning(|_, _| {
        Ok(json!({
            "recommended_specialization": "Dermatology",
            "confidence": 0.75,
            "urgency": "low",
            "summary": "Contact dermatitis suspected",
            "key_symptoms": ["rash", "itching"],
            "suggested_questions_for_doctor": ["Should I patch test?"]
        }))
    });

    let response = app(&world, llm)
        .oneshot(post_json(
            &format!("/ai-consultations/{}/complete", id),
            &world.bearer(&patient),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["analysis"]["urgency"], "low");
    assert_eq!(json["recommended_doctors"][0]["id"], doctor.id.to_string());
    assert_eq!(json["recommended_doctors"][0]["specialization_name"], "Dermatology");
}

#[tokio::test]
async fn model_outage_is_a_bad_gateway() {
    let world = TestWorld::new();
    let patient = world.patient("p@example.com").await;
    let id = start(&world, &patient).await;

    let mut llm = MockLlm::new();
    llm.expect_chat().returning(|_| Err(LlmError::NotConfigured));

    let response = app(&world, llm)
        .oneshot(post_json(
            &format!("/ai-consultations/{}/messages", id),
            &world.bearer(&patient),
            json!({"content": "Hello?"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["error"], "External service error");
}
