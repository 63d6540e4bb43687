use assert_matches::assert_matches;
use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ai_consultation_cell::llm::{ChatCompletion, ChatRequest, ChatTurn, LlmError, OpenAiChatClient};
use shared_models::consultation::ChatRole;
use shared_utils::test_utils::TestConfig;

fn client(server: &MockServer) -> OpenAiChatClient {
    let config = TestConfig {
        openai_base_url: format!("{}/v1", server.uri()),
        ..TestConfig::default()
    };
    OpenAiChatClient::new(&config.to_app_config())
}

fn request() -> ChatRequest {
    ChatRequest {
        system_prompt: "You are a careful medical assistant.".into(),
        turns: vec![ChatTurn::new(ChatRole::User, "I have had a fever since Monday")],
    }
}

#[tokio::test]
async fn chat_returns_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-openai-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4-turbo-preview",
            "temperature": 0.7,
            "messages": [
                {"role": "system", "content": "You are a careful medical assistant."},
                {"role": "user", "content": "I have had a fever since Monday"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "How high is the fever?"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client(&server).chat(request()).await.unwrap();
    assert_eq!(reply, "How high is the fever?");
}

#[tokio::test]
async fn chat_stream_yields_deltas() {
    let server = MockServer::start().await;
    let body: String = [
        r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#,
        r#"data: {"choices":[{"delta":{"content":"Rest "}}]}"#,
        r#"data: {"choices":[{"delta":{"content":"and hydrate."}}]}"#,
        "data: [DONE]",
    ]
    .iter()
    .map(|line| format!("{}\n\n", line))
    .collect();

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let fragments: Vec<String> = client(&server)
        .chat_stream(request())
        .await
        .unwrap()
        .map(|f| f.unwrap())
        .collect()
        .await;
    assert_eq!(fragments, vec!["Rest ", "and hydrate."]);
}

#[tokio::test]
async fn analysis_asks_for_json_and_parses_it() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "temperature": 0.3,
            "response_format": {"type": "json_object"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "{\"recommended_specialization\":\"Neurology\",\"confidence\":0.6,\"urgency\":\"medium\"}"}}]
        })))
        .mount(&server)
        .await;

    let analysis = client(&server)
        .analyze_symptoms("Recurring migraines".into(), request().turns)
        .await
        .unwrap();
    assert_eq!(analysis["recommended_specialization"], "Neurology");
    assert_eq!(analysis["urgency"], "medium");
}

#[tokio::test]
async fn upstream_errors_are_typed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let result = client(&server).chat(request()).await;
    assert_matches!(result, Err(LlmError::Api { status, .. }) if status.as_u16() == 429);
}

#[tokio::test]
async fn missing_api_key_fails_fast() {
    let mut config = TestConfig::default().to_app_config();
    config.openai_api_key = String::new();

    let result = OpenAiChatClient::new(&config).chat(request()).await;
    assert_matches!(result, Err(LlmError::NotConfigured));
}
