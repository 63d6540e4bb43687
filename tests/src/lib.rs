//! Harness for the end-to-end suite: serves the full router on an ephemeral
//! port over the in-memory store and drives it with a real HTTP client.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::{Client, Response};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use ai_consultation_cell::{ChatCompletion, ChatRequest, ChatTurn, FragmentStream, LlmError};
use healthbook_api::create_router;
use shared_models::user::User;
use shared_utils::test_utils::TestWorld;

/// Chat model that always answers with the same text.
pub struct CannedModel {
    pub reply: String,
    pub analysis: Value,
}

impl CannedModel {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            analysis: json!({
                "recommended_specialization": "Cardiology",
                "confidence": 0.8,
                "urgency": "medium",
                "summary": "Exertional chest tightness",
                "key_symptoms": ["chest tightness"],
                "suggested_questions_for_doctor": []
            }),
        }
    }
}

#[async_trait]
impl ChatCompletion for CannedModel {
    async fn chat(&self, _request: ChatRequest) -> Result<String, LlmError> {
        Ok(self.reply.clone())
    }

    async fn chat_stream(&self, _request: ChatRequest) -> Result<FragmentStream, LlmError> {
        let fragments: Vec<Result<String, LlmError>> = self
            .reply
            .split_inclusive(' ')
            .map(|word| Ok(word.to_string()))
            .collect();
        Ok(stream::iter(fragments).boxed())
    }

    async fn analyze_symptoms(
        &self,
        _symptoms: String,
        _turns: Vec<ChatTurn>,
    ) -> Result<Value, LlmError> {
        Ok(self.analysis.clone())
    }
}

/// A running server plus the seeded world behind it.
pub struct TestServer {
    pub world: TestWorld,
    pub addr: std::net::SocketAddr,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(model: CannedModel) -> Self {
        let world = TestWorld::new();
        let app = create_router(&world.config, world.repos.clone(), Arc::new(model));

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            world,
            addr,
            handle,
        }
    }

    pub fn client(&self) -> ApiTestClient {
        ApiTestClient {
            client: Client::new(),
            base_url: format!("http://{}/api/v1", self.addr),
            auth_header: None,
        }
    }

    pub fn client_as(&self, user: &User) -> ApiTestClient {
        ApiTestClient {
            auth_header: Some(self.world.bearer(user)),
            ..self.client()
        }
    }

    pub fn root_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}/ws{}", self.addr, path)
    }

    /// A raw access token, for transports that cannot carry headers.
    pub fn access_token(&self, user: &User) -> String {
        self.world
            .tokens
            .issue_pair(user.id)
            .expect("token pair")
            .access_token
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// HTTP client bound to the API prefix, optionally authenticated.
#[derive(Clone)]
pub struct ApiTestClient {
    client: Client,
    base_url: String,
    auth_header: Option<String>,
}

impl ApiTestClient {
    pub fn with_token(&self, access_token: &str) -> Self {
        Self {
            auth_header: Some(format!("Bearer {}", access_token)),
            ..self.clone()
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(auth) = &self.auth_header {
            request = request.header("Authorization", auth);
        }
        request
    }

    pub async fn get(&self, path: &str) -> Response {
        self.request(reqwest::Method::GET, path)
            .send()
            .await
            .expect("GET request")
    }

    pub async fn post(&self, path: &str, body: Value) -> Response {
        self.request(reqwest::Method::POST, path)
            .json(&body)
            .send()
            .await
            .expect("POST request")
    }

    pub async fn patch(&self, path: &str, body: Value) -> Response {
        self.request(reqwest::Method::PATCH, path)
            .json(&body)
            .send()
            .await
            .expect("PATCH request")
    }
}
