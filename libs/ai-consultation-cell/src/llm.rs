use std::collections::VecDeque;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::{header, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, instrument};

use shared_config::AppConfig;
use shared_models::consultation::{ChatMessage, ChatRole};
use shared_models::error::AppError;

use crate::prompts;

const CHAT_TEMPERATURE: f64 = 0.7;
const ANALYSIS_TEMPERATURE: f64 = 0.3;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request to chat API failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("chat API error ({status}): {message}")]
    Api { status: StatusCode, message: String },

    #[error("unexpected chat API payload: {0}")]
    Decode(String),

    #[error("chat API is not configured")]
    NotConfigured,
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        AppError::ExternalService(err.to_string())
    }
}

/// One `{role, content}` entry of the conversation sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

impl From<&ChatMessage> for ChatTurn {
    fn from(message: &ChatMessage) -> Self {
        Self::new(message.role, message.content.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub turns: Vec<ChatTurn>,
}

impl ChatRequest {
    fn messages(&self) -> Vec<ChatTurn> {
        let mut messages = Vec::with_capacity(self.turns.len() + 1);
        messages.push(ChatTurn::new(ChatRole::System, self.system_prompt.clone()));
        messages.extend(self.turns.iter().cloned());
        messages
    }
}

/// Fragments of one assistant reply, in order. Their concatenation is the
/// complete reply.
pub type FragmentStream = BoxStream<'static, Result<String, LlmError>>;

/// The chat-completion provider behind the consultation engine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<String, LlmError>;

    async fn chat_stream(&self, request: ChatRequest) -> Result<FragmentStream, LlmError>;

    /// Final structured analysis of a conversation. The returned object carries
    /// at least `recommended_specialization`, `confidence` and `urgency`.
    async fn analyze_symptoms(&self, symptoms: String, turns: Vec<ChatTurn>) -> Result<Value, LlmError>;
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChatClient {
    http_client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiChatClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http_client: Client::new(),
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn post(&self, body: Value) -> Result<Response, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::NotConfigured);
        }

        let response = self
            .http_client
            .post(self.endpoint())
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!("Chat API error ({}): {}", status, message);
            return Err(LlmError::Api { status, message });
        }

        Ok(response)
    }

    async fn complete(&self, body: Value) -> Result<String, LlmError> {
        let payload: Value = self.post(body).await?.json().await?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LlmError::Decode("missing choices[0].message.content".to_string()))
    }
}

#[async_trait]
impl ChatCompletion for OpenAiChatClient {
    #[instrument(skip(self, request), fields(turns = request.turns.len()))]
    async fn chat(&self, request: ChatRequest) -> Result<String, LlmError> {
        self.complete(json!({
            "model": self.model,
            "messages": request.messages(),
            "temperature": CHAT_TEMPERATURE,
        }))
        .await
    }

    #[instrument(skip(self, request), fields(turns = request.turns.len()))]
    async fn chat_stream(&self, request: ChatRequest) -> Result<FragmentStream, LlmError> {
        let response = self
            .post(json!({
                "model": self.model,
                "messages": request.messages(),
                "temperature": CHAT_TEMPERATURE,
                "stream": true,
            }))
            .await?;

        Ok(sse_fragments(Box::pin(response.bytes_stream())).boxed())
    }

    #[instrument(skip(self, symptoms, turns), fields(turns = turns.len()))]
    async fn analyze_symptoms(&self, symptoms: String, mut turns: Vec<ChatTurn>) -> Result<Value, LlmError> {
        turns.push(ChatTurn::new(ChatRole::User, prompts::analysis_prompt(&symptoms)));

        let content = self
            .complete(json!({
                "model": self.model,
                "messages": turns,
                "temperature": ANALYSIS_TEMPERATURE,
                "response_format": { "type": "json_object" },
            }))
            .await?;

        serde_json::from_str(&content).map_err(|e| LlmError::Decode(format!("analysis is not JSON: {}", e)))
    }
}

// ==============================================================================
// SERVER-SENT EVENTS
// ==============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    Data(String),
    Done,
}

/// Splits a byte stream into `data:` payloads. Lines may arrive split across
/// chunks, including in the middle of a UTF-8 sequence.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            let Some(payload) = line.strip_prefix("data:") else {
                continue;
            };
            let payload = payload.trim_start();
            if payload == "[DONE]" {
                events.push(SseEvent::Done);
            } else if !payload.is_empty() {
                events.push(SseEvent::Data(payload.to_string()));
            }
        }
        events
    }
}

fn delta_content(payload: &str) -> Result<Option<String>, LlmError> {
    let chunk: Value = serde_json::from_str(payload)
        .map_err(|e| LlmError::Decode(format!("stream chunk is not JSON: {}", e)))?;
    Ok(chunk["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string))
}

struct SseState<S> {
    bytes: S,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    done: bool,
}

/// Turns a streamed completion body into its text fragments, ending at
/// `[DONE]` or when the body ends.
pub fn sse_fragments<S, B, E>(bytes: S) -> impl Stream<Item = Result<String, LlmError>> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Send + 'static,
    LlmError: From<E>,
{
    let state = SseState {
        bytes,
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.pending.pop_front() {
                return Some((Ok(fragment), state));
            }
            if state.done {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    for event in state.decoder.push(chunk.as_ref()) {
                        match event {
                            SseEvent::Done => {
                                state.done = true;
                                break;
                            }
                            SseEvent::Data(payload) => match delta_content(&payload) {
                                Ok(Some(text)) => state.pending.push_back(text),
                                Ok(None) => {}
                                Err(e) => {
                                    state.done = true;
                                    return Some((Err(e), state));
                                }
                            },
                        }
                    }
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(LlmError::from(e)), state));
                }
                None => {
                    debug!("Completion stream ended without [DONE]");
                    state.done = true;
                }
            }
        }
    })
}
