//! Duplex chat protocol for AI consultations.
//!
//! The protocol is written against [`SessionTransport`] so that the same state
//! machine runs over a websocket in production and over a scripted transport
//! in tests.
//!
//! Chat session (`/ws/ai-chat`):
//! 1. token from the query string or a first `{"token": ...}` frame
//! 2. consultation id from the query string, the token frame or the next frame
//! 3. `connected`, then `message` / `complete` / `history` / `ping` until the
//!    peer disconnects
//!
//! Start session (`/ws/ai-chat/start`): token from the query string, one
//! `{"symptoms_text": ...}` frame, `consultation_created`, the first streamed
//! assistant turn, close.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_models::auth::AuthUser;
use shared_models::consultation::{ChatMessage, ChatRole, ConsultationStatus};
use shared_models::error::AppError;
use shared_utils::extractor::AuthState;

use crate::models::{RecommendedDoctor, SendMessageRequest, StartConsultationRequest, SYMPTOMS_MIN};
use crate::services::consultation::ConsultationService;
use crate::services::turn::{TurnEvent, TurnStream};

pub const CLOSE_NORMAL: u16 = 1000;
pub const CLOSE_UNSUPPORTED_DATA: u16 = 1003;
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;
pub const CLOSE_UNAUTHORIZED: u16 = 4001;
pub const CLOSE_FORBIDDEN: u16 = 4003;

#[derive(Debug, Error)]
#[error("transport closed")]
pub struct TransportClosed;

/// A bidirectional, text-framed connection to one client.
#[async_trait]
pub trait SessionTransport: Send {
    /// Next text frame, or `None` once the peer has gone.
    async fn recv(&mut self) -> Option<String>;

    async fn send(&mut self, event: &ServerEvent) -> Result<(), TransportClosed>;

    async fn close(&mut self, code: u16, reason: &str);
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    Message {
        #[serde(default)]
        content: String,
    },
    Complete,
    History,
    Ping,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Error, PartialEq)]
#[error("frame is not valid JSON")]
pub struct InvalidJson;

impl ClientCommand {
    /// Frames without a recognised `type` are `Unknown`; only frames that are
    /// not JSON at all fail.
    pub fn parse(frame: &str) -> Result<Self, InvalidJson> {
        let value: Value = serde_json::from_str(frame).map_err(|_| InvalidJson)?;
        Ok(serde_json::from_value(value).unwrap_or(ClientCommand::Unknown))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected {
        consultation_id: Uuid,
        status: ConsultationStatus,
    },
    ConsultationCreated {
        consultation_id: Uuid,
    },
    MessageReceived {
        role: ChatRole,
        content: String,
    },
    StreamStart,
    StreamChunk {
        content: String,
    },
    StreamEnd {
        role: ChatRole,
        content: String,
    },
    Recommendation {
        data: Value,
    },
    Analyzing,
    AnalysisComplete {
        analysis: Value,
        recommended_doctors: Vec<RecommendedDoctor>,
    },
    History {
        messages: Vec<ChatMessage>,
    },
    Pong,
    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl ServerEvent {
    pub fn error(code: &str) -> Self {
        ServerEvent::Error {
            error: code.to_string(),
            message: None,
        }
    }

    pub fn error_with(code: &str, message: impl Into<String>) -> Self {
        ServerEvent::Error {
            error: code.to_string(),
            message: Some(message.into()),
        }
    }
}

/// Connection parameters of a chat session, usually the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatParams {
    pub token: Option<String>,
    pub consultation_id: Option<String>,
}

fn frame_string(frame: &Value, key: &str) -> Option<String> {
    match &frame[key] {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_frame(frame: &str) -> Value {
    serde_json::from_str(frame).unwrap_or(Value::Null)
}

/// Runs the chat and start protocols for authenticated callers.
pub struct ChatSessions {
    consultations: ConsultationService,
    auth: Arc<AuthState>,
}

impl ChatSessions {
    pub fn new(consultations: ConsultationService, auth: Arc<AuthState>) -> Self {
        Self { consultations, auth }
    }

    async fn reject<T: SessionTransport>(&self, transport: &mut T, error: &str, code: u16) {
        debug!("Closing chat session: {} ({})", error, code);
        let _ = transport.send(&ServerEvent::error(error)).await;
        transport.close(code, error).await;
    }

    async fn authenticate<T: SessionTransport>(&self, transport: &mut T, token: Option<String>) -> Option<AuthUser> {
        let Some(token) = token else {
            self.reject(transport, "missing_token", CLOSE_UNAUTHORIZED).await;
            return None;
        };

        match self.auth.authenticate(&token).await {
            Ok(caller) => Some(caller),
            Err(e) => {
                debug!("Chat session token rejected: {}", e);
                self.reject(transport, "invalid_token", CLOSE_UNAUTHORIZED).await;
                None
            }
        }
    }

    #[instrument(skip_all)]
    pub async fn run_chat<T: SessionTransport>(&self, transport: &mut T, params: ChatParams) {
        let mut consultation_ref = params.consultation_id;

        let token = match params.token {
            Some(token) => Some(token),
            None => {
                let Some(frame) = transport.recv().await else {
                    return;
                };
                let frame = parse_frame(&frame);
                consultation_ref = consultation_ref.or_else(|| frame_string(&frame, "consultation_id"));
                frame_string(&frame, "token")
            }
        };

        let Some(caller) = self.authenticate(transport, token).await else {
            return;
        };

        let consultation_ref = match consultation_ref {
            Some(reference) => Some(reference),
            None => {
                let Some(frame) = transport.recv().await else {
                    return;
                };
                frame_string(&parse_frame(&frame), "consultation_id")
            }
        };
        let Some(consultation_ref) = consultation_ref else {
            self.reject(transport, "missing_consultation_id", CLOSE_POLICY_VIOLATION).await;
            return;
        };
        let Ok(consultation_id) = Uuid::parse_str(consultation_ref.trim()) else {
            self.reject(transport, "invalid_consultation_id", CLOSE_UNSUPPORTED_DATA).await;
            return;
        };

        let consultation = match self.consultations.owned(&caller, consultation_id).await {
            Ok(consultation) => consultation,
            Err(AppError::Forbidden(_)) => {
                self.reject(transport, "access_denied", CLOSE_FORBIDDEN).await;
                return;
            }
            Err(e) => {
                debug!("Chat session for {} refused: {}", consultation_id, e);
                self.reject(transport, "consultation_not_found", CLOSE_POLICY_VIOLATION).await;
                return;
            }
        };

        info!("Chat session open for consultation {}", consultation_id);
        let connected = ServerEvent::Connected {
            consultation_id,
            status: consultation.status,
        };
        if transport.send(&connected).await.is_err() {
            return;
        }

        while let Some(frame) = transport.recv().await {
            let handled = match ClientCommand::parse(&frame) {
                Ok(ClientCommand::Message { content }) => {
                    self.on_message(transport, &caller, consultation_id, content).await
                }
                Ok(ClientCommand::Complete) => self.on_complete(transport, &caller, consultation_id).await,
                Ok(ClientCommand::History) => self.on_history(transport, &caller, consultation_id).await,
                Ok(ClientCommand::Ping) => transport.send(&ServerEvent::Pong).await,
                Ok(ClientCommand::Unknown) => transport.send(&ServerEvent::error("unknown_message_type")).await,
                Err(InvalidJson) => transport.send(&ServerEvent::error("invalid_json")).await,
            };
            if handled.is_err() {
                break;
            }
        }

        debug!("Chat session for consultation {} ended", consultation_id);
    }

    async fn on_message<T: SessionTransport>(
        &self,
        transport: &mut T,
        caller: &AuthUser,
        consultation_id: Uuid,
        content: String,
    ) -> Result<(), TransportClosed> {
        if content.trim().is_empty() {
            return transport.send(&ServerEvent::error("empty_message")).await;
        }

        let turn = match self
            .consultations
            .record_user_turn(caller, consultation_id, SendMessageRequest { content })
            .await
        {
            Ok(turn) => turn,
            Err(e) => return transport.send(&ServerEvent::error_with("invalid_message", e.public_message())).await,
        };

        transport
            .send(&ServerEvent::MessageReceived {
                role: ChatRole::User,
                content: turn.content,
            })
            .await?;

        self.relay_reply(transport, consultation_id).await.map(|_| ())
    }

    /// Streams the next assistant turn to the client. Returns whether the
    /// turn completed.
    async fn relay_reply<T: SessionTransport>(
        &self,
        transport: &mut T,
        consultation_id: Uuid,
    ) -> Result<bool, TransportClosed> {
        transport.send(&ServerEvent::StreamStart).await?;

        let mut turn: TurnStream = match self.consultations.stream_reply(consultation_id).await {
            Ok(turn) => turn,
            Err(e) => {
                warn!("Could not start reply for {}: {}", consultation_id, e);
                transport.send(&ai_error(&e)).await?;
                return Ok(false);
            }
        };

        while let Some(event) = turn.next_event().await {
            match event {
                TurnEvent::Fragment(content) => {
                    transport.send(&ServerEvent::StreamChunk { content }).await?;
                }
                TurnEvent::Finished(done) => {
                    transport
                        .send(&ServerEvent::StreamEnd {
                            role: ChatRole::Assistant,
                            content: done.message.content,
                        })
                        .await?;
                    if let Some(rec) = done.recommendation {
                        transport.send(&ServerEvent::Recommendation { data: rec.data }).await?;
                    }
                    return Ok(true);
                }
                TurnEvent::Failed(e) => {
                    transport.send(&ai_error(&e)).await?;
                    return Ok(false);
                }
            }
        }
        Ok(false)
    }

    async fn on_complete<T: SessionTransport>(
        &self,
        transport: &mut T,
        caller: &AuthUser,
        consultation_id: Uuid,
    ) -> Result<(), TransportClosed> {
        transport.send(&ServerEvent::Analyzing).await?;

        match self.consultations.complete(caller, consultation_id).await {
            Ok(result) => {
                transport
                    .send(&ServerEvent::AnalysisComplete {
                        analysis: result.analysis,
                        recommended_doctors: result.recommended_doctors,
                    })
                    .await
            }
            Err(e) => {
                warn!("Analysis of {} failed: {}", consultation_id, e);
                transport
                    .send(&ServerEvent::error_with(
                        "analysis_error",
                        format!("Analysis error: {}", e.public_message()),
                    ))
                    .await
            }
        }
    }

    async fn on_history<T: SessionTransport>(
        &self,
        transport: &mut T,
        caller: &AuthUser,
        consultation_id: Uuid,
    ) -> Result<(), TransportClosed> {
        match self.consultations.messages(caller, consultation_id).await {
            Ok(messages) => transport.send(&ServerEvent::History { messages }).await,
            Err(e) => transport.send(&ServerEvent::error_with("history_error", e.public_message())).await,
        }
    }

    #[instrument(skip_all)]
    pub async fn run_start<T: SessionTransport>(&self, transport: &mut T, token: Option<String>) {
        let Some(caller) = self.authenticate(transport, token).await else {
            return;
        };

        let Some(frame) = transport.recv().await else {
            return;
        };
        let symptoms_text = parse_frame(&frame)["symptoms_text"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_default();
        if symptoms_text.trim().chars().count() < SYMPTOMS_MIN {
            self.reject(transport, "symptoms_text_required_min_10_chars", CLOSE_POLICY_VIOLATION)
                .await;
            return;
        }

        let consultation = match self
            .consultations
            .start(&caller, StartConsultationRequest { symptoms_text })
            .await
        {
            Ok(consultation) => consultation,
            Err(e) => {
                let _ = transport
                    .send(&ServerEvent::error_with("invalid_symptoms", e.public_message()))
                    .await;
                transport.close(CLOSE_POLICY_VIOLATION, "invalid_symptoms").await;
                return;
            }
        };

        let created = ServerEvent::ConsultationCreated {
            consultation_id: consultation.id,
        };
        if transport.send(&created).await.is_err() {
            return;
        }

        if self.relay_reply(transport, consultation.id).await.is_ok() {
            transport.close(CLOSE_NORMAL, "").await;
        }
    }
}

fn ai_error(err: &AppError) -> ServerEvent {
    ServerEvent::error_with("ai_service_error", format!("AI service error: {}", err.public_message()))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::llm::{LlmError, MockChatCompletion};
    use futures::{stream, StreamExt};
    use serde_json::json;
    use shared_models::consultation::AiConsultation;
    use shared_utils::test_utils::TestWorld;

    /// Plays back scripted client frames, then behaves like a disconnected peer.
    #[derive(Default)]
    struct ScriptedTransport {
        inbound: VecDeque<String>,
        sent: Vec<Value>,
        closed: Option<u16>,
    }

    impl ScriptedTransport {
        fn with_frames(frames: &[Value]) -> Self {
            Self {
                inbound: frames.iter().map(|f| f.to_string()).collect(),
                ..Default::default()
            }
        }

        fn types(&self) -> Vec<String> {
            self.sent
                .iter()
                .map(|e| e["type"].as_str().unwrap_or_default().to_string())
                .collect()
        }
    }

    #[async_trait]
    impl SessionTransport for ScriptedTransport {
        async fn recv(&mut self) -> Option<String> {
            self.inbound.pop_front()
        }

        async fn send(&mut self, event: &ServerEvent) -> Result<(), TransportClosed> {
            if self.closed.is_some() {
                return Err(TransportClosed);
            }
            self.sent.push(serde_json::to_value(event).unwrap());
            Ok(())
        }

        async fn close(&mut self, code: u16, _reason: &str) {
            self.closed.get_or_insert(code);
        }
    }

    struct Harness {
        world: TestWorld,
        sessions: ChatSessions,
    }

    fn harness(llm: MockChatCompletion) -> Harness {
        let world = TestWorld::new();
        let service = ConsultationService::new(&world.repos, Arc::new(llm));
        let sessions = ChatSessions::new(service, world.auth_state());
        Harness { world, sessions }
    }

    impl Harness {
        async fn patient_with_consultation(&self, email: &str) -> (String, AiConsultation) {
            let user = self.world.patient(email).await;
            let caller = self.world.caller(&user).await;
            let service = ConsultationService::new(&self.world.repos, Arc::new(MockChatCompletion::new()));
            let consultation = service
                .start(
                    &caller,
                    StartConsultationRequest {
                        symptoms_text: "Persistent dry cough for two weeks".into(),
                    },
                )
                .await
                .unwrap();
            let token = self.world.bearer(&user).trim_start_matches("Bearer ").to_string();
            (token, consultation)
        }
    }

    fn streaming(fragments: &'static [&'static str]) -> MockChatCompletion {
        let mut llm = MockChatCompletion::new();
        llm.expect_chat_stream().returning(move |_| {
            Ok(stream::iter(fragments.iter().map(|f| Ok(f.to_string()))).boxed())
        });
        llm
    }

    #[test]
    fn commands_parse_leniently() {
        assert_eq!(
            ClientCommand::parse(r#"{"type":"message","content":"hi"}"#),
            Ok(ClientCommand::Message { content: "hi".into() })
        );
        assert_eq!(
            ClientCommand::parse(r#"{"type":"message"}"#),
            Ok(ClientCommand::Message { content: String::new() })
        );
        assert_eq!(ClientCommand::parse(r#"{"type":"dance"}"#), Ok(ClientCommand::Unknown));
        assert_eq!(ClientCommand::parse(r#"{"content":"no type"}"#), Ok(ClientCommand::Unknown));
        assert_eq!(ClientCommand::parse("not json"), Err(InvalidJson));
    }

    #[test]
    fn events_are_tagged_by_type() {
        let event = serde_json::to_value(ServerEvent::StreamChunk { content: "Hi".into() }).unwrap();
        assert_eq!(event, json!({"type": "stream_chunk", "content": "Hi"}));

        let event = serde_json::to_value(ServerEvent::error("empty_message")).unwrap();
        assert_eq!(event, json!({"type": "error", "error": "empty_message"}));
    }

    #[tokio::test]
    async fn missing_token_closes_with_4001() {
        let h = harness(MockChatCompletion::new());
        let mut transport = ScriptedTransport::with_frames(&[json!({"hello": "there"})]);

        h.sessions.run_chat(&mut transport, ChatParams::default()).await;

        assert_eq!(transport.closed, Some(CLOSE_UNAUTHORIZED));
        assert_eq!(transport.sent[0]["error"], "missing_token");
    }

    #[tokio::test]
    async fn bad_token_closes_with_4001() {
        let h = harness(MockChatCompletion::new());
        let mut transport = ScriptedTransport::default();
        let params = ChatParams {
            token: Some("invalid.token.format".into()),
            consultation_id: None,
        };

        h.sessions.run_chat(&mut transport, params).await;

        assert_eq!(transport.closed, Some(CLOSE_UNAUTHORIZED));
        assert_eq!(transport.sent[0]["error"], "invalid_token");
    }

    #[tokio::test]
    async fn consultation_id_problems_have_distinct_codes() {
        let h = harness(MockChatCompletion::new());
        let (token, _) = h.patient_with_consultation("p@example.com").await;

        let mut missing = ScriptedTransport::with_frames(&[json!({"nothing": true})]);
        h.sessions
            .run_chat(&mut missing, ChatParams { token: Some(token.clone()), consultation_id: None })
            .await;
        assert_eq!(missing.closed, Some(CLOSE_POLICY_VIOLATION));

        let mut malformed = ScriptedTransport::default();
        h.sessions
            .run_chat(
                &mut malformed,
                ChatParams { token: Some(token.clone()), consultation_id: Some("42".into()) },
            )
            .await;
        assert_eq!(malformed.closed, Some(CLOSE_UNSUPPORTED_DATA));

        let mut unknown = ScriptedTransport::default();
        h.sessions
            .run_chat(
                &mut unknown,
                ChatParams { token: Some(token), consultation_id: Some(Uuid::new_v4().to_string()) },
            )
            .await;
        assert_eq!(unknown.closed, Some(CLOSE_POLICY_VIOLATION));
        assert_eq!(unknown.sent[0]["error"], "consultation_not_found");
    }

    #[tokio::test]
    async fn someone_elses_consultation_closes_with_4003() {
        let h = harness(MockChatCompletion::new());
        let (_, consultation) = h.patient_with_consultation("owner@example.com").await;
        let (intruder_token, _) = h.patient_with_consultation("intruder@example.com").await;

        let mut transport = ScriptedTransport::default();
        h.sessions
            .run_chat(
                &mut transport,
                ChatParams {
                    token: Some(intruder_token),
                    consultation_id: Some(consultation.id.to_string()),
                },
            )
            .await;
        assert_eq!(transport.closed, Some(CLOSE_FORBIDDEN));
    }

    #[tokio::test]
    async fn token_and_id_can_arrive_in_the_first_frame() {
        let h = harness(MockChatCompletion::new());
        let (token, consultation) = h.patient_with_consultation("p@example.com").await;

        let mut transport = ScriptedTransport::with_frames(&[
            json!({"token": token, "consultation_id": consultation.id}),
            json!({"type": "ping"}),
        ]);
        h.sessions.run_chat(&mut transport, ChatParams::default()).await;

        assert_eq!(transport.types(), vec!["connected", "pong"]);
        assert_eq!(transport.sent[0]["status"], "active");
        assert_eq!(transport.closed, None);
    }

    #[tokio::test]
    async fn message_streams_and_recommends() {
        let h = harness(streaming(&[
            "See a pulmonologist.",
            "\n```json\n{\"recommendation\": true, \"specialization\": \"Pulmonology\", \"confidence\": 0.7}\n```",
        ]));
        let (token, consultation) = h.patient_with_consultation("p@example.com").await;

        let mut transport = ScriptedTransport::with_frames(&[
            json!({"type": "message", "content": "It is worse at night"}),
            json!({"type": "history"}),
        ]);
        h.sessions
            .run_chat(
                &mut transport,
                ChatParams { token: Some(token), consultation_id: Some(consultation.id.to_string()) },
            )
            .await;

        assert_eq!(
            transport.types(),
            vec![
                "connected",
                "message_received",
                "stream_start",
                "stream_chunk",
                "stream_chunk",
                "stream_end",
                "recommendation",
                "history",
            ]
        );
        assert!(transport.sent[5]["content"]
            .as_str()
            .unwrap()
            .starts_with("See a pulmonologist."));
        assert_eq!(transport.sent[6]["data"]["specialization"], "Pulmonology");
        assert_eq!(transport.sent[7]["messages"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn bad_frames_do_not_end_the_session() {
        let h = harness(MockChatCompletion::new());
        let (token, consultation) = h.patient_with_consultation("p@example.com").await;

        let mut transport = ScriptedTransport::default();
        transport.inbound = VecDeque::from(vec![
            "{not json".to_string(),
            json!({"type": "teleport"}).to_string(),
            json!({"type": "message", "content": "   "}).to_string(),
            json!({"type": "ping"}).to_string(),
        ]);
        h.sessions
            .run_chat(
                &mut transport,
                ChatParams { token: Some(token), consultation_id: Some(consultation.id.to_string()) },
            )
            .await;

        let errors: Vec<_> = transport
            .sent
            .iter()
            .filter_map(|e| e["error"].as_str())
            .collect();
        assert_eq!(errors, vec!["invalid_json", "unknown_message_type", "empty_message"]);
        assert_eq!(transport.types().last().map(String::as_str), Some("pong"));
    }

    #[tokio::test]
    async fn model_failure_emits_error_and_continues() {
        let mut llm = MockChatCompletion::new();
        llm.expect_chat_stream()
            .returning(|_| Err(LlmError::NotConfigured));
        llm.expect_analyze_symptoms()
            .returning(|_, _| Ok(json!({"recommended_specialization": null, "confidence": 0.2, "urgency": "low"})));
        let h = harness(llm);
        let (token, consultation) = h.patient_with_consultation("p@example.com").await;

        let mut transport = ScriptedTransport::with_frames(&[
            json!({"type": "message", "content": "Hello?"}),
            json!({"type": "complete"}),
        ]);
        h.sessions
            .run_chat(
                &mut transport,
                ChatParams { token: Some(token), consultation_id: Some(consultation.id.to_string()) },
            )
            .await;

        assert_eq!(
            transport.types(),
            vec![
                "connected",
                "message_received",
                "stream_start",
                "error",
                "analyzing",
                "analysis_complete",
            ]
        );
        assert_eq!(transport.sent[3]["error"], "ai_service_error");
    }

    #[tokio::test]
    async fn start_session_creates_and_streams_first_turn() {
        let h = harness(streaming(&["How long ", "has it lasted?"]));
        let user = h.world.patient("p@example.com").await;
        let token = h.world.bearer(&user).trim_start_matches("Bearer ").to_string();

        let mut transport =
            ScriptedTransport::with_frames(&[json!({"symptoms_text": "Throbbing headache behind my eyes"})]);
        h.sessions.run_start(&mut transport, Some(token)).await;

        assert_eq!(
            transport.types(),
            vec!["consultation_created", "stream_start", "stream_chunk", "stream_chunk", "stream_end"]
        );
        assert_eq!(transport.sent[4]["content"], "How long has it lasted?");
        assert_eq!(transport.closed, Some(CLOSE_NORMAL));

        let consultations = h
            .world
            .repos
            .consultations
            .list_by_patient(user.id, Default::default())
            .await
            .unwrap();
        assert_eq!(consultations.len(), 1);
        let transcript = h.world.repos.consultations.messages(consultations[0].id).await.unwrap();
        assert_eq!(transcript.len(), 2);
    }

    #[tokio::test]
    async fn start_session_requires_real_symptoms() {
        let h = harness(MockChatCompletion::new());
        let user = h.world.patient("p@example.com").await;
        let token = h.world.bearer(&user).trim_start_matches("Bearer ").to_string();

        let mut transport = ScriptedTransport::with_frames(&[json!({"symptoms_text": "ouch"})]);
        h.sessions.run_start(&mut transport, Some(token)).await;
        assert_eq!(transport.closed, Some(CLOSE_POLICY_VIOLATION));
        assert_eq!(transport.sent[0]["error"], "symptoms_text_required_min_10_chars");

        let mut anonymous = ScriptedTransport::default();
        h.sessions.run_start(&mut anonymous, None).await;
        assert_eq!(anonymous.closed, Some(CLOSE_UNAUTHORIZED));
    }
}
