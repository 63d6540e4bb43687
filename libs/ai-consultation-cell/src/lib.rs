pub mod handlers;
pub mod llm;
pub mod models;
pub mod prompts;
pub mod recommendation;
pub mod router;
pub mod services;
pub mod session;
pub mod websocket;

pub use handlers::ConsultationState;
pub use llm::{ChatCompletion, ChatRequest, ChatTurn, FragmentStream, LlmError, OpenAiChatClient};
pub use services::ConsultationService;
pub use session::ChatSessions;
