use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::{auth_middleware, AuthState};

use crate::handlers::{self, ConsultationState};
use crate::session::ChatSessions;
use crate::websocket;

pub fn consultation_routes(state: Arc<ConsultationState>, auth: Arc<AuthState>) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::start_consultation))
        .route("/me", get(handlers::get_my_consultations))
        .route("/{consultation_id}", get(handlers::get_consultation))
        .route(
            "/{consultation_id}/messages",
            get(handlers::get_messages).post(handlers::send_message),
        )
        .route(
            "/{consultation_id}/messages/stream",
            post(handlers::send_message_stream),
        )
        .route(
            "/{consultation_id}/complete",
            post(handlers::complete_consultation),
        )
        .layer(middleware::from_fn_with_state(auth, auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}

/// Websocket endpoints. They authenticate in-band, so no auth layer.
pub fn chat_socket_routes(sessions: Arc<ChatSessions>) -> Router {
    Router::new()
        .route("/ai-chat", get(websocket::ai_chat))
        .route("/ai-chat/start", get(websocket::ai_chat_start))
        .with_state(sessions)
}
