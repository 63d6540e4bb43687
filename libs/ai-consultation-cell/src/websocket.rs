use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::session::{ChatParams, ChatSessions, ServerEvent, SessionTransport, TransportClosed};

/// Outbound frames queued ahead of the socket writer.
const OUTBOUND_BUFFER: usize = 64;

#[derive(Debug, Deserialize)]
pub struct StartQuery {
    pub token: Option<String>,
}

pub async fn ai_chat(
    ws: WebSocketUpgrade,
    State(sessions): State<Arc<ChatSessions>>,
    Query(params): Query<ChatParams>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let mut transport = WsTransport::new(socket);
        sessions.run_chat(&mut transport, params).await;
        transport.finish().await;
    })
}

pub async fn ai_chat_start(
    ws: WebSocketUpgrade,
    State(sessions): State<Arc<ChatSessions>>,
    Query(query): Query<StartQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let mut transport = WsTransport::new(socket);
        sessions.run_start(&mut transport, query.token).await;
        transport.finish().await;
    })
}

/// A websocket split into a reader owned by the session and a writer task fed
/// through a channel.
pub struct WsTransport {
    incoming: SplitStream<WebSocket>,
    outgoing: mpsc::Sender<Message>,
    writer: JoinHandle<()>,
}

impl WsTransport {
    pub fn new(socket: WebSocket) -> Self {
        let (mut sink, incoming) = socket.split();
        let (outgoing, mut rx) = mpsc::channel::<Message>(OUTBOUND_BUFFER);

        let writer = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if sink.send(message).await.is_err() || closing {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        Self {
            incoming,
            outgoing,
            writer,
        }
    }

    /// Flushes queued frames and waits for the writer to wind down.
    pub async fn finish(self) {
        drop(self.outgoing);
        if let Err(e) = self.writer.await {
            error!("Websocket writer task failed: {}", e);
        }
    }
}

#[async_trait]
impl SessionTransport for WsTransport {
    async fn recv(&mut self) -> Option<String> {
        while let Some(frame) = self.incoming.next().await {
            match frame {
                Ok(Message::Text(text)) => return Some(text.as_str().to_string()),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some(text),
                    Err(_) => debug!("Dropping non UTF-8 binary frame"),
                },
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => {
                    debug!("Websocket read failed: {}", e);
                    return None;
                }
            }
        }
        None
    }

    async fn send(&mut self, event: &ServerEvent) -> Result<(), TransportClosed> {
        let json = serde_json::to_string(event).map_err(|e| {
            error!("Could not encode websocket event: {}", e);
            TransportClosed
        })?;
        self.outgoing
            .send(Message::Text(json.into()))
            .await
            .map_err(|_| TransportClosed)
    }

    async fn close(&mut self, code: u16, reason: &str) {
        let frame = CloseFrame {
            code,
            reason: reason.to_string().into(),
        };
        let _ = self.outgoing.send(Message::Close(Some(frame))).await;
    }
}
