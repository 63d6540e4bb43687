use futures::channel::mpsc;
use futures::{Stream, StreamExt};

use shared_models::consultation::ChatMessage;
use shared_models::error::AppError;

use crate::recommendation::Recommendation;

/// Fragments buffered between the model and a slow consumer.
pub const TURN_BUFFER: usize = 32;

/// The assistant turn once it has been written to the transcript.
#[derive(Debug, Clone)]
pub struct CompletedTurn {
    pub message: ChatMessage,
    pub recommendation: Option<Recommendation>,
}

#[derive(Debug)]
pub enum TurnEvent {
    Fragment(String),
    Finished(CompletedTurn),
    Failed(AppError),
}

/// Consumer side of a streamed assistant turn. Dropping it tells the producer
/// to stop; the turn is then not persisted.
pub struct TurnStream {
    events: mpsc::Receiver<TurnEvent>,
}

impl TurnStream {
    pub(crate) fn channel() -> (mpsc::Sender<TurnEvent>, Self) {
        let (tx, events) = mpsc::channel(TURN_BUFFER);
        (tx, Self { events })
    }

    pub async fn next_event(&mut self) -> Option<TurnEvent> {
        self.events.next().await
    }

    /// Only the text, as a body for a chunked HTTP response.
    pub fn into_fragments(self) -> impl Stream<Item = Result<String, AppError>> + Send + 'static {
        self.events.filter_map(|event| async move {
            match event {
                TurnEvent::Fragment(text) => Some(Ok(text)),
                TurnEvent::Finished(_) => None,
                TurnEvent::Failed(err) => Some(Err(err)),
            }
        })
    }
}
