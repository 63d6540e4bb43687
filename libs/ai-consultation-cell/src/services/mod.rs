pub mod consultation;
pub mod turn;

pub use consultation::ConsultationService;
pub use turn::{CompletedTurn, TurnEvent, TurnStream};
