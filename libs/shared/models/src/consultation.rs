use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    Active,
    Completed,
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsultationStatus::Active => write!(f, "active"),
            ConsultationStatus::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::System => "system",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiConsultation {
    pub id: Uuid,
    pub symptoms_text: String,
    pub recommended_specialization: Option<String>,
    pub confidence: Option<f64>,
    pub ai_response_raw: Option<String>,
    pub status: ConsultationStatus,
    pub created_at: DateTime<Utc>,
    pub patient_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewConsultation {
    pub patient_id: Uuid,
    pub symptoms_text: String,
}

/// Result recorded on a consultation once a recommendation or analysis lands.
/// Always moves the consultation to `completed`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsultationOutcome {
    pub recommended_specialization: Option<String>,
    pub confidence: Option<f64>,
    pub ai_response_raw: Option<String>,
}
