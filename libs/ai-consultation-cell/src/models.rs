use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use shared_models::consultation::{AiConsultation, ChatMessage};
use shared_models::doctor::DoctorDetails;
use shared_models::error::AppError;
use shared_models::Page;
use shared_utils::validation::validate_length;

pub const SYMPTOMS_MIN: usize = 10;
pub const SYMPTOMS_MAX: usize = 5000;
pub const MESSAGE_MAX: usize = 2000;
const LIST_LIMIT_MAX: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartConsultationRequest {
    pub symptoms_text: String,
}

impl StartConsultationRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_length("symptoms_text", &self.symptoms_text, SYMPTOMS_MIN, SYMPTOMS_MAX)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

impl SendMessageRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_length("content", &self.content, 1, MESSAGE_MAX)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ConsultationListQuery {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

impl From<ConsultationListQuery> for Page {
    fn from(query: ConsultationListQuery) -> Self {
        Page::new(query.skip, query.limit.min(LIST_LIMIT_MAX))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationWithMessages {
    pub consultation: AiConsultation,
    pub messages: Vec<ChatMessage>,
}

/// The short doctor card handed back with an analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendedDoctor {
    pub id: Uuid,
    pub full_name: String,
    pub specialization_name: String,
    pub rating: f64,
    pub experience_years: i32,
}

impl From<DoctorDetails> for RecommendedDoctor {
    fn from(details: DoctorDetails) -> Self {
        Self {
            id: details.doctor.id,
            full_name: details.full_name,
            specialization_name: details.specialization_title,
            rating: details.doctor.rating,
            experience_years: details.doctor.experience_years,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationAnalysis {
    pub analysis: Value,
    pub recommended_doctors: Vec<RecommendedDoctor>,
}
