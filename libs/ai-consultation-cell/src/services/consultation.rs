use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{ConsultationRepository, DoctorRepository, Repositories, SpecializationRepository};
use shared_models::auth::AuthUser;
use shared_models::consultation::{AiConsultation, ChatMessage, ChatRole, ConsultationOutcome, NewConsultation};
use shared_models::doctor::DoctorStatus;
use shared_models::error::AppError;
use shared_models::{Page, MAX_PAGE_LIMIT};

use crate::llm::{ChatCompletion, ChatRequest, ChatTurn};
use crate::models::{
    ConsultationAnalysis, ConsultationWithMessages, RecommendedDoctor, SendMessageRequest,
    StartConsultationRequest,
};
use crate::prompts;
use crate::recommendation;
use crate::services::turn::{CompletedTurn, TurnEvent, TurnStream};

const RECOMMENDED_DOCTORS: usize = 5;

/// The AI consultation conversation: transcript persistence, model calls and
/// recommendation bookkeeping.
#[derive(Clone)]
pub struct ConsultationService {
    consultations: Arc<dyn ConsultationRepository>,
    doctors: Arc<dyn DoctorRepository>,
    specializations: Arc<dyn SpecializationRepository>,
    llm: Arc<dyn ChatCompletion>,
}

impl ConsultationService {
    pub fn new(repos: &Repositories, llm: Arc<dyn ChatCompletion>) -> Self {
        Self {
            consultations: repos.consultations.clone(),
            doctors: repos.doctors.clone(),
            specializations: repos.specializations.clone(),
            llm,
        }
    }

    /// Loads a consultation the caller owns.
    pub async fn owned(&self, caller: &AuthUser, consultation_id: Uuid) -> Result<AiConsultation, AppError> {
        let consultation = self
            .consultations
            .get_by_id(consultation_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Consultation not found".to_string()))?;

        if consultation.patient_id != caller.id() {
            return Err(AppError::Forbidden("Access denied".to_string()));
        }
        Ok(consultation)
    }

    pub async fn start(
        &self,
        caller: &AuthUser,
        request: StartConsultationRequest,
    ) -> Result<AiConsultation, AppError> {
        request.validate()?;

        let (consultation, _) = self
            .consultations
            .start(NewConsultation {
                patient_id: caller.id(),
                symptoms_text: request.symptoms_text,
            })
            .await?;

        info!("Consultation {} started by {}", consultation.id, caller.id());
        Ok(consultation)
    }

    pub async fn get(&self, caller: &AuthUser, consultation_id: Uuid) -> Result<AiConsultation, AppError> {
        self.owned(caller, consultation_id).await
    }

    pub async fn messages(&self, caller: &AuthUser, consultation_id: Uuid) -> Result<Vec<ChatMessage>, AppError> {
        self.owned(caller, consultation_id).await?;
        self.consultations.messages(consultation_id).await
    }

    pub async fn with_messages(
        &self,
        caller: &AuthUser,
        consultation_id: Uuid,
    ) -> Result<ConsultationWithMessages, AppError> {
        let consultation = self.owned(caller, consultation_id).await?;
        let messages = self.consultations.messages(consultation_id).await?;
        Ok(ConsultationWithMessages {
            consultation,
            messages,
        })
    }

    pub async fn list_mine(&self, caller: &AuthUser, page: Page) -> Result<Vec<AiConsultation>, AppError> {
        self.consultations.list_by_patient(caller.id(), page).await
    }

    /// Appends a patient turn to a consultation the caller owns.
    pub async fn record_user_turn(
        &self,
        caller: &AuthUser,
        consultation_id: Uuid,
        request: SendMessageRequest,
    ) -> Result<ChatMessage, AppError> {
        self.owned(caller, consultation_id).await?;
        request.validate()?;
        debug!("Patient turn for consultation {}", consultation_id);

        self.consultations
            .append_message(consultation_id, ChatRole::User, request.content)
            .await
    }

    /// Transcript plus system prompt, ready for the model.
    async fn chat_request(&self, consultation_id: Uuid) -> Result<ChatRequest, AppError> {
        let transcript = self.consultations.messages(consultation_id).await?;
        let roster = self
            .doctors
            .list(Some(DoctorStatus::Approved), Page::new(0, MAX_PAGE_LIMIT))
            .await?;

        Ok(ChatRequest {
            system_prompt: prompts::system_prompt(&roster),
            turns: transcript.iter().map(ChatTurn::from).collect(),
        })
    }

    /// Persists the assistant turn and applies an embedded recommendation.
    async fn finish_turn(&self, consultation_id: Uuid, content: String) -> Result<CompletedTurn, AppError> {
        let message = self
            .consultations
            .append_message(consultation_id, ChatRole::Assistant, content)
            .await?;

        let recommendation = if recommendation::has_json_block(&message.content) {
            recommendation::extract(&message.content)
        } else {
            None
        };

        if let Some(rec) = &recommendation {
            self.consultations
                .record_outcome(consultation_id, rec.outcome())
                .await?;
            info!(
                "Consultation {} completed with a recommendation for {:?}",
                consultation_id,
                rec.specialization()
            );
        }

        Ok(CompletedTurn {
            message,
            recommendation,
        })
    }

    pub async fn send_message(
        &self,
        caller: &AuthUser,
        consultation_id: Uuid,
        request: SendMessageRequest,
    ) -> Result<ChatMessage, AppError> {
        self.record_user_turn(caller, consultation_id, request).await?;

        let chat = self.chat_request(consultation_id).await?;
        let reply = self.llm.chat(chat).await?;

        Ok(self.finish_turn(consultation_id, reply).await?.message)
    }

    pub async fn send_message_stream(
        &self,
        caller: &AuthUser,
        consultation_id: Uuid,
        request: SendMessageRequest,
    ) -> Result<TurnStream, AppError> {
        self.record_user_turn(caller, consultation_id, request).await?;
        self.stream_reply(consultation_id).await
    }

    /// Streams the assistant's answer to the current transcript.
    ///
    /// Fragments are forwarded as they arrive while being accumulated; the
    /// whole reply is persisted once the model is done. If the consumer goes
    /// away first the producer stops and nothing is written.
    pub async fn stream_reply(&self, consultation_id: Uuid) -> Result<TurnStream, AppError> {
        let chat = self.chat_request(consultation_id).await?;
        let mut fragments = self.llm.chat_stream(chat).await?;

        let (mut tx, stream) = TurnStream::channel();
        let service = self.clone();

        tokio::spawn(async move {
            let mut reply = String::new();

            while let Some(fragment) = fragments.next().await {
                match fragment {
                    Ok(text) => {
                        reply.push_str(&text);
                        if tx.send(TurnEvent::Fragment(text)).await.is_err() {
                            debug!("Consumer of consultation {} left mid-stream", consultation_id);
                            return;
                        }
                    }
                    Err(e) => {
                        warn!("Chat stream for consultation {} failed: {}", consultation_id, e);
                        let _ = tx.send(TurnEvent::Failed(e.into())).await;
                        return;
                    }
                }
            }

            let event = match service.finish_turn(consultation_id, reply).await {
                Ok(turn) => TurnEvent::Finished(turn),
                Err(e) => TurnEvent::Failed(e),
            };
            let _ = tx.send(event).await;
        });

        Ok(stream)
    }

    pub async fn complete(
        &self,
        caller: &AuthUser,
        consultation_id: Uuid,
    ) -> Result<ConsultationAnalysis, AppError> {
        let consultation = self.owned(caller, consultation_id).await?;
        let transcript = self.consultations.messages(consultation_id).await?;

        let analysis = self
            .llm
            .analyze_symptoms(
                consultation.symptoms_text.clone(),
                transcript.iter().map(ChatTurn::from).collect(),
            )
            .await?;

        let specialization = analysis["recommended_specialization"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let recommended_doctors = match &specialization {
            Some(title) => self.doctors_for(title).await?,
            None => Vec::new(),
        };

        self.consultations
            .record_outcome(
                consultation_id,
                ConsultationOutcome {
                    recommended_specialization: specialization.clone(),
                    confidence: analysis["confidence"].as_f64(),
                    ai_response_raw: Some(analysis.to_string()),
                },
            )
            .await?;

        info!(
            "Consultation {} analysed: {:?}, {} doctors suggested",
            consultation_id,
            specialization,
            recommended_doctors.len()
        );
        Ok(ConsultationAnalysis {
            analysis,
            recommended_doctors,
        })
    }

    async fn doctors_for(&self, title: &str) -> Result<Vec<RecommendedDoctor>, AppError> {
        let Some(specialization) = self.specializations.get_by_title(title).await? else {
            debug!("No specialization titled {:?}", title);
            return Ok(Vec::new());
        };

        let doctors = self
            .doctors
            .list_by_specialization(specialization.id, Some(DoctorStatus::Approved))
            .await?;
        Ok(doctors
            .into_iter()
            .take(RECOMMENDED_DOCTORS)
            .map(RecommendedDoctor::from)
            .collect())
    }
}
