use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use shared_database::SpecializationRepository;
use shared_models::auth::AuthUser;
use shared_models::doctor::{
    NewSpecialization, Specialization, SpecializationChanges, SpecializationWithCount,
};
use shared_models::error::AppError;

use crate::models::{CreateSpecializationRequest, UpdateSpecializationRequest};

pub struct SpecializationService {
    specializations: Arc<dyn SpecializationRepository>,
}

impl SpecializationService {
    pub fn new(specializations: Arc<dyn SpecializationRepository>) -> Self {
        Self { specializations }
    }

    async fn ensure_title_free(&self, title: &str, owner: Option<Uuid>) -> Result<(), AppError> {
        match self.specializations.get_by_title(title).await? {
            Some(existing) if Some(existing.id) != owner => Err(AppError::Conflict(
                "Specialization with this title already exists".to_string(),
            )),
            _ => Ok(()),
        }
    }

    pub async fn create(
        &self,
        caller: &AuthUser,
        request: CreateSpecializationRequest,
    ) -> Result<Specialization, AppError> {
        caller.require_admin()?;
        request.validate()?;
        let title = request.title.trim().to_string();
        self.ensure_title_free(&title, None).await?;

        let specialization = self
            .specializations
            .create(NewSpecialization {
                title,
                description: request.description,
            })
            .await?;
        info!("Specialization {} created", specialization.title);
        Ok(specialization)
    }

    pub async fn update(
        &self,
        caller: &AuthUser,
        specialization_id: Uuid,
        request: UpdateSpecializationRequest,
    ) -> Result<Specialization, AppError> {
        caller.require_admin()?;
        request.validate()?;
        self.get(specialization_id).await?;

        let title = request.title.map(|t| t.trim().to_string());
        if let Some(title) = &title {
            self.ensure_title_free(title, Some(specialization_id)).await?;
        }

        self.specializations
            .update(
                specialization_id,
                SpecializationChanges {
                    title,
                    description: request.description,
                },
            )
            .await
    }

    pub async fn delete(&self, caller: &AuthUser, specialization_id: Uuid) -> Result<(), AppError> {
        caller.require_admin()?;
        if !self.specializations.delete(specialization_id).await? {
            return Err(AppError::NotFound("Specialization not found".to_string()));
        }
        Ok(())
    }

    pub async fn get(&self, specialization_id: Uuid) -> Result<Specialization, AppError> {
        self.specializations
            .get_by_id(specialization_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Specialization not found".to_string()))
    }

    pub async fn list(&self) -> Result<Vec<SpecializationWithCount>, AppError> {
        self.specializations.list_with_doctor_count().await
    }
}
