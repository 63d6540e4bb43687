use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::AppointmentRepository;
use shared_models::error::AppError;

use crate::models::AppointmentError;

/// Pre-flight overlap check against the doctor's calendar. The repository
/// repeats the check atomically on write, so this only gives an early answer.
pub struct ConflictDetectionService {
    appointments: Arc<dyn AppointmentRepository>,
}

impl ConflictDetectionService {
    pub fn new(appointments: Arc<dyn AppointmentRepository>) -> Self {
        Self { appointments }
    }

    pub async fn ensure_free(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        duration_minutes: i32,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<(), AppError> {
        let end = start + Duration::minutes(i64::from(duration_minutes));
        debug!("Checking conflicts for doctor {} from {} to {}", doctor_id, start, end);

        let clashes = self
            .appointments
            .find_overlapping(doctor_id, start, end, exclude_appointment_id)
            .await?;

        if clashes.is_empty() {
            return Ok(());
        }

        warn!(
            "Conflict detected for doctor {} at {} - {} overlapping appointments",
            doctor_id,
            start,
            clashes.len()
        );
        Err(AppointmentError::SlotTaken.into())
    }
}
