//! Repository adapters over Supabase's PostgREST API.
//!
//! Every method issues a single HTTP request, which PostgREST runs in one
//! transaction. Multi-row invariants (overlap exclusion, monotonic chat
//! timestamps, consultation + opening message) live in the database schema
//! and its RPC functions, see `migrations/`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::appointment::{
    Appointment, AppointmentChanges, AppointmentFilter, AppointmentStatus, NewAppointment,
};
use shared_models::consultation::{
    AiConsultation, ChatMessage, ChatRole, ConsultationOutcome, ConsultationStatus, NewConsultation,
};
use shared_models::doctor::{
    Doctor, DoctorChanges, DoctorDetails, DoctorStatus, NewDoctor, NewSpecialization,
    Specialization, SpecializationChanges, SpecializationWithCount,
};
use shared_models::error::AppError;
use shared_models::medical_record::{MedicalRecord, MedicalRecordChanges, NewMedicalRecord};
use shared_models::schedule::{NewSchedule, Schedule, ScheduleChanges, MAX_SLOT_MINUTES};
use shared_models::user::{NewUser, User, UserChanges};
use shared_models::Page;

use crate::repositories::*;
use crate::supabase::{DatabaseError, SupabaseClient};

const DOCTOR_DETAILS_SELECT: &str = "select=*,users(full_name,email),specializations(title)";

/// Percent-encodes a filter operand.
fn lit(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'@' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

fn ts(value: DateTime<Utc>) -> String {
    lit(&value.to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn range(page: Page) -> String {
    let page = page.clamped();
    format!("offset={}&limit={}", page.skip, page.limit)
}

fn appointment_filter(filter: &AppointmentFilter) -> String {
    let mut query = String::new();
    if let Some(status) = filter.status {
        query.push_str(&format!("&status=eq.{}", status));
    }
    if let Some(from) = filter.date_from {
        query.push_str(&format!("&date_time=gte.{}", ts(from)));
    }
    if let Some(to) = filter.date_to {
        query.push_str(&format!("&date_time=lte.{}", ts(to)));
    }
    query
}

fn conflict_as(err: DatabaseError, message: &str) -> AppError {
    if err.is_conflict() {
        warn!("Storage rejected write: {}", err);
        AppError::Conflict(message.to_string())
    } else {
        err.into()
    }
}

fn to_body<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, AppError> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(e.to_string()))
}

#[derive(Deserialize)]
struct OwnerRow {
    full_name: String,
    email: String,
}

#[derive(Deserialize)]
struct TitleRow {
    title: String,
}

#[derive(Deserialize)]
struct DoctorRow {
    #[serde(flatten)]
    doctor: Doctor,
    users: Option<OwnerRow>,
    specializations: Option<TitleRow>,
}

impl From<DoctorRow> for DoctorDetails {
    fn from(row: DoctorRow) -> Self {
        let (full_name, email) = row
            .users
            .map(|u| (u.full_name, u.email))
            .unwrap_or_default();
        DoctorDetails {
            doctor: row.doctor,
            full_name,
            email,
            specialization_title: row.specializations.map(|s| s.title).unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct CountRow {
    count: u64,
}

#[derive(Deserialize)]
struct SpecializationRow {
    #[serde(flatten)]
    specialization: Specialization,
    #[serde(default)]
    doctors: Vec<CountRow>,
}

#[derive(Deserialize)]
struct StartedConsultation {
    consultation: AiConsultation,
    message: ChatMessage,
}

pub struct PostgrestStore {
    client: SupabaseClient,
}

impl PostgrestStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: SupabaseClient::new(config),
        }
    }

    pub fn repositories(config: &AppConfig) -> Repositories {
        let store = Arc::new(Self::new(config));
        Repositories {
            users: store.clone(),
            doctors: store.clone(),
            specializations: store.clone(),
            schedules: store.clone(),
            appointments: store.clone(),
            medical_records: store.clone(),
            consultations: store,
        }
    }
}

#[async_trait]
impl UserRepository for PostgrestStore {
    async fn create(&self, user: NewUser) -> RepoResult<User> {
        self.client
            .insert("users", to_body(&user)?)
            .await
            .map_err(|e| conflict_as(e, "User already exists"))
    }

    async fn get_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.client.select_one("users", &format!("id=eq.{}", id)).await?)
    }

    async fn get_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        Ok(self
            .client
            .select_one("users", &format!("email=eq.{}", lit(email)))
            .await?)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> RepoResult<User> {
        let mut body = to_body(&changes)?;
        body["updated_at"] = json!(Utc::now());
        self.client
            .patch("users", &format!("id=eq.{}", id), body)
            .await
            .map_err(|e| conflict_as(e, "Email already registered"))?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    async fn list(&self, page: Page) -> RepoResult<Vec<User>> {
        Ok(self
            .client
            .select("users", &format!("order=created_at.desc&{}", range(page)))
            .await?)
    }

    async fn list_patients(&self, page: Page) -> RepoResult<Vec<User>> {
        // Anti-join: users whose embedded doctor profile is absent.
        Ok(self
            .client
            .select(
                "users",
                &format!(
                    "select=*,doctors(id)&doctors=is.null&order=created_at.desc&{}",
                    range(page)
                ),
            )
            .await?)
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self.client.delete("users", &format!("id=eq.{}", id)).await?)
    }

    async fn count(&self) -> RepoResult<u64> {
        Ok(self.client.count("users", "").await?)
    }
}

#[async_trait]
impl DoctorRepository for PostgrestStore {
    async fn create(&self, doctor: NewDoctor) -> RepoResult<Doctor> {
        self.client
            .insert("doctors", to_body(&doctor)?)
            .await
            .map_err(|e| conflict_as(e, "License number already registered"))
    }

    async fn get_by_id(&self, id: Uuid) -> RepoResult<Option<Doctor>> {
        Ok(self.client.select_one("doctors", &format!("id=eq.{}", id)).await?)
    }

    async fn get_by_user_id(&self, user_id: Uuid) -> RepoResult<Option<Doctor>> {
        Ok(self
            .client
            .select_one("doctors", &format!("user_id=eq.{}", user_id))
            .await?)
    }

    async fn get_by_license_number(&self, license_number: &str) -> RepoResult<Option<Doctor>> {
        Ok(self
            .client
            .select_one("doctors", &format!("license_number=eq.{}", lit(license_number)))
            .await?)
    }

    async fn get_details(&self, id: Uuid) -> RepoResult<Option<DoctorDetails>> {
        let row: Option<DoctorRow> = self
            .client
            .select_one("doctors", &format!("{}&id=eq.{}", DOCTOR_DETAILS_SELECT, id))
            .await?;
        Ok(row.map(DoctorDetails::from))
    }

    async fn list(&self, status: Option<DoctorStatus>, page: Page) -> RepoResult<Vec<DoctorDetails>> {
        let mut query = format!("{}&order=created_at.asc&{}", DOCTOR_DETAILS_SELECT, range(page));
        if let Some(status) = status {
            query.push_str(&format!("&status=eq.{}", status));
        }
        let rows: Vec<DoctorRow> = self.client.select("doctors", &query).await?;
        Ok(rows.into_iter().map(DoctorDetails::from).collect())
    }

    async fn list_by_specialization(
        &self,
        specialization_id: Uuid,
        status: Option<DoctorStatus>,
    ) -> RepoResult<Vec<DoctorDetails>> {
        let mut query = format!(
            "{}&specialization_id=eq.{}&order=created_at.asc",
            DOCTOR_DETAILS_SELECT, specialization_id
        );
        if let Some(status) = status {
            query.push_str(&format!("&status=eq.{}", status));
        }
        let rows: Vec<DoctorRow> = self.client.select("doctors", &query).await?;
        Ok(rows.into_iter().map(DoctorDetails::from).collect())
    }

    async fn update(&self, id: Uuid, changes: DoctorChanges) -> RepoResult<Doctor> {
        let mut body = to_body(&changes)?;
        body["updated_at"] = json!(Utc::now());
        self.client
            .patch("doctors", &format!("id=eq.{}", id), body)
            .await
            .map_err(|e| conflict_as(e, "License number already registered"))?
            .ok_or_else(|| AppError::NotFound("Doctor not found".to_string()))
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: DoctorStatus,
        rejection_reason: Option<String>,
    ) -> RepoResult<Doctor> {
        let body = json!({
            "status": status,
            "rejection_reason": rejection_reason,
            "updated_at": Utc::now(),
        });
        self.client
            .patch("doctors", &format!("id=eq.{}", id), body)
            .await?
            .ok_or_else(|| AppError::NotFound("Doctor not found".to_string()))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self.client.delete("doctors", &format!("id=eq.{}", id)).await?)
    }

    async fn count(&self) -> RepoResult<u64> {
        Ok(self.client.count("doctors", "").await?)
    }
}

#[async_trait]
impl SpecializationRepository for PostgrestStore {
    async fn create(&self, specialization: NewSpecialization) -> RepoResult<Specialization> {
        self.client
            .insert("specializations", to_body(&specialization)?)
            .await
            .map_err(|e| conflict_as(e, "Specialization with this title already exists"))
    }

    async fn get_by_id(&self, id: Uuid) -> RepoResult<Option<Specialization>> {
        Ok(self
            .client
            .select_one("specializations", &format!("id=eq.{}", id))
            .await?)
    }

    async fn get_by_title(&self, title: &str) -> RepoResult<Option<Specialization>> {
        Ok(self
            .client
            .select_one("specializations", &format!("title=eq.{}", lit(title)))
            .await?)
    }

    async fn list_with_doctor_count(&self) -> RepoResult<Vec<SpecializationWithCount>> {
        let rows: Vec<SpecializationRow> = self
            .client
            .select(
                "specializations",
                "select=*,doctors(count)&doctors.status=eq.approved&order=title.asc",
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| SpecializationWithCount {
                specialization: row.specialization,
                doctor_count: row.doctors.first().map_or(0, |c| c.count),
            })
            .collect())
    }

    async fn update(&self, id: Uuid, changes: SpecializationChanges) -> RepoResult<Specialization> {
        self.client
            .patch("specializations", &format!("id=eq.{}", id), to_body(&changes)?)
            .await
            .map_err(|e| conflict_as(e, "Specialization with this title already exists"))?
            .ok_or_else(|| AppError::NotFound("Specialization not found".to_string()))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        self.client
            .delete("specializations", &format!("id=eq.{}", id))
            .await
            .map_err(|e| conflict_as(e, "Specialization still has doctors assigned"))
    }
}

#[async_trait]
impl ScheduleRepository for PostgrestStore {
    async fn create(&self, schedule: NewSchedule) -> RepoResult<Schedule> {
        self.client
            .insert("schedules", to_body(&schedule)?)
            .await
            .map_err(|e| conflict_as(e, "Schedule already exists for this day"))
    }

    async fn get_by_id(&self, id: Uuid) -> RepoResult<Option<Schedule>> {
        Ok(self.client.select_one("schedules", &format!("id=eq.{}", id)).await?)
    }

    async fn get_for_day(&self, doctor_id: Uuid, day_of_week: i16) -> RepoResult<Option<Schedule>> {
        Ok(self
            .client
            .select_one(
                "schedules",
                &format!("doctor_id=eq.{}&day_of_week=eq.{}", doctor_id, day_of_week),
            )
            .await?)
    }

    async fn list_by_doctor(&self, doctor_id: Uuid) -> RepoResult<Vec<Schedule>> {
        Ok(self
            .client
            .select(
                "schedules",
                &format!("doctor_id=eq.{}&order=day_of_week.asc", doctor_id),
            )
            .await?)
    }

    async fn update(&self, id: Uuid, changes: ScheduleChanges) -> RepoResult<Schedule> {
        self.client
            .patch("schedules", &format!("id=eq.{}", id), to_body(&changes)?)
            .await
            .map_err(|e| conflict_as(e, "Schedule already exists for this day"))?
            .ok_or_else(|| AppError::NotFound("Schedule not found".to_string()))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self.client.delete("schedules", &format!("id=eq.{}", id)).await?)
    }
}

#[async_trait]
impl AppointmentRepository for PostgrestStore {
    async fn create(&self, appointment: NewAppointment) -> RepoResult<Appointment> {
        self.client
            .insert("appointments", to_body(&appointment)?)
            .await
            .map_err(|e| conflict_as(e, "This time slot is already booked"))
    }

    async fn get_by_id(&self, id: Uuid) -> RepoResult<Option<Appointment>> {
        Ok(self
            .client
            .select_one("appointments", &format!("id=eq.{}", id))
            .await?)
    }

    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> RepoResult<Vec<Appointment>> {
        // PostgREST cannot filter on date_time + duration, so widen the lower
        // bound by the longest slot and finish the check here.
        let earliest = start - Duration::minutes(i64::from(MAX_SLOT_MINUTES));
        let mut query = format!(
            "doctor_id=eq.{}&status=not.in.(cancelled,no_show)&date_time=gt.{}&date_time=lt.{}&order=date_time.asc",
            doctor_id,
            ts(earliest),
            ts(end)
        );
        if let Some(id) = exclude {
            query.push_str(&format!("&id=neq.{}", id));
        }
        let rows: Vec<Appointment> = self.client.select("appointments", &query).await?;
        debug!("{} candidate appointments for overlap check", rows.len());
        Ok(rows.into_iter().filter(|a| a.overlaps(start, end)).collect())
    }

    async fn list_by_patient(
        &self,
        patient_id: Uuid,
        filter: AppointmentFilter,
        page: Page,
    ) -> RepoResult<Vec<Appointment>> {
        Ok(self
            .client
            .select(
                "appointments",
                &format!(
                    "patient_id=eq.{}{}&order=date_time.desc&{}",
                    patient_id,
                    appointment_filter(&filter),
                    range(page)
                ),
            )
            .await?)
    }

    async fn list_by_doctor(
        &self,
        doctor_id: Uuid,
        filter: AppointmentFilter,
        page: Page,
    ) -> RepoResult<Vec<Appointment>> {
        Ok(self
            .client
            .select(
                "appointments",
                &format!(
                    "doctor_id=eq.{}{}&order=date_time.desc&{}",
                    doctor_id,
                    appointment_filter(&filter),
                    range(page)
                ),
            )
            .await?)
    }

    async fn update(&self, id: Uuid, changes: AppointmentChanges) -> RepoResult<Appointment> {
        let mut body = to_body(&changes)?;
        body["updated_at"] = json!(Utc::now());
        self.client
            .patch("appointments", &format!("id=eq.{}", id), body)
            .await
            .map_err(|e| conflict_as(e, "This time slot is already booked"))?
            .ok_or_else(|| AppError::NotFound("Appointment not found".to_string()))
    }

    async fn count(&self) -> RepoResult<u64> {
        Ok(self.client.count("appointments", "").await?)
    }

    async fn count_by_status(&self, status: AppointmentStatus) -> RepoResult<u64> {
        Ok(self
            .client
            .count("appointments", &format!("status=eq.{}", status))
            .await?)
    }

    async fn count_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> RepoResult<u64> {
        Ok(self
            .client
            .count(
                "appointments",
                &format!("date_time=gte.{}&date_time=lt.{}", ts(from), ts(to)),
            )
            .await?)
    }
}

#[async_trait]
impl MedicalRecordRepository for PostgrestStore {
    async fn create(&self, record: NewMedicalRecord) -> RepoResult<MedicalRecord> {
        self.client
            .insert("medical_records", to_body(&record)?)
            .await
            .map_err(|e| conflict_as(e, "Medical record already exists for this appointment"))
    }

    async fn get_by_id(&self, id: Uuid) -> RepoResult<Option<MedicalRecord>> {
        Ok(self
            .client
            .select_one("medical_records", &format!("id=eq.{}", id))
            .await?)
    }

    async fn get_by_appointment(&self, appointment_id: Uuid) -> RepoResult<Option<MedicalRecord>> {
        Ok(self
            .client
            .select_one("medical_records", &format!("appointment_id=eq.{}", appointment_id))
            .await?)
    }

    async fn list_by_patient(&self, patient_id: Uuid, page: Page) -> RepoResult<Vec<MedicalRecord>> {
        Ok(self
            .client
            .select(
                "medical_records",
                &format!("patient_id=eq.{}&order=created_at.desc&{}", patient_id, range(page)),
            )
            .await?)
    }

    async fn list_by_doctor(&self, doctor_id: Uuid, page: Page) -> RepoResult<Vec<MedicalRecord>> {
        Ok(self
            .client
            .select(
                "medical_records",
                &format!("doctor_id=eq.{}&order=created_at.desc&{}", doctor_id, range(page)),
            )
            .await?)
    }

    async fn update(&self, id: Uuid, changes: MedicalRecordChanges) -> RepoResult<MedicalRecord> {
        let mut body = to_body(&changes)?;
        body["updated_at"] = json!(Utc::now());
        self.client
            .patch("medical_records", &format!("id=eq.{}", id), body)
            .await?
            .ok_or_else(|| AppError::NotFound("Medical record not found".to_string()))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self
            .client
            .delete("medical_records", &format!("id=eq.{}", id))
            .await?)
    }

    async fn count(&self) -> RepoResult<u64> {
        Ok(self.client.count("medical_records", "").await?)
    }
}

#[async_trait]
impl ConsultationRepository for PostgrestStore {
    async fn start(&self, consultation: NewConsultation) -> RepoResult<(AiConsultation, ChatMessage)> {
        let started: StartedConsultation = self
            .client
            .rpc(
                "start_ai_consultation",
                json!({
                    "p_patient_id": consultation.patient_id,
                    "p_symptoms_text": consultation.symptoms_text,
                }),
            )
            .await?;
        Ok((started.consultation, started.message))
    }

    async fn get_by_id(&self, id: Uuid) -> RepoResult<Option<AiConsultation>> {
        Ok(self
            .client
            .select_one("ai_consultations", &format!("id=eq.{}", id))
            .await?)
    }

    async fn list_by_patient(&self, patient_id: Uuid, page: Page) -> RepoResult<Vec<AiConsultation>> {
        Ok(self
            .client
            .select(
                "ai_consultations",
                &format!("patient_id=eq.{}&order=created_at.desc&{}", patient_id, range(page)),
            )
            .await?)
    }

    async fn append_message(
        &self,
        consultation_id: Uuid,
        role: ChatRole,
        content: String,
    ) -> RepoResult<ChatMessage> {
        self.client
            .rpc(
                "append_chat_message",
                json!({
                    "p_consultation_id": consultation_id,
                    "p_role": role,
                    "p_content": content,
                }),
            )
            .await
            .map_err(|e| match e.code() {
                Some("23503") => AppError::NotFound("Consultation not found".to_string()),
                _ => e.into(),
            })
    }

    async fn messages(&self, consultation_id: Uuid) -> RepoResult<Vec<ChatMessage>> {
        Ok(self
            .client
            .select(
                "chat_messages",
                &format!("consultation_id=eq.{}&order=created_at.asc", consultation_id),
            )
            .await?)
    }

    async fn record_outcome(&self, id: Uuid, outcome: ConsultationOutcome) -> RepoResult<AiConsultation> {
        let body = json!({
            "recommended_specialization": outcome.recommended_specialization,
            "confidence": outcome.confidence,
            "ai_response_raw": outcome.ai_response_raw,
            "status": ConsultationStatus::Completed,
        });
        self.client
            .patch("ai_consultations", &format!("id=eq.{}", id), body)
            .await?
            .ok_or_else(|| AppError::NotFound("Consultation not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_operands_are_percent_encoded() {
        assert_eq!(lit("a+b@example.com"), "a%2Bb@example.com");
        assert_eq!(lit("Internal Medicine"), "Internal%20Medicine");
    }
}
