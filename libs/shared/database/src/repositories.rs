use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use shared_models::appointment::{
    Appointment, AppointmentChanges, AppointmentFilter, AppointmentStatus, NewAppointment,
};
use shared_models::consultation::{
    AiConsultation, ChatMessage, ChatRole, ConsultationOutcome, NewConsultation,
};
use shared_models::doctor::{
    Doctor, DoctorChanges, DoctorDetails, DoctorStatus, NewDoctor, NewSpecialization,
    Specialization, SpecializationChanges, SpecializationWithCount,
};
use shared_models::error::AppError;
use shared_models::medical_record::{MedicalRecord, MedicalRecordChanges, NewMedicalRecord};
use shared_models::schedule::{NewSchedule, Schedule, ScheduleChanges};
use shared_models::user::{NewUser, User, UserChanges};
use shared_models::Page;

pub type RepoResult<T> = Result<T, AppError>;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: NewUser) -> RepoResult<User>;
    async fn get_by_id(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn get_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn update(&self, id: Uuid, changes: UserChanges) -> RepoResult<User>;
    async fn list(&self, page: Page) -> RepoResult<Vec<User>>;
    /// Users that have no doctor profile.
    async fn list_patients(&self, page: Page) -> RepoResult<Vec<User>>;
    /// Removes the user together with everything it owns.
    async fn delete(&self, id: Uuid) -> RepoResult<bool>;
    async fn count(&self) -> RepoResult<u64>;
}

#[async_trait]
pub trait DoctorRepository: Send + Sync {
    async fn create(&self, doctor: NewDoctor) -> RepoResult<Doctor>;
    async fn get_by_id(&self, id: Uuid) -> RepoResult<Option<Doctor>>;
    async fn get_by_user_id(&self, user_id: Uuid) -> RepoResult<Option<Doctor>>;
    async fn get_by_license_number(&self, license_number: &str) -> RepoResult<Option<Doctor>>;
    async fn get_details(&self, id: Uuid) -> RepoResult<Option<DoctorDetails>>;
    async fn list(&self, status: Option<DoctorStatus>, page: Page) -> RepoResult<Vec<DoctorDetails>>;
    async fn list_by_specialization(
        &self,
        specialization_id: Uuid,
        status: Option<DoctorStatus>,
    ) -> RepoResult<Vec<DoctorDetails>>;
    async fn update(&self, id: Uuid, changes: DoctorChanges) -> RepoResult<Doctor>;
    /// Writes a lifecycle state. `rejection_reason` replaces the stored reason,
    /// `None` clears it.
    async fn set_status(
        &self,
        id: Uuid,
        status: DoctorStatus,
        rejection_reason: Option<String>,
    ) -> RepoResult<Doctor>;
    async fn delete(&self, id: Uuid) -> RepoResult<bool>;
    async fn count(&self) -> RepoResult<u64>;
}

#[async_trait]
pub trait SpecializationRepository: Send + Sync {
    async fn create(&self, specialization: NewSpecialization) -> RepoResult<Specialization>;
    async fn get_by_id(&self, id: Uuid) -> RepoResult<Option<Specialization>>;
    async fn get_by_title(&self, title: &str) -> RepoResult<Option<Specialization>>;
    /// Ordered by title, with the number of approved doctors.
    async fn list_with_doctor_count(&self) -> RepoResult<Vec<SpecializationWithCount>>;
    async fn update(&self, id: Uuid, changes: SpecializationChanges) -> RepoResult<Specialization>;
    async fn delete(&self, id: Uuid) -> RepoResult<bool>;
}

#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn create(&self, schedule: NewSchedule) -> RepoResult<Schedule>;
    async fn get_by_id(&self, id: Uuid) -> RepoResult<Option<Schedule>>;
    async fn get_for_day(&self, doctor_id: Uuid, day_of_week: i16) -> RepoResult<Option<Schedule>>;
    /// Ordered by day of week.
    async fn list_by_doctor(&self, doctor_id: Uuid) -> RepoResult<Vec<Schedule>>;
    async fn update(&self, id: Uuid, changes: ScheduleChanges) -> RepoResult<Schedule>;
    async fn delete(&self, id: Uuid) -> RepoResult<bool>;
}

#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    /// Inserts the appointment. Fails with `Conflict` if an appointment of the
    /// same doctor that still occupies its slot overlaps the new interval; the
    /// check and the insert form one atomic step.
    async fn create(&self, appointment: NewAppointment) -> RepoResult<Appointment>;
    async fn get_by_id(&self, id: Uuid) -> RepoResult<Option<Appointment>>;
    /// Slot-occupying appointments of `doctor_id` intersecting `[start, end)`,
    /// optionally ignoring one appointment.
    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> RepoResult<Vec<Appointment>>;
    /// Newest first.
    async fn list_by_patient(
        &self,
        patient_id: Uuid,
        filter: AppointmentFilter,
        page: Page,
    ) -> RepoResult<Vec<Appointment>>;
    /// Newest first.
    async fn list_by_doctor(
        &self,
        doctor_id: Uuid,
        filter: AppointmentFilter,
        page: Page,
    ) -> RepoResult<Vec<Appointment>>;
    /// Applies the changes. When the time or duration moves, or a released
    /// slot is occupied again, the same atomic overlap guard as `create` applies.
    async fn update(&self, id: Uuid, changes: AppointmentChanges) -> RepoResult<Appointment>;
    async fn count(&self) -> RepoResult<u64>;
    async fn count_by_status(&self, status: AppointmentStatus) -> RepoResult<u64>;
    async fn count_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> RepoResult<u64>;
}

#[async_trait]
pub trait MedicalRecordRepository: Send + Sync {
    async fn create(&self, record: NewMedicalRecord) -> RepoResult<MedicalRecord>;
    async fn get_by_id(&self, id: Uuid) -> RepoResult<Option<MedicalRecord>>;
    async fn get_by_appointment(&self, appointment_id: Uuid) -> RepoResult<Option<MedicalRecord>>;
    /// Newest first.
    async fn list_by_patient(&self, patient_id: Uuid, page: Page) -> RepoResult<Vec<MedicalRecord>>;
    /// Newest first.
    async fn list_by_doctor(&self, doctor_id: Uuid, page: Page) -> RepoResult<Vec<MedicalRecord>>;
    async fn update(&self, id: Uuid, changes: MedicalRecordChanges) -> RepoResult<MedicalRecord>;
    async fn delete(&self, id: Uuid) -> RepoResult<bool>;
    async fn count(&self) -> RepoResult<u64>;
}

#[async_trait]
pub trait ConsultationRepository: Send + Sync {
    /// Creates the consultation and its opening user message in one unit of work.
    async fn start(&self, consultation: NewConsultation) -> RepoResult<(AiConsultation, ChatMessage)>;
    async fn get_by_id(&self, id: Uuid) -> RepoResult<Option<AiConsultation>>;
    /// Newest first.
    async fn list_by_patient(&self, patient_id: Uuid, page: Page) -> RepoResult<Vec<AiConsultation>>;
    /// Appends to the transcript. `created_at` is strictly greater than that of
    /// every earlier message of the consultation.
    async fn append_message(
        &self,
        consultation_id: Uuid,
        role: ChatRole,
        content: String,
    ) -> RepoResult<ChatMessage>;
    /// Ordered by `created_at` ascending.
    async fn messages(&self, consultation_id: Uuid) -> RepoResult<Vec<ChatMessage>>;
    async fn record_outcome(&self, id: Uuid, outcome: ConsultationOutcome) -> RepoResult<AiConsultation>;
}

/// Every repository the services need, behind trait objects so the
/// composition root can pick the adapter.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub doctors: Arc<dyn DoctorRepository>,
    pub specializations: Arc<dyn SpecializationRepository>,
    pub schedules: Arc<dyn ScheduleRepository>,
    pub appointments: Arc<dyn AppointmentRepository>,
    pub medical_records: Arc<dyn MedicalRecordRepository>,
    pub consultations: Arc<dyn ConsultationRepository>,
}
