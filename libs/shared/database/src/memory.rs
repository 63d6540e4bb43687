//! Process-local storage adapter used for development and tests.
//!
//! All tables live behind one lock, so every trait method is a single
//! atomic unit of work, matching what one PostgREST request gives us.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

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
use shared_models::schedule::{NewSchedule, Schedule, ScheduleChanges};
use shared_models::user::{NewUser, User, UserChanges};
use shared_models::Page;

use crate::repositories::*;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    doctors: HashMap<Uuid, Doctor>,
    specializations: HashMap<Uuid, Specialization>,
    schedules: HashMap<Uuid, Schedule>,
    appointments: HashMap<Uuid, Appointment>,
    medical_records: HashMap<Uuid, MedicalRecord>,
    consultations: HashMap<Uuid, AiConsultation>,
    messages: Vec<ChatMessage>,
}

impl Tables {
    fn details(&self, doctor: &Doctor) -> DoctorDetails {
        let owner = self.users.get(&doctor.user_id);
        DoctorDetails {
            doctor: doctor.clone(),
            full_name: owner.map(|u| u.full_name.clone()).unwrap_or_default(),
            email: owner.map(|u| u.email.clone()).unwrap_or_default(),
            specialization_title: self
                .specializations
                .get(&doctor.specialization_id)
                .map(|s| s.title.clone())
                .unwrap_or_default(),
        }
    }

    fn overlapping(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Vec<Appointment> {
        self.appointments
            .values()
            .filter(|a| a.doctor_id == doctor_id)
            .filter(|a| Some(a.id) != exclude)
            .filter(|a| a.status.occupies_slot())
            .filter(|a| a.overlaps(start, end))
            .cloned()
            .collect()
    }

    fn remove_consultation(&mut self, id: Uuid) {
        self.consultations.remove(&id);
        self.messages.retain(|m| m.consultation_id != id);
        for appointment in self.appointments.values_mut() {
            if appointment.ai_consultation_id == Some(id) {
                appointment.ai_consultation_id = None;
            }
        }
    }

    fn remove_appointment(&mut self, id: Uuid) {
        self.appointments.remove(&id);
        for record in self.medical_records.values_mut() {
            if record.appointment_id == Some(id) {
                record.appointment_id = None;
            }
        }
    }

    fn remove_doctor(&mut self, id: Uuid) -> bool {
        if self.doctors.remove(&id).is_none() {
            return false;
        }
        self.schedules.retain(|_, s| s.doctor_id != id);
        self.medical_records.retain(|_, r| r.doctor_id != id);
        let appointments: Vec<Uuid> = self
            .appointments
            .values()
            .filter(|a| a.doctor_id == id)
            .map(|a| a.id)
            .collect();
        for appointment_id in appointments {
            self.remove_appointment(appointment_id);
        }
        true
    }

    fn remove_user(&mut self, id: Uuid) -> bool {
        if self.users.remove(&id).is_none() {
            return false;
        }
        let doctor = self.doctors.values().find(|d| d.user_id == id).map(|d| d.id);
        if let Some(doctor_id) = doctor {
            self.remove_doctor(doctor_id);
        }
        self.medical_records.retain(|_, r| r.patient_id != id);
        let appointments: Vec<Uuid> = self
            .appointments
            .values()
            .filter(|a| a.patient_id == id)
            .map(|a| a.id)
            .collect();
        for appointment_id in appointments {
            self.remove_appointment(appointment_id);
        }
        let consultations: Vec<Uuid> = self
            .consultations
            .values()
            .filter(|c| c.patient_id == id)
            .map(|c| c.id)
            .collect();
        for consultation_id in consultations {
            self.remove_consultation(consultation_id);
        }
        true
    }
}

fn newest_first<T, F>(mut rows: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
    rows
}

fn missing(entity: &str) -> AppError {
    AppError::NotFound(format!("{} not found", entity))
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh store exposed through every repository trait.
    pub fn repositories() -> Repositories {
        let store = Arc::new(Self::new());
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
impl UserRepository for MemoryStore {
    async fn create(&self, new: NewUser) -> RepoResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == new.email) {
            return Err(AppError::Conflict("User already exists".to_string()));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            password_hash: new.password_hash,
            full_name: new.full_name,
            phone: new.phone,
            is_admin: new.is_admin,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> RepoResult<User> {
        let mut tables = self.tables.write().await;
        if let Some(email) = &changes.email {
            if tables.users.values().any(|u| &u.email == email && u.id != id) {
                return Err(AppError::Conflict("Email already registered".to_string()));
            }
        }
        let user = tables.users.get_mut(&id).ok_or_else(|| missing("User"))?;
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        if let Some(full_name) = changes.full_name {
            user.full_name = full_name;
        }
        if let Some(phone) = changes.phone {
            user.phone = Some(phone);
        }
        if let Some(is_admin) = changes.is_admin {
            user.is_admin = is_admin;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn list(&self, page: Page) -> RepoResult<Vec<User>> {
        let tables = self.tables.read().await;
        let rows = newest_first(tables.users.values().cloned().collect(), |u| u.created_at);
        Ok(page.apply(rows))
    }

    async fn list_patients(&self, page: Page) -> RepoResult<Vec<User>> {
        let tables = self.tables.read().await;
        let rows = tables
            .users
            .values()
            .filter(|u| !tables.doctors.values().any(|d| d.user_id == u.id))
            .cloned()
            .collect();
        Ok(page.apply(newest_first(rows, |u| u.created_at)))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self.tables.write().await.remove_user(id))
    }

    async fn count(&self) -> RepoResult<u64> {
        Ok(self.tables.read().await.users.len() as u64)
    }
}

#[async_trait]
impl DoctorRepository for MemoryStore {
    async fn create(&self, new: NewDoctor) -> RepoResult<Doctor> {
        let mut tables = self.tables.write().await;
        if tables.doctors.values().any(|d| d.user_id == new.user_id) {
            return Err(AppError::Conflict("You already have a doctor profile".to_string()));
        }
        if tables.doctors.values().any(|d| d.license_number == new.license_number) {
            return Err(AppError::Conflict("License number already registered".to_string()));
        }
        let now = Utc::now();
        let doctor = Doctor {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            bio: new.bio,
            rating: new.rating,
            experience_years: new.experience_years,
            license_number: new.license_number,
            status: new.status,
            rejection_reason: None,
            specialization_id: new.specialization_id,
            created_at: now,
            updated_at: now,
        };
        tables.doctors.insert(doctor.id, doctor.clone());
        Ok(doctor)
    }

    async fn get_by_id(&self, id: Uuid) -> RepoResult<Option<Doctor>> {
        Ok(self.tables.read().await.doctors.get(&id).cloned())
    }

    async fn get_by_user_id(&self, user_id: Uuid) -> RepoResult<Option<Doctor>> {
        let tables = self.tables.read().await;
        Ok(tables.doctors.values().find(|d| d.user_id == user_id).cloned())
    }

    async fn get_by_license_number(&self, license_number: &str) -> RepoResult<Option<Doctor>> {
        let tables = self.tables.read().await;
        Ok(tables
            .doctors
            .values()
            .find(|d| d.license_number == license_number)
            .cloned())
    }

    async fn get_details(&self, id: Uuid) -> RepoResult<Option<DoctorDetails>> {
        let tables = self.tables.read().await;
        Ok(tables.doctors.get(&id).map(|d| tables.details(d)))
    }

    async fn list(&self, status: Option<DoctorStatus>, page: Page) -> RepoResult<Vec<DoctorDetails>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&Doctor> = tables
            .doctors
            .values()
            .filter(|d| status.map_or(true, |s| d.status == s))
            .collect();
        rows.sort_by_key(|d| d.created_at);
        Ok(page.apply(rows.into_iter().map(|d| tables.details(d))))
    }

    async fn list_by_specialization(
        &self,
        specialization_id: Uuid,
        status: Option<DoctorStatus>,
    ) -> RepoResult<Vec<DoctorDetails>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&Doctor> = tables
            .doctors
            .values()
            .filter(|d| d.specialization_id == specialization_id)
            .filter(|d| status.map_or(true, |s| d.status == s))
            .collect();
        rows.sort_by_key(|d| d.created_at);
        Ok(rows.into_iter().map(|d| tables.details(d)).collect())
    }

    async fn update(&self, id: Uuid, changes: DoctorChanges) -> RepoResult<Doctor> {
        let mut tables = self.tables.write().await;
        if let Some(license) = &changes.license_number {
            if tables
                .doctors
                .values()
                .any(|d| &d.license_number == license && d.id != id)
            {
                return Err(AppError::Conflict("License number already registered".to_string()));
            }
        }
        let doctor = tables.doctors.get_mut(&id).ok_or_else(|| missing("Doctor"))?;
        if let Some(bio) = changes.bio {
            doctor.bio = bio;
        }
        if let Some(rating) = changes.rating {
            doctor.rating = rating;
        }
        if let Some(years) = changes.experience_years {
            doctor.experience_years = years;
        }
        if let Some(license) = changes.license_number {
            doctor.license_number = license;
        }
        if let Some(specialization_id) = changes.specialization_id {
            doctor.specialization_id = specialization_id;
        }
        doctor.updated_at = Utc::now();
        Ok(doctor.clone())
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: DoctorStatus,
        rejection_reason: Option<String>,
    ) -> RepoResult<Doctor> {
        let mut tables = self.tables.write().await;
        let doctor = tables.doctors.get_mut(&id).ok_or_else(|| missing("Doctor"))?;
        doctor.status = status;
        doctor.rejection_reason = rejection_reason;
        doctor.updated_at = Utc::now();
        Ok(doctor.clone())
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self.tables.write().await.remove_doctor(id))
    }

    async fn count(&self) -> RepoResult<u64> {
        Ok(self.tables.read().await.doctors.len() as u64)
    }
}

#[async_trait]
impl SpecializationRepository for MemoryStore {
    async fn create(&self, new: NewSpecialization) -> RepoResult<Specialization> {
        let mut tables = self.tables.write().await;
        if tables.specializations.values().any(|s| s.title == new.title) {
            return Err(AppError::Conflict(
                "Specialization with this title already exists".to_string(),
            ));
        }
        let specialization = Specialization {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
        };
        tables
            .specializations
            .insert(specialization.id, specialization.clone());
        Ok(specialization)
    }

    async fn get_by_id(&self, id: Uuid) -> RepoResult<Option<Specialization>> {
        Ok(self.tables.read().await.specializations.get(&id).cloned())
    }

    async fn get_by_title(&self, title: &str) -> RepoResult<Option<Specialization>> {
        let tables = self.tables.read().await;
        Ok(tables
            .specializations
            .values()
            .find(|s| s.title == title)
            .cloned())
    }

    async fn list_with_doctor_count(&self) -> RepoResult<Vec<SpecializationWithCount>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<SpecializationWithCount> = tables
            .specializations
            .values()
            .map(|s| SpecializationWithCount {
                specialization: s.clone(),
                doctor_count: tables
                    .doctors
                    .values()
                    .filter(|d| d.specialization_id == s.id && d.status.is_public())
                    .count() as u64,
            })
            .collect();
        rows.sort_by(|a, b| a.specialization.title.cmp(&b.specialization.title));
        Ok(rows)
    }

    async fn update(&self, id: Uuid, changes: SpecializationChanges) -> RepoResult<Specialization> {
        let mut tables = self.tables.write().await;
        if let Some(title) = &changes.title {
            if tables
                .specializations
                .values()
                .any(|s| &s.title == title && s.id != id)
            {
                return Err(AppError::Conflict(
                    "Specialization with this title already exists".to_string(),
                ));
            }
        }
        let specialization = tables
            .specializations
            .get_mut(&id)
            .ok_or_else(|| missing("Specialization"))?;
        if let Some(title) = changes.title {
            specialization.title = title;
        }
        if let Some(description) = changes.description {
            specialization.description = Some(description);
        }
        Ok(specialization.clone())
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.doctors.values().any(|d| d.specialization_id == id) {
            return Err(AppError::Conflict(
                "Specialization still has doctors assigned".to_string(),
            ));
        }
        Ok(tables.specializations.remove(&id).is_some())
    }
}

#[async_trait]
impl ScheduleRepository for MemoryStore {
    async fn create(&self, new: NewSchedule) -> RepoResult<Schedule> {
        let mut tables = self.tables.write().await;
        if tables
            .schedules
            .values()
            .any(|s| s.doctor_id == new.doctor_id && s.day_of_week == new.day_of_week)
        {
            return Err(AppError::Conflict("Schedule already exists for this day".to_string()));
        }
        let schedule = Schedule {
            id: Uuid::new_v4(),
            doctor_id: new.doctor_id,
            day_of_week: new.day_of_week,
            start_time: new.start_time,
            end_time: new.end_time,
            slot_duration_minutes: new.slot_duration_minutes,
            is_active: new.is_active,
        };
        tables.schedules.insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    async fn get_by_id(&self, id: Uuid) -> RepoResult<Option<Schedule>> {
        Ok(self.tables.read().await.schedules.get(&id).cloned())
    }

    async fn get_for_day(&self, doctor_id: Uuid, day_of_week: i16) -> RepoResult<Option<Schedule>> {
        let tables = self.tables.read().await;
        Ok(tables
            .schedules
            .values()
            .find(|s| s.doctor_id == doctor_id && s.day_of_week == day_of_week)
            .cloned())
    }

    async fn list_by_doctor(&self, doctor_id: Uuid) -> RepoResult<Vec<Schedule>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Schedule> = tables
            .schedules
            .values()
            .filter(|s| s.doctor_id == doctor_id)
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.day_of_week);
        Ok(rows)
    }

    async fn update(&self, id: Uuid, changes: ScheduleChanges) -> RepoResult<Schedule> {
        let mut tables = self.tables.write().await;
        let current = tables.schedules.get(&id).cloned().ok_or_else(|| missing("Schedule"))?;
        if let Some(day) = changes.day_of_week {
            if tables
                .schedules
                .values()
                .any(|s| s.doctor_id == current.doctor_id && s.day_of_week == day && s.id != id)
            {
                return Err(AppError::Conflict("Schedule already exists for this day".to_string()));
            }
        }
        let schedule = tables.schedules.get_mut(&id).ok_or_else(|| missing("Schedule"))?;
        if let Some(day) = changes.day_of_week {
            schedule.day_of_week = day;
        }
        if let Some(start) = changes.start_time {
            schedule.start_time = start;
        }
        if let Some(end) = changes.end_time {
            schedule.end_time = end;
        }
        if let Some(minutes) = changes.slot_duration_minutes {
            schedule.slot_duration_minutes = minutes;
        }
        if let Some(active) = changes.is_active {
            schedule.is_active = active;
        }
        Ok(schedule.clone())
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self.tables.write().await.schedules.remove(&id).is_some())
    }
}

#[async_trait]
impl AppointmentRepository for MemoryStore {
    async fn create(&self, new: NewAppointment) -> RepoResult<Appointment> {
        let mut tables = self.tables.write().await;
        if new.status.occupies_slot()
            && !tables
                .overlapping(new.doctor_id, new.date_time, new.end_time(), None)
                .is_empty()
        {
            return Err(AppError::Conflict("This time slot is already booked".to_string()));
        }
        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            date_time: new.date_time,
            duration_minutes: new.duration_minutes,
            status: new.status,
            notes: new.notes,
            patient_id: new.patient_id,
            doctor_id: new.doctor_id,
            ai_consultation_id: new.ai_consultation_id,
            created_at: now,
            updated_at: now,
        };
        tables.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn get_by_id(&self, id: Uuid) -> RepoResult<Option<Appointment>> {
        Ok(self.tables.read().await.appointments.get(&id).cloned())
    }

    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> RepoResult<Vec<Appointment>> {
        let tables = self.tables.read().await;
        let mut rows = tables.overlapping(doctor_id, start, end, exclude);
        rows.sort_by_key(|a| a.date_time);
        Ok(rows)
    }

    async fn list_by_patient(
        &self,
        patient_id: Uuid,
        filter: AppointmentFilter,
        page: Page,
    ) -> RepoResult<Vec<Appointment>> {
        let tables = self.tables.read().await;
        let rows = tables
            .appointments
            .values()
            .filter(|a| a.patient_id == patient_id && filter.matches(a))
            .cloned()
            .collect();
        Ok(page.apply(newest_first(rows, |a| a.date_time)))
    }

    async fn list_by_doctor(
        &self,
        doctor_id: Uuid,
        filter: AppointmentFilter,
        page: Page,
    ) -> RepoResult<Vec<Appointment>> {
        let tables = self.tables.read().await;
        let rows = tables
            .appointments
            .values()
            .filter(|a| a.doctor_id == doctor_id && filter.matches(a))
            .cloned()
            .collect();
        Ok(page.apply(newest_first(rows, |a| a.date_time)))
    }

    async fn update(&self, id: Uuid, changes: AppointmentChanges) -> RepoResult<Appointment> {
        let mut tables = self.tables.write().await;
        let mut updated = tables
            .appointments
            .get(&id)
            .cloned()
            .ok_or_else(|| missing("Appointment"))?;
        let held_slot = updated.status.occupies_slot();

        let moved = changes.date_time.is_some() || changes.duration_minutes.is_some();
        if let Some(date_time) = changes.date_time {
            updated.date_time = date_time;
        }
        if let Some(minutes) = changes.duration_minutes {
            updated.duration_minutes = minutes;
        }
        if let Some(status) = changes.status {
            updated.status = status;
        }
        if let Some(notes) = changes.notes {
            updated.notes = Some(notes);
        }

        // Moving, or reclaiming a released slot, must not land on a live booking.
        if (moved || !held_slot)
            && updated.status.occupies_slot()
            && !tables
                .overlapping(updated.doctor_id, updated.date_time, updated.end_time(), Some(id))
                .is_empty()
        {
            return Err(AppError::Conflict("This time slot is already booked".to_string()));
        }

        updated.updated_at = Utc::now();
        tables.appointments.insert(id, updated.clone());
        Ok(updated)
    }

    async fn count(&self) -> RepoResult<u64> {
        Ok(self.tables.read().await.appointments.len() as u64)
    }

    async fn count_by_status(&self, status: AppointmentStatus) -> RepoResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables.appointments.values().filter(|a| a.status == status).count() as u64)
    }

    async fn count_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> RepoResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .appointments
            .values()
            .filter(|a| a.date_time >= from && a.date_time < to)
            .count() as u64)
    }
}

#[async_trait]
impl MedicalRecordRepository for MemoryStore {
    async fn create(&self, new: NewMedicalRecord) -> RepoResult<MedicalRecord> {
        let mut tables = self.tables.write().await;
        if let Some(appointment_id) = new.appointment_id {
            if tables
                .medical_records
                .values()
                .any(|r| r.appointment_id == Some(appointment_id))
            {
                return Err(AppError::Conflict(
                    "Medical record already exists for this appointment".to_string(),
                ));
            }
        }
        let now = Utc::now();
        let record = MedicalRecord {
            id: Uuid::new_v4(),
            diagnosis: new.diagnosis,
            prescription: new.prescription,
            notes: new.notes,
            patient_id: new.patient_id,
            doctor_id: new.doctor_id,
            appointment_id: new.appointment_id,
            created_at: now,
            updated_at: now,
        };
        tables.medical_records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_by_id(&self, id: Uuid) -> RepoResult<Option<MedicalRecord>> {
        Ok(self.tables.read().await.medical_records.get(&id).cloned())
    }

    async fn get_by_appointment(&self, appointment_id: Uuid) -> RepoResult<Option<MedicalRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .medical_records
            .values()
            .find(|r| r.appointment_id == Some(appointment_id))
            .cloned())
    }

    async fn list_by_patient(&self, patient_id: Uuid, page: Page) -> RepoResult<Vec<MedicalRecord>> {
        let tables = self.tables.read().await;
        let rows = tables
            .medical_records
            .values()
            .filter(|r| r.patient_id == patient_id)
            .cloned()
            .collect();
        Ok(page.apply(newest_first(rows, |r| r.created_at)))
    }

    async fn list_by_doctor(&self, doctor_id: Uuid, page: Page) -> RepoResult<Vec<MedicalRecord>> {
        let tables = self.tables.read().await;
        let rows = tables
            .medical_records
            .values()
            .filter(|r| r.doctor_id == doctor_id)
            .cloned()
            .collect();
        Ok(page.apply(newest_first(rows, |r| r.created_at)))
    }

    async fn update(&self, id: Uuid, changes: MedicalRecordChanges) -> RepoResult<MedicalRecord> {
        let mut tables = self.tables.write().await;
        let record = tables
            .medical_records
            .get_mut(&id)
            .ok_or_else(|| missing("Medical record"))?;
        if let Some(diagnosis) = changes.diagnosis {
            record.diagnosis = diagnosis;
        }
        if let Some(prescription) = changes.prescription {
            record.prescription = Some(prescription);
        }
        if let Some(notes) = changes.notes {
            record.notes = Some(notes);
        }
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self.tables.write().await.medical_records.remove(&id).is_some())
    }

    async fn count(&self) -> RepoResult<u64> {
        Ok(self.tables.read().await.medical_records.len() as u64)
    }
}

fn next_timestamp(messages: &[ChatMessage], consultation_id: Uuid) -> DateTime<Utc> {
    let now = Utc::now();
    let last = messages
        .iter()
        .filter(|m| m.consultation_id == consultation_id)
        .map(|m| m.created_at)
        .max();
    match last {
        Some(last) if last >= now => last + Duration::microseconds(1),
        _ => now,
    }
}

#[async_trait]
impl ConsultationRepository for MemoryStore {
    async fn start(&self, new: NewConsultation) -> RepoResult<(AiConsultation, ChatMessage)> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let consultation = AiConsultation {
            id: Uuid::new_v4(),
            symptoms_text: new.symptoms_text.clone(),
            recommended_specialization: None,
            confidence: None,
            ai_response_raw: None,
            status: ConsultationStatus::Active,
            created_at: now,
            patient_id: new.patient_id,
        };
        let opening = ChatMessage {
            id: Uuid::new_v4(),
            consultation_id: consultation.id,
            role: ChatRole::User,
            content: new.symptoms_text,
            created_at: now,
        };
        tables.consultations.insert(consultation.id, consultation.clone());
        tables.messages.push(opening.clone());
        Ok((consultation, opening))
    }

    async fn get_by_id(&self, id: Uuid) -> RepoResult<Option<AiConsultation>> {
        Ok(self.tables.read().await.consultations.get(&id).cloned())
    }

    async fn list_by_patient(&self, patient_id: Uuid, page: Page) -> RepoResult<Vec<AiConsultation>> {
        let tables = self.tables.read().await;
        let rows = tables
            .consultations
            .values()
            .filter(|c| c.patient_id == patient_id)
            .cloned()
            .collect();
        Ok(page.apply(newest_first(rows, |c| c.created_at)))
    }

    async fn append_message(
        &self,
        consultation_id: Uuid,
        role: ChatRole,
        content: String,
    ) -> RepoResult<ChatMessage> {
        let mut tables = self.tables.write().await;
        if !tables.consultations.contains_key(&consultation_id) {
            return Err(missing("Consultation"));
        }
        let message = ChatMessage {
            id: Uuid::new_v4(),
            consultation_id,
            role,
            content,
            created_at: next_timestamp(&tables.messages, consultation_id),
        };
        tables.messages.push(message.clone());
        Ok(message)
    }

    async fn messages(&self, consultation_id: Uuid) -> RepoResult<Vec<ChatMessage>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<ChatMessage> = tables
            .messages
            .iter()
            .filter(|m| m.consultation_id == consultation_id)
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.created_at);
        Ok(rows)
    }

    async fn record_outcome(&self, id: Uuid, outcome: ConsultationOutcome) -> RepoResult<AiConsultation> {
        let mut tables = self.tables.write().await;
        let consultation = tables
            .consultations
            .get_mut(&id)
            .ok_or_else(|| missing("Consultation"))?;
        consultation.recommended_specialization = outcome.recommended_specialization;
        consultation.confidence = outcome.confidence;
        consultation.ai_response_raw = outcome.ai_response_raw;
        consultation.status = ConsultationStatus::Completed;
        Ok(consultation.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    fn user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            full_name: "Test User".to_string(),
            phone: None,
            is_admin: false,
        }
    }

    fn booking(doctor_id: Uuid, patient_id: Uuid, hour: u32, minute: u32) -> NewAppointment {
        NewAppointment {
            date_time: Utc.with_ymd_and_hms(2030, 1, 8, hour, minute, 0).unwrap(),
            duration_minutes: 30,
            status: AppointmentStatus::Scheduled,
            notes: None,
            patient_id,
            doctor_id,
            ai_consultation_id: None,
        }
    }

    #[tokio::test]
    async fn overlapping_insert_is_rejected_atomically() {
        let store = MemoryStore::new();
        let doctor_id = Uuid::new_v4();

        AppointmentRepository::create(&store, booking(doctor_id, Uuid::new_v4(), 9, 0))
            .await
            .unwrap();

        let clash = AppointmentRepository::create(&store, booking(doctor_id, Uuid::new_v4(), 9, 15)).await;
        assert_matches!(clash, Err(AppError::Conflict(_)));

        let next = AppointmentRepository::create(&store, booking(doctor_id, Uuid::new_v4(), 9, 30)).await;
        assert!(next.is_ok());
    }

    #[tokio::test]
    async fn cancelled_appointments_free_the_slot() {
        let store = MemoryStore::new();
        let doctor_id = Uuid::new_v4();
        let first = AppointmentRepository::create(&store, booking(doctor_id, Uuid::new_v4(), 9, 0))
            .await
            .unwrap();

        AppointmentRepository::update(
            &store,
            first.id,
            AppointmentChanges {
                status: Some(AppointmentStatus::Cancelled),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(AppointmentRepository::create(&store, booking(doctor_id, Uuid::new_v4(), 9, 0))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn reoccupying_a_released_slot_checks_overlap() {
        let store = MemoryStore::new();
        let doctor_id = Uuid::new_v4();
        let cancel = AppointmentChanges {
            status: Some(AppointmentStatus::Cancelled),
            ..Default::default()
        };
        let confirm = AppointmentChanges {
            status: Some(AppointmentStatus::Confirmed),
            ..Default::default()
        };

        let released = AppointmentRepository::create(&store, booking(doctor_id, Uuid::new_v4(), 9, 0))
            .await
            .unwrap();
        AppointmentRepository::update(&store, released.id, cancel.clone())
            .await
            .unwrap();

        // Nothing else holds 09:00 yet.
        let revived = AppointmentRepository::update(&store, released.id, confirm.clone())
            .await
            .unwrap();
        assert_eq!(revived.status, AppointmentStatus::Confirmed);

        AppointmentRepository::update(&store, released.id, cancel).await.unwrap();
        AppointmentRepository::create(&store, booking(doctor_id, Uuid::new_v4(), 9, 15))
            .await
            .unwrap();

        let clash = AppointmentRepository::update(&store, released.id, confirm).await;
        assert_matches!(clash, Err(AppError::Conflict(_)));
        let still = AppointmentRepository::get_by_id(&store, released.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(still.status, AppointmentStatus::Cancelled);
    }

    #[tokio::test]
    async fn message_timestamps_strictly_increase() {
        let store = MemoryStore::new();
        let (consultation, opening) = store
            .start(NewConsultation {
                patient_id: Uuid::new_v4(),
                symptoms_text: "headache for three days".to_string(),
            })
            .await
            .unwrap();

        let mut previous = opening.created_at;
        for i in 0..20 {
            let message = store
                .append_message(consultation.id, ChatRole::Assistant, format!("turn {}", i))
                .await
                .unwrap();
            assert!(message.created_at > previous);
            previous = message.created_at;
        }

        let transcript = store.messages(consultation.id).await.unwrap();
        assert_eq!(transcript.len(), 21);
        assert_eq!(transcript[0].content, "headache for three days");
    }

    #[tokio::test]
    async fn deleting_a_user_cascades() {
        let store = MemoryStore::new();
        let patient = UserRepository::create(&store, user("patient@example.com")).await.unwrap();
        let (consultation, _) = store
            .start(NewConsultation {
                patient_id: patient.id,
                symptoms_text: "persistent cough".to_string(),
            })
            .await
            .unwrap();
        let appointment = AppointmentRepository::create(&store, booking(Uuid::new_v4(), patient.id, 10, 0))
            .await
            .unwrap();

        assert!(UserRepository::delete(&store, patient.id).await.unwrap());

        assert!(ConsultationRepository::get_by_id(&store, consultation.id).await.unwrap().is_none());
        assert!(store.messages(consultation.id).await.unwrap().is_empty());
        assert!(AppointmentRepository::get_by_id(&store, appointment.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = MemoryStore::new();
        UserRepository::create(&store, user("dup@example.com")).await.unwrap();
        let again = UserRepository::create(&store, user("dup@example.com")).await;
        assert_matches!(again, Err(AppError::Conflict(msg)) if msg == "User already exists");
    }
}
