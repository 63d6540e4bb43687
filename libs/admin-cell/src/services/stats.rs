use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, instrument};

use shared_database::{
    AppointmentRepository, DoctorRepository, MedicalRecordRepository, Repositories, UserRepository,
};
use shared_models::appointment::AppointmentStatus;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::models::AdminStats;

pub struct StatsService {
    users: Arc<dyn UserRepository>,
    doctors: Arc<dyn DoctorRepository>,
    appointments: Arc<dyn AppointmentRepository>,
    medical_records: Arc<dyn MedicalRecordRepository>,
}

impl StatsService {
    pub fn new(repos: &Repositories) -> Self {
        Self {
            users: repos.users.clone(),
            doctors: repos.doctors.clone(),
            appointments: repos.appointments.clone(),
            medical_records: repos.medical_records.clone(),
        }
    }

    #[instrument(skip(self, caller), fields(caller = %caller.id()))]
    pub async fn admin_stats(&self, caller: &AuthUser) -> Result<AdminStats, AppError> {
        caller.require_admin()?;
        self.collect(Utc::now()).await
    }

    /// Counts are read independently; they are not a consistent snapshot.
    pub async fn collect(&self, now: DateTime<Utc>) -> Result<AdminStats, AppError> {
        let (day_start, day_end) = utc_day(now);

        let (
            total_users,
            total_doctors,
            total_bookings,
            today_bookings,
            pending_bookings,
            completed_bookings,
            total_emrs,
        ) = tokio::try_join!(
            self.users.count(),
            self.doctors.count(),
            self.appointments.count(),
            self.appointments.count_between(day_start, day_end),
            self.appointments.count_by_status(AppointmentStatus::Scheduled),
            self.appointments.count_by_status(AppointmentStatus::Completed),
            self.medical_records.count(),
        )?;

        debug!(total_users, total_bookings, today_bookings, "Collected admin stats");

        Ok(AdminStats {
            total_users,
            total_doctors,
            total_bookings,
            today_bookings,
            pending_bookings,
            completed_bookings,
            total_emrs,
        })
    }
}

/// `[midnight, next midnight)` of the UTC day containing `now`.
fn utc_day(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_default()
        .and_utc();
    (start, start + Duration::days(1))
}
