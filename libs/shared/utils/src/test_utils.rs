use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::{AppConfig, StorageBackend};
use shared_database::{MemoryStore, Repositories};
use shared_models::auth::AuthUser;
use shared_models::doctor::{Doctor, DoctorStatus, NewDoctor, NewSpecialization, Specialization};
use shared_models::schedule::{NewSchedule, Schedule};
use shared_models::user::{NewUser, User};

use crate::extractor::AuthState;
use crate::jwt::TokenService;

pub struct TestConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub openai_base_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            access_secret: "test-access-secret-for-jwt-validation-must-be-long-enough".to_string(),
            refresh_secret: "test-refresh-secret-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_service_key: "test-service-key".to_string(),
            openai_base_url: "http://localhost:11434/v1".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            storage_backend: StorageBackend::Memory,
            supabase_url: self.supabase_url.clone(),
            supabase_service_key: self.supabase_service_key.clone(),
            jwt_access_secret: self.access_secret.clone(),
            jwt_refresh_secret: self.refresh_secret.clone(),
            access_token_ttl_minutes: 60,
            refresh_token_ttl_days: 30,
            openai_api_key: "test-openai-key".to_string(),
            openai_model: "gpt-4-turbo-preview".to_string(),
            openai_base_url: self.openai_base_url.clone(),
            server_port: 0,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

/// Hand-signed tokens for exercising the verifier with inputs the
/// `TokenService` would never produce.
pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user_id: Uuid, secret: &str, typ: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user_id.to_string(),
            "typ": typ,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user_id: Uuid, secret: &str) -> String {
        Self::create_test_token(user_id, secret, "access", Some(-1))
    }

    pub fn create_invalid_signature_token(user_id: Uuid) -> String {
        Self::create_test_token(user_id, "wrong-secret", "access", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// First date strictly after today that falls on `weekday`.
pub fn next_weekday(weekday: Weekday) -> NaiveDate {
    let mut date = Utc::now().date_naive() + Duration::days(1);
    while date.weekday() != weekday {
        date += Duration::days(1);
    }
    date
}

pub fn at(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time");
    Utc.from_utc_datetime(&date.and_time(time))
}

pub fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
}

/// An in-memory world with seeding helpers shared by the cell test suites.
pub struct TestWorld {
    pub config: AppConfig,
    pub repos: Repositories,
    pub tokens: Arc<TokenService>,
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorld {
    pub fn new() -> Self {
        let config = TestConfig::default().to_app_config();
        let tokens = Arc::new(TokenService::new(&config));
        Self {
            config,
            repos: MemoryStore::repositories(),
            tokens,
        }
    }

    pub fn auth_state(&self) -> Arc<AuthState> {
        Arc::new(AuthState {
            tokens: self.tokens.clone(),
            users: self.repos.users.clone(),
            doctors: self.repos.doctors.clone(),
        })
    }

    async fn insert_user(&self, email: &str, full_name: &str, is_admin: bool) -> User {
        self.repos
            .users
            .create(NewUser {
                email: email.to_string(),
                password_hash: "not-a-real-hash".to_string(),
                full_name: full_name.to_string(),
                phone: None,
                is_admin,
            })
            .await
            .expect("seed user")
    }

    pub async fn patient(&self, email: &str) -> User {
        self.insert_user(email, "Test Patient", false).await
    }

    pub async fn admin(&self, email: &str) -> User {
        self.insert_user(email, "Test Admin", true).await
    }

    pub async fn specialization(&self, title: &str) -> Specialization {
        self.repos
            .specializations
            .create(NewSpecialization {
                title: title.to_string(),
                description: None,
            })
            .await
            .expect("seed specialization")
    }

    pub async fn doctor_with_status(
        &self,
        email: &str,
        specialization_id: Uuid,
        status: DoctorStatus,
    ) -> (User, Doctor) {
        let user = self.insert_user(email, "Dr. Test", false).await;
        let doctor = self
            .repos
            .doctors
            .create(NewDoctor {
                user_id: user.id,
                bio: "Experienced physician".to_string(),
                rating: 4.5,
                experience_years: 10,
                license_number: format!("LIC-{}", &Uuid::new_v4().simple().to_string()[..8]),
                status,
                specialization_id,
            })
            .await
            .expect("seed doctor");
        (user, doctor)
    }

    pub async fn approved_doctor(&self, email: &str, specialization_id: Uuid) -> (User, Doctor) {
        self.doctor_with_status(email, specialization_id, DoctorStatus::Approved)
            .await
    }

    pub async fn schedule(
        &self,
        doctor_id: Uuid,
        day_of_week: i16,
        start: NaiveTime,
        end: NaiveTime,
        slot_duration_minutes: i32,
    ) -> Schedule {
        self.repos
            .schedules
            .create(NewSchedule {
                doctor_id,
                day_of_week,
                start_time: start,
                end_time: end,
                slot_duration_minutes,
                is_active: true,
            })
            .await
            .expect("seed schedule")
    }

    /// The caller as the auth middleware would resolve it.
    pub async fn caller(&self, user: &User) -> AuthUser {
        let doctor = self
            .repos
            .doctors
            .get_by_user_id(user.id)
            .await
            .expect("doctor lookup");
        let user = self
            .repos
            .users
            .get_by_id(user.id)
            .await
            .expect("user lookup")
            .expect("seeded user");
        AuthUser { user, doctor }
    }

    pub fn bearer(&self, user: &User) -> String {
        let pair = self.tokens.issue_pair(user.id).expect("token pair");
        format!("Bearer {}", pair.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_doctor_resolves_on_caller() {
        let world = TestWorld::new();
        let cardiology = world.specialization("Cardiology").await;
        let (user, doctor) = world.approved_doctor("doc@example.com", cardiology.id).await;

        let caller = world.caller(&user).await;
        assert_eq!(caller.doctor_id(), Some(doctor.id));
        assert!(caller.require_approved_doctor().is_ok());
        assert!(!caller.is_admin());
    }

    #[tokio::test]
    async fn auth_state_accepts_issued_tokens() {
        let world = TestWorld::new();
        let user = world.patient("p@example.com").await;
        let bearer = world.bearer(&user);
        let token = bearer.trim_start_matches("Bearer ");

        let caller = world.auth_state().authenticate(token).await.unwrap();
        assert_eq!(caller.id(), user.id);
        assert!(caller.doctor().is_none());
    }

    #[test]
    fn next_weekday_is_in_the_future() {
        let date = next_weekday(Weekday::Tue);
        assert_eq!(date.weekday(), Weekday::Tue);
        assert!(date > Utc::now().date_naive());
    }
}
