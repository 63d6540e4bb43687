use std::env;
use std::str::FromStr;

use tracing::warn;

/// Which persistence adapter the composition root wires in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Supabase,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supabase" | "postgrest" => Ok(Self::Supabase),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => Err(format!("Unknown storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage_backend: StorageBackend,
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub jwt_access_secret: String,
    pub jwt_refresh_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,
    pub server_port: u16,
}

fn required(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", name);
        String::new()
    })
}

fn with_default<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value, using default", name);
            default
        }),
        Err(_) => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let storage_backend = env::var("STORAGE_BACKEND")
            .ok()
            .and_then(|raw| {
                raw.parse()
                    .map_err(|e: String| warn!("{}, falling back to supabase", e))
                    .ok()
            })
            .unwrap_or(StorageBackend::Supabase);

        let config = Self {
            storage_backend,
            supabase_url: required("SUPABASE_URL"),
            supabase_service_key: required("SUPABASE_SERVICE_ROLE_KEY"),
            jwt_access_secret: required("JWT_ACCESS_TOKEN_SECRET_KEY"),
            jwt_refresh_secret: required("JWT_REFRESH_TOKEN_SECRET_KEY"),
            access_token_ttl_minutes: with_default("ACCESS_TOKEN_TTL_MINUTES", 60),
            refresh_token_ttl_days: with_default("REFRESH_TOKEN_TTL_DAYS", 30),
            openai_api_key: required("OPENAI_API_KEY"),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| {
                warn!("OPENAI_MODEL not set, using default");
                "gpt-4-turbo-preview".to_string()
            }),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            server_port: with_default("SERVER_PORT", 3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        let storage_ready = match self.storage_backend {
            StorageBackend::Memory => true,
            StorageBackend::Supabase => {
                !self.supabase_url.is_empty() && !self.supabase_service_key.is_empty()
            }
        };

        storage_ready
            && !self.jwt_access_secret.is_empty()
            && !self.jwt_refresh_secret.is_empty()
    }

    pub fn is_ai_configured(&self) -> bool {
        !self.openai_api_key.is_empty() && !self.openai_base_url.is_empty()
    }
}
