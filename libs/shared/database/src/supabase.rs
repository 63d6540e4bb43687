use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, Response, StatusCode,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;
use shared_models::error::AppError;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("request to storage failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("storage API error ({status}): {message}")]
    Api {
        status: StatusCode,
        code: Option<String>,
        message: String,
    },

    #[error("unexpected storage payload: {0}")]
    Decode(String),

    #[error("invalid storage configuration: {0}")]
    Config(String),
}

impl DatabaseError {
    /// Unique, exclusion or foreign-key violations surfaced by Postgres.
    pub fn is_conflict(&self) -> bool {
        match self {
            DatabaseError::Api { status, code, .. } => {
                *status == StatusCode::CONFLICT
                    || matches!(code.as_deref(), Some("23505") | Some("23P01") | Some("23503"))
            }
            _ => false,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            DatabaseError::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        match &err {
            e if e.is_conflict() => AppError::Conflict("Resource already exists".to_string()),
            DatabaseError::Api { status, .. } if *status == StatusCode::NOT_FOUND => {
                AppError::NotFound("Resource not found".to_string())
            }
            _ => AppError::Database(err.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct PostgrestErrorBody {
    code: Option<String>,
    message: Option<String>,
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            service_key: config.supabase_service_key.clone(),
        }
    }

    fn get_headers(&self) -> Result<HeaderMap, DatabaseError> {
        let mut headers = HeaderMap::new();

        let key = HeaderValue::from_str(&self.service_key)
            .map_err(|_| DatabaseError::Config("service key is not a valid header value".into()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.service_key))
            .map_err(|_| DatabaseError::Config("service key is not a valid header value".into()))?;

        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(headers)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: &[(&'static str, &'static str)],
    ) -> Result<Response, DatabaseError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers()?;
        for (name, value) in extra_headers {
            headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        }

        let mut req = self.client.request(method, &url).headers(headers);
        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("Storage API error ({}): {}", status, error_text);

            let parsed = serde_json::from_str::<PostgrestErrorBody>(&error_text).ok();
            return Err(DatabaseError::Api {
                status,
                code: parsed.as_ref().and_then(|p| p.code.clone()),
                message: parsed.and_then(|p| p.message).unwrap_or(error_text),
            });
        }

        Ok(response)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let response = self.send(method, path, body, &[]).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| DatabaseError::Decode(e.to_string()))
    }

    /// Same as `request` but asks PostgREST to echo the affected rows.
    pub async fn request_returning<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Vec<T>, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .send(method, path, body, &[("prefer", "return=representation")])
            .await?;
        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| DatabaseError::Decode(e.to_string()))
    }

    pub async fn select<T: DeserializeOwned>(&self, table: &str, query: &str) -> Result<Vec<T>, DatabaseError> {
        self.request(Method::GET, &format!("/rest/v1/{}?{}", table, query), None)
            .await
    }

    pub async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Option<T>, DatabaseError> {
        let rows: Vec<T> = self.select(table, &format!("{}&limit=1", query)).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn insert<T: DeserializeOwned>(&self, table: &str, body: Value) -> Result<T, DatabaseError> {
        let rows: Vec<T> = self
            .request_returning(Method::POST, &format!("/rest/v1/{}", table), Some(body))
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| DatabaseError::Decode(format!("insert into {} returned no rows", table)))
    }

    pub async fn patch<T: DeserializeOwned>(
        &self,
        table: &str,
        filter: &str,
        body: Value,
    ) -> Result<Option<T>, DatabaseError> {
        let rows: Vec<T> = self
            .request_returning(Method::PATCH, &format!("/rest/v1/{}?{}", table, filter), Some(body))
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Returns whether any row was removed.
    pub async fn delete(&self, table: &str, filter: &str) -> Result<bool, DatabaseError> {
        let rows: Vec<Value> = self
            .request_returning(Method::DELETE, &format!("/rest/v1/{}?{}", table, filter), None)
            .await?;
        Ok(!rows.is_empty())
    }

    /// Exact row count via the `Content-Range` header.
    pub async fn count(&self, table: &str, filter: &str) -> Result<u64, DatabaseError> {
        let path = if filter.is_empty() {
            format!("/rest/v1/{}?select=id", table)
        } else {
            format!("/rest/v1/{}?select=id&{}", table, filter)
        };
        let response = self
            .send(
                Method::GET,
                &path,
                None,
                &[("prefer", "count=exact"), ("range-unit", "items"), ("range", "0-0")],
            )
            .await?;

        let range = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| DatabaseError::Decode("missing content-range header".into()))?;

        parse_content_range_total(range)
            .ok_or_else(|| DatabaseError::Decode(format!("malformed content-range: {}", range)))
    }

    pub async fn rpc<T: DeserializeOwned>(&self, function: &str, args: Value) -> Result<T, DatabaseError> {
        self.request(Method::POST, &format!("/rest/v1/rpc/{}", function), Some(args))
            .await
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

fn parse_content_range_total(range: &str) -> Option<u64> {
    range.rsplit('/').next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_range_total_is_parsed() {
        assert_eq!(parse_content_range_total("0-0/42"), Some(42));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-0/*"), None);
    }

    #[test]
    fn postgres_violations_become_conflicts() {
        let err = DatabaseError::Api {
            status: StatusCode::BAD_REQUEST,
            code: Some("23P01".into()),
            message: "conflicting key value violates exclusion constraint".into(),
        };
        assert!(err.is_conflict());
        assert!(matches!(AppError::from(err), AppError::Conflict(_)));
    }
}
