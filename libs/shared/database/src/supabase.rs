use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

use shared_config::AppConfig;

/// Postgres SQLSTATE raised when a unique index rejects a write.
const UNIQUE_VIOLATION: &str = "23505";
/// Postgres SQLSTATE raised when a referenced row does not exist.
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),
}

/// Error body returned by PostgREST.
#[derive(Debug, Deserialize)]
struct PostgrestError {
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
            .map_err(|e| DatabaseError::InvalidHeader(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.service_key))
            .map_err(|e| DatabaseError::InvalidHeader(e.to_string()))?;

        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(headers)
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
        self.request_with_headers(method, path, body, None).await
    }

    /// Same as [`request`](Self::request) but with extra headers such as
    /// `Prefer: return=representation`.
    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers()?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(Self::classify_error(status, error_text));
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Prefer header asking PostgREST to echo back the affected rows.
    pub fn return_representation() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    fn classify_error(status: StatusCode, error_text: String) -> DatabaseError {
        let parsed: Option<PostgrestError> = serde_json::from_str(&error_text).ok();
        let code = parsed.as_ref().and_then(|e| e.code.clone());

        match code.as_deref() {
            Some(UNIQUE_VIOLATION) => {
                let message = parsed.and_then(|e| e.message).unwrap_or(error_text);
                debug!("Write rejected by unique index: {}", message);
                return DatabaseError::UniqueViolation(message);
            }
            Some(FOREIGN_KEY_VIOLATION) => {
                let message = parsed.and_then(|e| e.message).unwrap_or(error_text);
                warn!("Write references a missing row: {}", message);
                return DatabaseError::ForeignKeyViolation(message);
            }
            _ => {}
        }

        error!("API error ({}): {}", status, error_text);

        match status.as_u16() {
            401 | 403 => DatabaseError::Auth(error_text),
            404 => DatabaseError::NotFound(error_text),
            code => DatabaseError::Api {
                status: code,
                message: error_text,
            },
        }
    }
}
