// Hosted backend client - auth, REST store and serverless functions

pub mod auth;
pub mod functions;
pub mod rest;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, Secret};
use thiserror::Error;

use crate::config::Config;

pub use auth::{AuthEvent, AuthEvents, AuthSession, AuthUser};
pub use rest::Query;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Backend API error: {status} - {message}")]
    ApiError { status: StatusCode, message: String },

    #[error("Access token expired or invalid")]
    Unauthorized,

    #[error("Invalid login credentials: {0}")]
    InvalidCredentials(String),

    #[error("Refusing to {0} without a filter")]
    MissingFilter(&'static str),
}

/// Handle on the hosted backend. Cheap to clone; every request carries the
/// project API key plus the bearer token of whoever is acting.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
    api_key: Secret<String>,
}

impl BackendClient {
    pub fn new(base_url: &str, api_key: Secret<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.supabase_url, config.supabase_anon_key.clone())
    }

    /// Client authenticated with the service-role key, if one is configured.
    pub fn service_role(config: &Config) -> Option<Self> {
        config
            .supabase_service_role_key
            .as_ref()
            .map(|key| Self::new(&config.supabase_url, key.clone()))
    }

    /// The API key doubles as bearer token for calls made without a user session.
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .header("apikey", self.api_key.expose_secret())
            .bearer_auth(token)
    }
}

/// Turns non-2xx responses into `BackendError`, keeping the backend's own message.
async fn check(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::UNAUTHORIZED {
        return Err(BackendError::Unauthorized);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    tracing::error!(status = %status, body = %body, "Backend request failed");

    Err(BackendError::ApiError {
        status,
        message: error_message(&body),
    })
}

/// PostgREST answers `{"message": ..}`, the auth service `{"error_description": ..}`
/// or `{"msg": ..}`; anything else is passed through verbatim.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "error_description", "msg", "error"]
                .iter()
                .find_map(|key| value.get(*key).and_then(|v| v.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| body.to_string())
}
