use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{check, BackendClient, BackendError};

const AUTH_PREFIX: &str = "auth/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub user: AuthUser,
}

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Invalid JWT format: {0}")]
    InvalidJwt(String),
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    exp: i64,
}

impl BackendClient {
    /// Email/password sign-in against the auth service
    #[tracing::instrument(skip(self, password))]
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, BackendError> {
        let response = self
            .request(Method::POST, &format!("{}/token", AUTH_PREFIX), self.api_key())
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let session = match check(response).await {
            Ok(response) => response.json::<AuthSession>().await?,
            Err(BackendError::ApiError { status, message }) if status == StatusCode::BAD_REQUEST => {
                return Err(BackendError::InvalidCredentials(message));
            }
            Err(e) => return Err(e),
        };

        tracing::info!(user_id = %session.user.id, "Signed in");

        Ok(session)
    }

    /// Exchanges a refresh token for a new session. A rejected refresh token
    /// comes back as `Unauthorized`.
    #[tracing::instrument(skip(self, refresh_token))]
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, BackendError> {
        let response = self
            .request(Method::POST, &format!("{}/token", AUTH_PREFIX), self.api_key())
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let session = match check(response).await {
            Ok(response) => response.json::<AuthSession>().await?,
            Err(BackendError::ApiError { status, message }) if status == StatusCode::BAD_REQUEST => {
                tracing::info!(%message, "Refresh token rejected");
                return Err(BackendError::Unauthorized);
            }
            Err(e) => return Err(e),
        };

        tracing::debug!(user_id = %session.user.id, "Session refreshed");

        Ok(session)
    }

    /// Resolves the user behind an access token; `None` once the session is gone
    #[tracing::instrument(skip(self, token))]
    pub async fn get_user(&self, token: &str) -> Result<Option<AuthUser>, BackendError> {
        let response = self
            .request(Method::GET, &format!("{}/user", AUTH_PREFIX), token)
            .send()
            .await?;

        match check(response).await {
            Ok(response) => Ok(Some(response.json().await?)),
            Err(BackendError::Unauthorized) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[tracing::instrument(skip(self, token))]
    pub async fn sign_out(&self, token: &str) -> Result<(), BackendError> {
        let response = self
            .request(Method::POST, &format!("{}/logout", AUTH_PREFIX), token)
            .send()
            .await?;

        match check(response).await {
            // Already signed out on the backend side
            Ok(_) | Err(BackendError::Unauthorized) => Ok(()),
            Err(e) => Err(e),
        }
    }

    #[tracing::instrument(skip(self, token, password))]
    pub async fn update_password(&self, token: &str, password: &str) -> Result<(), BackendError> {
        let response = self
            .request(Method::PUT, &format!("{}/user", AUTH_PREFIX), token)
            .json(&json!({ "password": password }))
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }

    /// Checks that the auth service answers
    pub async fn health(&self) -> Result<(), BackendError> {
        let response = self
            .request(Method::GET, &format!("{}/health", AUTH_PREFIX), self.api_key())
            .timeout(std::time::Duration::from_secs(3))
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }
}

/// Reads the `exp` claim of an access token without verifying its signature.
/// The backend verifies tokens; this only lets us drop dead sessions early.
pub fn token_expiry(jwt: &str) -> Result<DateTime<Utc>, TokenError> {
    let parts: Vec<&str> = jwt.split('.').collect();
    if parts.len() != 3 {
        return Err(TokenError::InvalidJwt(
            "JWT token does not have 3 parts".to_string(),
        ));
    }

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| TokenError::InvalidJwt(format!("Failed to decode base64: {}", e)))?;

    let claims: TokenClaims = serde_json::from_slice(&payload_bytes)
        .map_err(|e| TokenError::InvalidJwt(format!("Failed to parse JSON: {}", e)))?;

    DateTime::from_timestamp(claims.exp, 0)
        .ok_or_else(|| TokenError::InvalidJwt("exp claim out of range".to_string()))
}

/// Unreadable tokens count as expired.
pub fn is_token_expired(jwt: &str, now: DateTime<Utc>) -> bool {
    token_expiry(jwt).map(|exp| exp <= now).unwrap_or(true)
}

/// Session lifecycle notifications
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn { user_id: Uuid, email: String },
    SignedOut { user_id: Uuid },
}

/// Broadcast of session changes; anyone holding a receiver sees every sign-in and sign-out.
#[derive(Debug, Clone)]
pub struct AuthEvents {
    sender: broadcast::Sender<AuthEvent>,
}

impl AuthEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: AuthEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.sender.subscribe()
    }
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use secrecy::Secret;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn jwt_with_exp(exp: i64) -> String {
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"abc","exp":{}}}"#, exp));
        format!("eyJhbGciOiJIUzI1NiJ9.{}.signature", payload)
    }

    #[test]
    fn test_token_expiry() {
        let now = Utc::now();
        let live = jwt_with_exp((now + Duration::hours(1)).timestamp());
        let dead = jwt_with_exp((now - Duration::minutes(1)).timestamp());

        assert!(!is_token_expired(&live, now));
        assert!(is_token_expired(&dead, now));
        assert!(is_token_expired("not-a-jwt", now));
        assert!(token_expiry("a.b").is_err());
    }

    #[tokio::test]
    async fn test_sign_in_with_password() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", "anon"))
            .and(body_json(json!({ "email": "admin@easyaso.com", "password": "segredo123" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "jwt",
                "token_type": "bearer",
                "expires_in": 3600,
                "refresh_token": "refresh",
                "user": { "id": "8d0b4a5e-3f0e-4f53-9a53-0b7c1f1d2e3a", "email": "admin@easyaso.com" }
            })))
            .mount(&server)
            .await;

        let client = BackendClient::new(&server.uri(), Secret::new("anon".to_string()));
        let session = client
            .sign_in_with_password("admin@easyaso.com", "segredo123")
            .await
            .unwrap();

        assert_eq!(session.access_token, "jwt");
        assert_eq!(session.user.email.as_deref(), Some("admin@easyaso.com"));
    }

    #[tokio::test]
    async fn test_sign_in_rejects_bad_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let client = BackendClient::new(&server.uri(), Secret::new("anon".to_string()));
        let err = client
            .sign_in_with_password("admin@easyaso.com", "errada")
            .await
            .unwrap_err();

        match err {
            BackendError::InvalidCredentials(msg) => assert_eq!(msg, "Invalid login credentials"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_refresh_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .and(header("apikey", "anon"))
            .and(body_json(json!({ "refresh_token": "refresh-1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "jwt-2",
                "token_type": "bearer",
                "expires_in": 3600,
                "refresh_token": "refresh-2",
                "user": { "id": "8d0b4a5e-3f0e-4f53-9a53-0b7c1f1d2e3a", "email": "admin@easyaso.com" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .and(body_json(json!({ "refresh_token": "revoked" })))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid Refresh Token: Already Used"
            })))
            .mount(&server)
            .await;

        let client = BackendClient::new(&server.uri(), Secret::new("anon".to_string()));

        let session = client.refresh_session("refresh-1").await.unwrap();
        assert_eq!(session.access_token, "jwt-2");
        assert_eq!(session.refresh_token.as_deref(), Some("refresh-2"));

        let err = client.refresh_session("revoked").await.unwrap_err();
        assert!(matches!(err, BackendError::Unauthorized));
    }

    #[tokio::test]
    async fn test_get_user_without_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = BackendClient::new(&server.uri(), Secret::new("anon".to_string()));
        assert!(client.get_user("expired").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_auth_events_reach_subscribers() {
        let events = AuthEvents::default();
        let mut rx = events.subscribe();
        let user_id = Uuid::new_v4();

        events.publish(AuthEvent::SignedOut { user_id });

        assert_eq!(rx.recv().await.unwrap(), AuthEvent::SignedOut { user_id });
    }
}
