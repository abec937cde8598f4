use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use tower_sessions::Session;
use uuid::Uuid;

use super::session::{
    AppState, SESSION_KEY_ACCESS_TOKEN, SESSION_KEY_REFRESH_TOKEN, SESSION_KEY_SYSTEM_ROLE,
    SESSION_KEY_USER_EMAIL, SESSION_KEY_USER_ID, SESSION_KEY_USER_NAME,
};
use crate::backend::auth::is_token_expired;
use crate::backend::BackendError;
use crate::error::AppError;
use crate::models::user::SystemRole;

/// Authentication error responses
#[derive(Debug)]
pub enum AuthError {
    Unauthorized,
    Forbidden,
    SessionError,
    RefreshFailed,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let error_debug = format!("{:?}", self);

        let (status, message) = match self {
            AuthError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Autenticação necessária. Faça login.",
            ),
            AuthError::Forbidden => (
                StatusCode::FORBIDDEN,
                "Apenas administradores podem acessar este recurso.",
            ),
            AuthError::SessionError => (StatusCode::INTERNAL_SERVER_ERROR, "Erro de sessão."),
            AuthError::RefreshFailed => (
                StatusCode::BAD_GATEWAY,
                "Não foi possível renovar a sessão. Tente novamente.",
            ),
        };

        (status, Json(json!({ "error": error_debug, "message": message }))).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Unauthorized => AppError::Unauthorized,
            AuthError::Forbidden => {
                AppError::Forbidden("Apenas administradores podem acessar este recurso.".to_string())
            }
            AuthError::SessionError => AppError::Internal(anyhow::anyhow!("Session error")),
            AuthError::RefreshFailed => AppError::Internal(anyhow::anyhow!("Session refresh failed")),
        }
    }
}

/// Middleware that requires a live session. An expired access token is traded
/// for a new one with the stored refresh token; the session is dropped only when
/// that exchange is refused.
pub async fn require_auth(
    State(state): State<AppState>,
    session: Session,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token: Option<String> = session
        .get(SESSION_KEY_ACCESS_TOKEN)
        .await
        .map_err(|_| AuthError::SessionError)?;

    let Some(token) = token else {
        return Err(AuthError::Unauthorized);
    };

    if is_token_expired(&token, Utc::now()) {
        refresh_or_flush(&state, &session).await?;
    }

    Ok(next.run(request).await)
}

async fn refresh_or_flush(state: &AppState, session: &Session) -> Result<(), AuthError> {
    let refresh_token: Option<String> = session
        .get(SESSION_KEY_REFRESH_TOKEN)
        .await
        .map_err(|_| AuthError::SessionError)?;

    let refreshed = match refresh_token {
        Some(refresh_token) => state.backend.refresh_session(&refresh_token).await,
        None => Err(BackendError::Unauthorized),
    };

    match refreshed {
        Ok(auth) => {
            session
                .insert(SESSION_KEY_ACCESS_TOKEN, &auth.access_token)
                .await
                .map_err(|_| AuthError::SessionError)?;
            if let Some(refresh_token) = &auth.refresh_token {
                session
                    .insert(SESSION_KEY_REFRESH_TOKEN, refresh_token)
                    .await
                    .map_err(|_| AuthError::SessionError)?;
            }
            tracing::debug!(user_id = %auth.user.id, "Access token refreshed");
            Ok(())
        }
        Err(BackendError::Unauthorized) => {
            tracing::info!("Access token expired and cannot be refreshed, clearing session");
            session.flush().await.map_err(|_| AuthError::SessionError)?;
            Err(AuthError::Unauthorized)
        }
        Err(e) => {
            tracing::error!(error = %e, "Token refresh failed");
            Err(AuthError::RefreshFailed)
        }
    }
}

/// The signed-in user as recorded in the session at login
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: SystemRole,
    pub access_token: String,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == SystemRole::Admin
    }
}

/// Extracts the authenticated user from the session
pub async fn get_authenticated_user(session: &Session) -> Result<AuthenticatedUser, AuthError> {
    async fn field<T: serde::de::DeserializeOwned>(
        session: &Session,
        key: &str,
    ) -> Result<Option<T>, AuthError> {
        session.get(key).await.map_err(|_| AuthError::SessionError)
    }

    let access_token: String = field(session, SESSION_KEY_ACCESS_TOKEN)
        .await?
        .ok_or(AuthError::Unauthorized)?;
    let user_id: Uuid = field(session, SESSION_KEY_USER_ID)
        .await?
        .ok_or(AuthError::Unauthorized)?;

    Ok(AuthenticatedUser {
        user_id,
        email: field(session, SESSION_KEY_USER_EMAIL).await?.unwrap_or_default(),
        name: field(session, SESSION_KEY_USER_NAME).await?.unwrap_or_default(),
        role: field(session, SESSION_KEY_SYSTEM_ROLE).await?.unwrap_or_default(),
        access_token,
    })
}

/// Like `get_authenticated_user`, but only admins get through
pub async fn require_admin(session: &Session) -> Result<AuthenticatedUser, AuthError> {
    let user = get_authenticated_user(session).await?;
    if !user.is_admin() {
        tracing::warn!(user_id = %user.user_id, "Non-admin tried an admin action");
        return Err(AuthError::Forbidden);
    }
    Ok(user)
}
