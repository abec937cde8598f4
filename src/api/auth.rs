use axum::{extract::State, routing::{get, post}, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{
    auth::get_authenticated_user,
    session::{
        AppState, SESSION_KEY_ACCESS_TOKEN, SESSION_KEY_REFRESH_TOKEN, SESSION_KEY_SYSTEM_ROLE,
        SESSION_KEY_USER_EMAIL, SESSION_KEY_USER_ID, SESSION_KEY_USER_NAME,
    },
};
use crate::backend::AuthEvent;
use crate::error::{AppError, Result};
use crate::models::user::{AppUser, SystemRole};
use crate::services::account::{change_password, PasswordChange};

pub const ACCESS_DENIED: &str =
    "Acesso Negado: Seu usuário não possui permissão de acesso ou foi removido.";

#[derive(Deserialize)]
struct LoginForm {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: SystemRole,
    pub role_label: &'static str,
}

fn session_error(e: tower_sessions::session::Error) -> AppError {
    AppError::Internal(anyhow::Error::new(e).context("Session store error"))
}

/// Signs in against the auth service; only accounts listed in `usuarios` get a session
async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<LoginForm>,
) -> Result<Json<SessionInfo>> {
    let email = form.email.trim();
    if email.is_empty() || form.password.is_empty() {
        return Err(AppError::Validation(
            "Por favor, preencha email e senha.".to_string(),
        ));
    }

    let auth = state
        .backend
        .sign_in_with_password(email, &form.password)
        .await
        .map_err(AppError::backend("Falha no login"))?;

    let profile = AppUser::find_by_id(&state.backend, &auth.access_token, auth.user.id)
        .await
        .map_err(AppError::backend("Erro ao verificar permissões"))?;

    let Some(profile) = profile else {
        tracing::warn!(user_id = %auth.user.id, "Authenticated user has no access record");
        if let Err(e) = state.backend.sign_out(&auth.access_token).await {
            tracing::error!(error = %e, "Sign out after denied access failed");
        }
        return Err(AppError::Forbidden(ACCESS_DENIED.to_string()));
    };

    let email = auth.user.email.clone().unwrap_or_else(|| email.to_string());
    let info = SessionInfo {
        user_id: profile.id,
        name: profile.display_name().to_string(),
        email: email.clone(),
        role: profile.role,
        role_label: profile.role.label(),
    };

    session.cycle_id().await.map_err(session_error)?;
    session
        .insert(SESSION_KEY_ACCESS_TOKEN, &auth.access_token)
        .await
        .map_err(session_error)?;
    if let Some(refresh_token) = &auth.refresh_token {
        session
            .insert(SESSION_KEY_REFRESH_TOKEN, refresh_token)
            .await
            .map_err(session_error)?;
    }
    session
        .insert(SESSION_KEY_USER_ID, profile.id)
        .await
        .map_err(session_error)?;
    session
        .insert(SESSION_KEY_USER_EMAIL, &info.email)
        .await
        .map_err(session_error)?;
    session
        .insert(SESSION_KEY_USER_NAME, &info.name)
        .await
        .map_err(session_error)?;
    session
        .insert(SESSION_KEY_SYSTEM_ROLE, profile.role)
        .await
        .map_err(session_error)?;

    tracing::info!(user_id = %profile.id, role = ?profile.role, "User signed in");
    state.events.publish(AuthEvent::SignedIn {
        user_id: profile.id,
        email,
    });

    Ok(Json(info))
}

/// Ends the session here and on the auth service
async fn logout(State(state): State<AppState>, session: Session) -> Result<Json<serde_json::Value>> {
    if let Ok(user) = get_authenticated_user(&session).await {
        if let Err(e) = state.backend.sign_out(&user.access_token).await {
            tracing::warn!(error = %e, "Remote sign out failed");
        }
        state.events.publish(AuthEvent::SignedOut {
            user_id: user.user_id,
        });
    }

    session.flush().await.map_err(session_error)?;

    Ok(Json(json!({ "ok": true })))
}

async fn current_session(session: Session) -> Result<Json<SessionInfo>> {
    let user = get_authenticated_user(&session).await?;

    Ok(Json(SessionInfo {
        user_id: user.user_id,
        email: user.email,
        name: user.name,
        role: user.role,
        role_label: user.role.label(),
    }))
}

async fn update_password(
    State(state): State<AppState>,
    session: Session,
    Json(change): Json<PasswordChange>,
) -> Result<Json<serde_json::Value>> {
    let user = get_authenticated_user(&session).await?;

    change_password(&state.backend, &user.access_token, &change).await?;

    Ok(Json(json!({ "message": "Senha alterada com sucesso!" })))
}

/// Routes reachable without a session
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

/// Routes behind `require_auth`
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/auth/session", get(current_session))
        .route("/auth/password", post(update_password))
}
