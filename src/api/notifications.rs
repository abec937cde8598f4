use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use tower_sessions::Session;

use crate::api::middleware::{auth::get_authenticated_user, session::AppState};
use crate::error::{AppError, Result};
use crate::models::audit_log::AuditLogEntry;
use crate::services::audit::Notification;

pub const FEED_LIMIT: usize = 50;

/// Latest audit entries, newest first
async fn list_notifications(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<Notification>>> {
    let user = get_authenticated_user(&session).await?;

    let entries = AuditLogEntry::recent(&state.backend, &user.access_token, FEED_LIMIT)
        .await
        .map_err(AppError::backend("Erro ao carregar notificações."))?;

    let now = Utc::now();
    Ok(Json(
        entries
            .iter()
            .map(|entry| Notification::from_entry(entry, now))
            .collect(),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/notifications", get(list_notifications))
}
