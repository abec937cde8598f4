use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_sessions::Session;

use crate::api::middleware::{auth::require_admin, session::AppState};
use crate::error::{AppError, Result};
use crate::models::user::AppUser;
use crate::services::account::{invite_user, Invite};

/// Everyone with access to the dashboard; admins only
async fn list_users(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<AppUser>>> {
    let admin = require_admin(&session).await?;

    let users = AppUser::list(&state.backend, &admin.access_token)
        .await
        .map_err(AppError::backend("Erro ao carregar usuários."))?;

    Ok(Json(users))
}

async fn invite(
    State(state): State<AppState>,
    session: Session,
    Json(invite): Json<Invite>,
) -> Result<Json<serde_json::Value>> {
    let admin = require_admin(&session).await?;

    let response = invite_user(&state.backend, &admin.access_token, &invite).await?;

    Ok(Json(json!({
        "message": "Convite enviado com sucesso!",
        "result": response,
    })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/invite", post(invite))
}
