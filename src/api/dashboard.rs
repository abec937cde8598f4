use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::Datelike;
use serde::Deserialize;
use tower_sessions::Session;

use crate::api::middleware::{auth::get_authenticated_user, session::AppState};
use crate::error::{AppError, Result};
use crate::models::member::Member;
use crate::services::{
    dashboard::{year_stats, DashboardStats},
    dates,
};

#[derive(Debug, Deserialize)]
struct DashboardParams {
    year: Option<i32>,
}

async fn dashboard(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<DashboardParams>,
) -> Result<Json<DashboardStats>> {
    let user = get_authenticated_user(&session).await?;

    let members = Member::list(&state.backend, &user.access_token)
        .await
        .map_err(AppError::backend("Erro ao carregar integrantes."))?;

    let today = dates::today();
    let year = params.year.unwrap_or_else(|| today.year());

    Ok(Json(year_stats(&members, year, today)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}
