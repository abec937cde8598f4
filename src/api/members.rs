use axum::{
    extract::{Multipart, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{auth::get_authenticated_user, session::AppState};
use crate::error::{AppError, Result};
use crate::models::member::{Member, MemberSummary, MemberUpdate, MemberView, NewMember};
use crate::services::{
    aso_launch::{launch_aso, AsoLaunchRequest},
    audit::{actions, log_action},
    dates::{self, parse_br_date},
    member_import::{import_members, ImportReport},
};

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub search: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberForm {
    #[serde(default)]
    name: String,
    email: Option<String>,
    role: Option<String>,
    unit: Option<String>,
    /// DD/MM/YYYY
    last_aso_date: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_optional_br_date(value: Option<String>) -> Result<Option<chrono::NaiveDate>> {
    Ok(non_empty(value).map(|v| parse_br_date(&v)).transpose()?)
}

/// A field sent blank clears the column; a field left out is not touched
fn cleared_or_set(value: Option<String>) -> Option<Option<String>> {
    value.map(|v| non_empty(Some(v)))
}

impl MemberForm {
    fn into_new_member(self, default_unit: &str) -> Result<NewMember> {
        let email = self.email.as_deref().unwrap_or_default().trim();
        let role = self.role.as_deref().unwrap_or_default().trim();
        let name = self.name.trim();
        if name.is_empty() || email.is_empty() || role.is_empty() {
            return Err(AppError::Validation(
                "Por favor, preencha os campos obrigatórios (Nome, Email, Cargo).".to_string(),
            ));
        }

        Ok(NewMember {
            name: name.to_string(),
            email: Some(email.to_string()),
            role: Some(role.to_string()),
            unit: non_empty(self.unit).unwrap_or_else(|| default_unit.to_string()),
            last_aso_date: parse_optional_br_date(self.last_aso_date)?,
        })
    }

    fn into_update(self) -> Result<MemberUpdate> {
        let name = non_empty(Some(self.name));
        if name.is_none() {
            return Err(AppError::Validation("O nome é obrigatório.".to_string()));
        }

        Ok(MemberUpdate {
            name,
            email: cleared_or_set(self.email),
            role: cleared_or_set(self.role),
            unit: non_empty(self.unit),
            last_aso_date: self
                .last_aso_date
                .map(|v| parse_optional_br_date(Some(v)))
                .transpose()?,
        })
    }
}

async fn list_members(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<MemberView>>> {
    let user = get_authenticated_user(&session).await?;

    let members = Member::list(&state.backend, &user.access_token)
        .await
        .map_err(AppError::backend("Erro ao carregar integrantes."))?;

    let today = dates::today();
    Ok(Json(
        members
            .iter()
            .filter(|m| m.matches(&params.search))
            .map(|m| m.view(today))
            .collect(),
    ))
}

async fn get_member(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<MemberView>> {
    let user = get_authenticated_user(&session).await?;

    let member = Member::find_by_id(&state.backend, &user.access_token, id)
        .await
        .map_err(AppError::backend("Erro ao carregar integrante."))?
        .ok_or_else(|| AppError::NotFound("Integrante não encontrado.".to_string()))?;

    Ok(Json(member.view(dates::today())))
}

async fn create_member(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<MemberForm>,
) -> Result<Json<MemberView>> {
    let user = get_authenticated_user(&session).await?;
    let data = form.into_new_member(&state.config.default_unit)?;

    let member = Member::create(&state.backend, &user.access_token, &data)
        .await
        .map_err(AppError::backend("Erro ao cadastrar integrante."))?;

    tracing::info!(member_id = %member.id, "Member created");
    log_action(
        &state.backend,
        &user.access_token,
        actions::MEMBER_CREATE,
        &member.name,
        None,
    )
    .await;

    Ok(Json(member.view(dates::today())))
}

async fn update_member(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(form): Json<MemberForm>,
) -> Result<Json<MemberView>> {
    let user = get_authenticated_user(&session).await?;
    let update = form.into_update()?;

    let member = Member::update(&state.backend, &user.access_token, id, &update)
        .await
        .map_err(AppError::backend("Erro ao atualizar integrante."))?
        .ok_or_else(|| AppError::NotFound("Integrante não encontrado.".to_string()))?;

    tracing::info!(member_id = %member.id, "Member updated");
    log_action(
        &state.backend,
        &user.access_token,
        actions::MEMBER_UPDATE,
        &member.name,
        None,
    )
    .await;

    Ok(Json(member.view(dates::today())))
}

async fn delete_member(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let user = get_authenticated_user(&session).await?;

    // Looked up first so the log names who was removed
    let name = Member::find_by_id(&state.backend, &user.access_token, id)
        .await
        .map_err(AppError::backend("Erro ao excluir integrante."))?
        .map(|m| m.name)
        .unwrap_or_else(|| id.to_string());

    Member::delete(&state.backend, &user.access_token, id)
        .await
        .map_err(AppError::backend("Erro ao excluir integrante."))?;

    tracing::info!(member_id = %id, "Member deleted");
    log_action(
        &state.backend,
        &user.access_token,
        actions::MEMBER_DELETE,
        &name,
        None,
    )
    .await;

    Ok(Json(json!({ "ok": true })))
}

async fn list_summaries(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<MemberSummary>>> {
    let user = get_authenticated_user(&session).await?;

    let summaries = Member::list_summaries(&state.backend, &user.access_token)
        .await
        .map_err(AppError::backend("Erro ao carregar integrantes."))?;

    Ok(Json(
        summaries
            .into_iter()
            .filter(|s| s.matches(&params.search))
            .collect(),
    ))
}

/// Takes the first file field of a multipart upload
async fn import_spreadsheet(
    State(state): State<AppState>,
    session: Session,
    mut multipart: Multipart,
) -> Result<Json<ImportReport>> {
    let user = get_authenticated_user(&session).await?;

    let invalid_upload = |e: axum::extract::multipart::MultipartError| {
        AppError::Validation(format!("Erro ao iniciar importação: {}", e))
    };

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(invalid_upload)? {
        if field.file_name().is_some() || field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or("planilha").to_string();
            let bytes = field.bytes().await.map_err(invalid_upload)?;
            upload = Some((file_name, bytes));
            break;
        }
    }

    let Some((file_name, bytes)) = upload else {
        return Err(AppError::Validation("Nenhum arquivo enviado.".to_string()));
    };

    tracing::info!(file_name = %file_name, size = bytes.len(), "Importing spreadsheet");
    let report = import_members(&state.backend, &user.access_token, &bytes).await?;

    log_action(
        &state.backend,
        &user.access_token,
        actions::MEMBER_IMPORT,
        &file_name,
        Some(&format!(
            "{} importados, {} ignorados",
            report.imported, report.skipped
        )),
    )
    .await;

    Ok(Json(report))
}

async fn launch(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<AsoLaunchRequest>,
) -> Result<Json<MemberView>> {
    let user = get_authenticated_user(&session).await?;
    let today = dates::today();
    let launch = request.validate(today)?;

    let member = launch_aso(&state.backend, &user.access_token, &launch).await?;

    Ok(Json(member.view(today)))
}

/// Creates the members router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/members", get(list_members).post(create_member))
        .route("/members/summaries", get(list_summaries))
        .route("/members/import", post(import_spreadsheet))
        .route(
            "/members/:id",
            get(get_member).put(update_member).delete(delete_member),
        )
        .route("/aso/launch", post(launch))
}
