use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::{
    members::SearchParams,
    middleware::{auth::get_authenticated_user, session::AppState},
};
use crate::backend::BackendClient;
use crate::error::{AppError, Result};
use crate::models::{
    convocation::{AsoType, Convocation, ConvocationStatus, ConvocationView, NewConvocation},
    member::{Member, NewMember},
};
use crate::services::{
    audit::{actions, log_action},
    dates::{self, format_br_date, parse_flexible_date},
};

fn default_send_email() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConvocationForm {
    member_id: Option<Uuid>,
    /// Used when no existing member is picked
    new_member_name: Option<String>,
    aso_type: Option<AsoType>,
    date: Option<String>,
    email: Option<String>,
    #[serde(default = "default_send_email")]
    send_email: bool,
}

#[derive(Debug, Deserialize)]
struct StatusForm {
    status: ConvocationStatus,
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Who the convocation is for
enum Recipient {
    Existing(Member),
    New(String),
}

async fn resolve_recipient(
    backend: &BackendClient,
    token: &str,
    form: &ConvocationForm,
) -> Result<Recipient> {
    if let Some(id) = form.member_id {
        let member = Member::find_by_id(backend, token, id)
            .await
            .map_err(AppError::backend("Erro ao carregar integrante."))?
            .ok_or_else(|| AppError::NotFound("Integrante não encontrado.".to_string()))?;
        return Ok(Recipient::Existing(member));
    }

    trimmed(&form.new_member_name)
        .map(Recipient::New)
        .ok_or_else(|| {
            AppError::Validation(
                "Selecione um integrante ou informe o nome de um novo integrante.".to_string(),
            )
        })
}

/// Creates the convocation, registering the member first when it is new
async fn create_convocation_for(
    backend: &BackendClient,
    token: &str,
    form: ConvocationForm,
    today: NaiveDate,
    default_unit: &str,
) -> Result<Convocation> {
    let recipient = resolve_recipient(backend, token, &form).await?;

    // Typed email wins; otherwise the member's own
    let email = trimmed(&form.email).or_else(|| match &recipient {
        Recipient::Existing(member) => trimmed(&member.email),
        Recipient::New(_) => None,
    });

    if form.send_email && email.is_none() {
        return Err(AppError::Validation(
            "Informe um email para enviar a convocação.".to_string(),
        ));
    }

    let date = match trimmed(&form.date) {
        Some(raw) => parse_flexible_date(&raw)?,
        None => today,
    };
    let aso_type = form.aso_type.unwrap_or_default();

    let member = match recipient {
        Recipient::Existing(member) => member,
        Recipient::New(name) => {
            let member = Member::create(
                backend,
                token,
                &NewMember {
                    name,
                    email: email.clone(),
                    role: None,
                    unit: default_unit.to_string(),
                    last_aso_date: None,
                },
            )
            .await
            .map_err(AppError::backend("Erro ao cadastrar integrante."))?;

            tracing::info!(member_id = %member.id, "Member created for convocation");
            log_action(backend, token, actions::MEMBER_CREATE, &member.name, None).await;
            member
        }
    };

    let created = Convocation::create(
        backend,
        token,
        &NewConvocation {
            member_id: member.id,
            aso_type,
            date,
            status: ConvocationStatus::Pending,
            email,
            send_email: form.send_email,
        },
    )
    .await
    .map_err(AppError::backend("Erro ao criar convocação."))?;

    tracing::info!(convocation_id = %created.id, member_id = %member.id, "Convocation created");
    log_action(
        backend,
        token,
        actions::CONVOCATION_CREATE,
        &member.name,
        Some(&format!(
            "Convocação {} para {}",
            aso_type.label(),
            format_br_date(date)
        )),
    )
    .await;

    // Re-read with the member embedded
    let refreshed = Convocation::find_by_id(backend, token, created.id)
        .await
        .map_err(AppError::backend("Erro ao carregar convocação."))?;

    Ok(refreshed.unwrap_or(created))
}

async fn list_convocations(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<ConvocationView>>> {
    let user = get_authenticated_user(&session).await?;

    let convocations = Convocation::list(&state.backend, &user.access_token)
        .await
        .map_err(AppError::backend("Erro ao carregar convocações."))?;

    Ok(Json(
        convocations
            .iter()
            .filter(|c| c.matches(&params.search))
            .map(Convocation::view)
            .collect(),
    ))
}

async fn create_convocation(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<ConvocationForm>,
) -> Result<Json<ConvocationView>> {
    let user = get_authenticated_user(&session).await?;

    let convocation = create_convocation_for(
        &state.backend,
        &user.access_token,
        form,
        dates::today(),
        &state.config.default_unit,
    )
    .await?;

    Ok(Json(convocation.view()))
}

async fn update_status(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(form): Json<StatusForm>,
) -> Result<Json<ConvocationView>> {
    let user = get_authenticated_user(&session).await?;

    Convocation::set_status(&state.backend, &user.access_token, id, form.status)
        .await
        .map_err(AppError::backend("Erro ao atualizar convocação."))?
        .ok_or_else(|| AppError::NotFound("Convocação não encontrada.".to_string()))?;

    let convocation = Convocation::find_by_id(&state.backend, &user.access_token, id)
        .await
        .map_err(AppError::backend("Erro ao carregar convocação."))?
        .ok_or_else(|| AppError::NotFound("Convocação não encontrada.".to_string()))?;

    tracing::info!(convocation_id = %id, status = ?form.status, "Convocation status changed");
    log_action(
        &state.backend,
        &user.access_token,
        actions::CONVOCATION_UPDATE,
        convocation.member_name(),
        Some(&format!("Status: {}", form.status.label())),
    )
    .await;

    Ok(Json(convocation.view()))
}

async fn delete_convocation(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let user = get_authenticated_user(&session).await?;

    let target = Convocation::find_by_id(&state.backend, &user.access_token, id)
        .await
        .map_err(AppError::backend("Erro ao excluir convocação."))?
        .map(|c| c.member_name().to_string())
        .unwrap_or_else(|| id.to_string());

    Convocation::delete(&state.backend, &user.access_token, id)
        .await
        .map_err(AppError::backend("Erro ao excluir convocação."))?;

    tracing::info!(convocation_id = %id, "Convocation deleted");
    log_action(
        &state.backend,
        &user.access_token,
        actions::CONVOCATION_DELETE,
        &target,
        None,
    )
    .await;

    Ok(Json(json!({ "ok": true })))
}

/// Creates the convocations router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/convocations", get(list_convocations).post(create_convocation))
        .route("/convocations/:id", axum::routing::delete(delete_convocation))
        .route("/convocations/:id/status", put(update_status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MEMBER_ID: &str = "0b0f5e59-2f35-4c38-9f0a-7b5e1c8f4d21";
    const CONVOCATION_ID: &str = "5f1d7c3e-8a7b-4f0e-9b6a-2c4d8e1f3a5b";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 10, 25).unwrap()
    }

    fn form(value: serde_json::Value) -> ConvocationForm {
        serde_json::from_value(value).unwrap()
    }

    async fn mock_logging(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(401))
            .mount(server)
            .await;
    }

    fn stored_convocation() -> serde_json::Value {
        json!({
            "id": CONVOCATION_ID,
            "integrante_id": MEMBER_ID,
            "tipo_aso": "Periódico",
            "data": "2023-10-25",
            "status": "Pending",
            "email": "ana.s@company.com",
            "enviar_email": true
        })
    }

    #[tokio::test]
    async fn test_requires_member_and_email() {
        let server = MockServer::start().await;
        let backend = BackendClient::new(&server.uri(), Secret::new("anon".to_string()));

        let missing_member = create_convocation_for(
            &backend,
            "token",
            form(json!({ "asoType": "Periódico" })),
            today(),
            "Matriz",
        )
        .await;
        assert!(matches!(missing_member, Err(AppError::Validation(_))));

        let missing_email = create_convocation_for(
            &backend,
            "token",
            form(json!({ "newMemberName": "Ricardo Almeida" })),
            today(),
            "Matriz",
        )
        .await;
        assert!(matches!(missing_email, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_existing_member_email_is_prefilled() {
        let server = MockServer::start().await;
        mock_logging(&server).await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/integrantes_status_view"))
            .and(query_param("id", format!("eq.{}", MEMBER_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": MEMBER_ID,
                "nome": "Ana Silva",
                "email": "ana.s@company.com",
                "cargo": "Enfermeira",
                "unidade": "Rio de Janeiro",
                "cpf": null,
                "data_ultimo_aso": "2022-10-25"
            }])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/convocacoes"))
            .and(body_json(json!([{
                "integrante_id": MEMBER_ID,
                "tipo_aso": "Periódico",
                "data": "2023-10-25",
                "status": "Pending",
                "email": "ana.s@company.com",
                "enviar_email": true
            }])))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([stored_convocation()])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/convocacoes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let backend = BackendClient::new(&server.uri(), Secret::new("anon".to_string()));
        let convocation = create_convocation_for(
            &backend,
            "token",
            form(json!({ "memberId": MEMBER_ID })),
            today(),
            "Matriz",
        )
        .await
        .unwrap();

        assert_eq!(convocation.status, ConvocationStatus::Pending);
        assert_eq!(convocation.email.as_deref(), Some("ana.s@company.com"));
    }

    #[tokio::test]
    async fn test_new_member_is_created_first() {
        let server = MockServer::start().await;
        mock_logging(&server).await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/integrantes"))
            .and(body_json(json!([{
                "nome": "Ricardo Almeida",
                "email": "ricardo@company.com",
                "cargo": null,
                "unidade": "Matriz",
                "data_ultimo_aso": null
            }])))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
                "id": MEMBER_ID,
                "nome": "Ricardo Almeida",
                "email": "ricardo@company.com",
                "cargo": null,
                "unidade": "Matriz",
                "cpf": null,
                "data_ultimo_aso": null
            }])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/convocacoes"))
            .and(body_json(json!([{
                "integrante_id": MEMBER_ID,
                "tipo_aso": "Admissional",
                "data": "2023-11-02",
                "status": "Pending",
                "email": "ricardo@company.com",
                "enviar_email": true
            }])))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([stored_convocation()])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/convocacoes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([stored_convocation()])))
            .mount(&server)
            .await;

        let backend = BackendClient::new(&server.uri(), Secret::new("anon".to_string()));
        create_convocation_for(
            &backend,
            "token",
            form(json!({
                "newMemberName": " Ricardo Almeida ",
                "email": "ricardo@company.com",
                "asoType": "Admissional",
                "date": "02/11/2023"
            })),
            today(),
            "Matriz",
        )
        .await
        .unwrap();
    }
}
