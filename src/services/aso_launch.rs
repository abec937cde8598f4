use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::backend::{BackendClient, BackendError};
use crate::models::{AsoType, Member};
use crate::services::audit::{actions, log_action};
use crate::services::dates::{format_iso_date, parse_flexible_date, DateError};

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Selecione um integrante.")]
    MissingMember,

    #[error("Integrante não encontrado.")]
    MemberNotFound,

    #[error(transparent)]
    InvalidDate(#[from] DateError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Launch form as submitted; everything but the member has a default
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsoLaunchRequest {
    pub member_id: Option<Uuid>,
    pub date: Option<String>,
    pub aso_type: Option<AsoType>,
    pub observations: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AsoLaunch {
    pub member_id: Uuid,
    pub date: NaiveDate,
    pub aso_type: AsoType,
    pub observations: String,
}

impl AsoLaunchRequest {
    /// Fills defaults: today's date and a periodic exam
    pub fn validate(self, today: NaiveDate) -> Result<AsoLaunch, LaunchError> {
        let member_id = self.member_id.ok_or(LaunchError::MissingMember)?;

        let date = match self.date.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => parse_flexible_date(raw)?,
            _ => today,
        };

        Ok(AsoLaunch {
            member_id,
            date,
            aso_type: self.aso_type.unwrap_or_default(),
            observations: self.observations.unwrap_or_default().trim().to_string(),
        })
    }
}

impl AsoLaunch {
    pub fn details(&self) -> String {
        format!(
            "Lançamento de ASO {} em {}. Obs: {}",
            self.aso_type.label(),
            format_iso_date(self.date),
            self.observations
        )
    }
}

pub fn launch_target(member_name: &str) -> String {
    format!("Integrante: {}", member_name)
}

/// Records the exam as the member's latest and logs it
pub async fn launch_aso(
    backend: &BackendClient,
    token: &str,
    launch: &AsoLaunch,
) -> Result<Member, LaunchError> {
    let member = Member::set_last_aso_date(backend, token, launch.member_id, launch.date)
        .await?
        .ok_or(LaunchError::MemberNotFound)?;

    tracing::info!(
        member_id = %member.id,
        date = %launch.date,
        aso_type = launch.aso_type.label(),
        "ASO launched"
    );

    log_action(
        backend,
        token,
        actions::ASO_LAUNCH,
        &launch_target(&member.name),
        Some(&launch.details()),
    )
    .await;

    Ok(member)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MEMBER_ID: &str = "0b0f5e59-2f35-4c38-9f0a-7b5e1c8f4d21";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 10, 25).unwrap()
    }

    #[test]
    fn test_defaults() {
        let launch = AsoLaunchRequest {
            member_id: Some(MEMBER_ID.parse().unwrap()),
            ..AsoLaunchRequest::default()
        }
        .validate(today())
        .unwrap();

        assert_eq!(launch.date, today());
        assert_eq!(launch.aso_type, AsoType::Periodic);
        assert_eq!(launch.details(), "Lançamento de ASO Periódico em 2023-10-25. Obs: ");
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            AsoLaunchRequest::default().validate(today()),
            Err(LaunchError::MissingMember)
        ));

        let request: AsoLaunchRequest = serde_json::from_value(json!({
            "memberId": MEMBER_ID,
            "date": "2023-13-40",
            "asoType": "Admissional"
        }))
        .unwrap();
        assert!(matches!(request.validate(today()), Err(LaunchError::InvalidDate(_))));

        let request: AsoLaunchRequest = serde_json::from_value(json!({
            "memberId": MEMBER_ID,
            "date": "02/11/2023",
            "asoType": "Mudança de Risco",
            "observations": " Apto com restrições "
        }))
        .unwrap();
        let launch = request.validate(today()).unwrap();
        assert_eq!(
            launch.details(),
            "Lançamento de ASO Mudança de Risco em 2023-11-02. Obs: Apto com restrições"
        );
    }

    #[tokio::test]
    async fn test_launch_updates_and_logs() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/integrantes"))
            .and(query_param("id", format!("eq.{}", MEMBER_ID)))
            .and(body_json(json!({ "data_ultimo_aso": "2023-10-25" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": MEMBER_ID,
                "nome": "Ana Silva",
                "email": "ana.s@company.com",
                "cargo": "Enfermeira",
                "unidade": "Rio de Janeiro",
                "cpf": null,
                "data_ultimo_aso": "2023-10-25"
            }])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "8d0b4a5e-3f0e-4f53-9a53-0b7c1f1d2e3a",
                "email": "admin@easyaso.com"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/audit_logs"))
            .and(body_json(json!([{
                "action": "aso_launch",
                "target": "Integrante: Ana Silva",
                "details": "Lançamento de ASO Periódico em 2023-10-25. Obs: ",
                "actor_id": "8d0b4a5e-3f0e-4f53-9a53-0b7c1f1d2e3a"
            }])))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let backend = BackendClient::new(&server.uri(), Secret::new("anon".to_string()));
        let launch = AsoLaunch {
            member_id: MEMBER_ID.parse().unwrap(),
            date: today(),
            aso_type: AsoType::Periodic,
            observations: String::new(),
        };

        let member = launch_aso(&backend, "token", &launch).await.unwrap();
        assert_eq!(member.last_aso_date, Some(today()));
    }

    #[tokio::test]
    async fn test_launch_unknown_member() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/integrantes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let backend = BackendClient::new(&server.uri(), Secret::new("anon".to_string()));
        let launch = AsoLaunch {
            member_id: MEMBER_ID.parse().unwrap(),
            date: today(),
            aso_type: AsoType::Admission,
            observations: String::new(),
        };

        assert!(matches!(
            launch_aso(&backend, "token", &launch).await,
            Err(LaunchError::MemberNotFound)
        ));
    }
}
