use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::{BackendClient, BackendError, Query};
use crate::models::member::contains_ignore_case;
use crate::services::dates::format_br_date;

pub const CONVOCATIONS_TABLE: &str = "convocacoes";

const CONVOCATION_WITH_MEMBER: &str = "*, integrante:integrantes(nome, cargo, unidade, email)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvocationStatus {
    Pending,
    Confirmed,
    Cancelled,
    Scheduled,
}

impl ConvocationStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ConvocationStatus::Pending => "Pendente",
            ConvocationStatus::Confirmed => "Confirmado",
            ConvocationStatus::Cancelled => "Cancelado",
            ConvocationStatus::Scheduled => "Agendado",
        }
    }
}

/// Kinds of occupational exam
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AsoType {
    #[serde(rename = "Admissional")]
    Admission,
    #[default]
    #[serde(rename = "Periódico")]
    Periodic,
    #[serde(rename = "Demissional")]
    Dismissal,
    #[serde(rename = "Retorno ao Trabalho")]
    ReturnToWork,
    #[serde(rename = "Mudança de Função")]
    RoleChange,
    #[serde(rename = "Mudança de Risco")]
    RiskChange,
}

impl AsoType {
    pub fn label(&self) -> &'static str {
        match self {
            AsoType::Admission => "Admissional",
            AsoType::Periodic => "Periódico",
            AsoType::Dismissal => "Demissional",
            AsoType::ReturnToWork => "Retorno ao Trabalho",
            AsoType::RoleChange => "Mudança de Função",
            AsoType::RiskChange => "Mudança de Risco",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConvocationMember {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "cargo")]
    pub role: Option<String>,
    #[serde(rename = "unidade")]
    pub unit: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Convocation {
    pub id: Uuid,
    #[serde(rename = "integrante_id")]
    pub member_id: Uuid,
    // Kept as text: the store may hold types this build does not know about
    #[serde(rename = "tipo_aso")]
    pub aso_type: String,
    #[serde(rename = "data")]
    pub date: NaiveDate,
    pub status: ConvocationStatus,
    pub email: Option<String>,
    #[serde(rename = "enviar_email", default)]
    pub send_email: bool,
    #[serde(rename = "integrante", default)]
    pub member: Option<ConvocationMember>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewConvocation {
    #[serde(rename = "integrante_id")]
    pub member_id: Uuid,
    #[serde(rename = "tipo_aso")]
    pub aso_type: AsoType,
    #[serde(rename = "data")]
    pub date: NaiveDate,
    pub status: ConvocationStatus,
    pub email: Option<String>,
    #[serde(rename = "enviar_email")]
    pub send_email: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvocationView {
    pub id: Uuid,
    pub member_id: Uuid,
    pub member_name: String,
    pub member_role: String,
    pub unit: String,
    pub aso_type: String,
    pub date: String,
    pub status: ConvocationStatus,
    pub status_label: &'static str,
    pub email: Option<String>,
    pub send_email: bool,
}

impl Convocation {
    pub fn member_name(&self) -> &str {
        self.member.as_ref().map(|m| m.name.as_str()).unwrap_or("")
    }

    /// Case-insensitive match on member name or ASO type
    pub fn matches(&self, term: &str) -> bool {
        contains_ignore_case(self.member_name(), term) || contains_ignore_case(&self.aso_type, term)
    }

    pub fn view(&self) -> ConvocationView {
        let member = self.member.as_ref();
        ConvocationView {
            id: self.id,
            member_id: self.member_id,
            member_name: self.member_name().to_string(),
            member_role: member.and_then(|m| m.role.clone()).unwrap_or_default(),
            unit: member.and_then(|m| m.unit.clone()).unwrap_or_default(),
            aso_type: self.aso_type.clone(),
            date: format_br_date(self.date),
            status: self.status,
            status_label: self.status.label(),
            email: self.email.clone(),
            send_email: self.send_email,
        }
    }

    /// Lists convocations with their member, newest first
    pub async fn list(backend: &BackendClient, token: &str) -> Result<Vec<Self>, BackendError> {
        backend
            .select(
                token,
                CONVOCATIONS_TABLE,
                &Query::new()
                    .select(CONVOCATION_WITH_MEMBER)
                    .order("data", false),
            )
            .await
    }

    pub async fn find_by_id(
        backend: &BackendClient,
        token: &str,
        id: Uuid,
    ) -> Result<Option<Self>, BackendError> {
        let rows: Vec<Self> = backend
            .select(
                token,
                CONVOCATIONS_TABLE,
                &Query::new().select(CONVOCATION_WITH_MEMBER).eq("id", id).limit(1),
            )
            .await?;

        Ok(rows.into_iter().next())
    }

    pub async fn create(
        backend: &BackendClient,
        token: &str,
        data: &NewConvocation,
    ) -> Result<Self, BackendError> {
        let rows: Vec<Self> = backend
            .insert(token, CONVOCATIONS_TABLE, std::slice::from_ref(data))
            .await?;

        rows.into_iter().next().ok_or_else(|| BackendError::ApiError {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            message: "Insert returned no rows".to_string(),
        })
    }

    /// Any status may follow any other
    pub async fn set_status(
        backend: &BackendClient,
        token: &str,
        id: Uuid,
        status: ConvocationStatus,
    ) -> Result<Option<Self>, BackendError> {
        let rows: Vec<Self> = backend
            .update(
                token,
                CONVOCATIONS_TABLE,
                &Query::new().eq("id", id),
                &serde_json::json!({ "status": status }),
            )
            .await?;

        Ok(rows.into_iter().next())
    }

    pub async fn delete(backend: &BackendClient, token: &str, id: Uuid) -> Result<(), BackendError> {
        backend
            .delete(token, CONVOCATIONS_TABLE, &Query::new().eq("id", id))
            .await
    }
}
