use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::{BackendClient, BackendError, Query};
use crate::models::status::{days_remaining, expiration_from_last_aso, AsoStatus};
use crate::services::dates::display_date;

pub const MEMBERS_TABLE: &str = "integrantes";
pub const MEMBERS_STATUS_VIEW: &str = "integrantes_status_view";

/// A member row as served by the status view (the base table lacks the computed columns)
#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    pub id: Uuid,
    #[serde(rename = "nome")]
    pub name: String,
    pub email: Option<String>,
    #[serde(rename = "cargo")]
    pub role: Option<String>,
    #[serde(rename = "unidade")]
    pub unit: Option<String>,
    pub cpf: Option<String>,
    #[serde(rename = "data_ultimo_aso")]
    pub last_aso_date: Option<NaiveDate>,
    #[serde(rename = "data_vencimento", default)]
    pub expiration_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMember {
    #[serde(rename = "nome")]
    pub name: String,
    pub email: Option<String>,
    #[serde(rename = "cargo")]
    pub role: Option<String>,
    #[serde(rename = "unidade")]
    pub unit: String,
    #[serde(rename = "data_ultimo_aso")]
    pub last_aso_date: Option<NaiveDate>,
}

/// Partial update; `None` leaves a column alone and `Some(None)` clears it
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemberUpdate {
    #[serde(rename = "nome", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<Option<String>>,
    #[serde(rename = "cargo", skip_serializing_if = "Option::is_none")]
    pub role: Option<Option<String>>,
    #[serde(rename = "unidade", skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(rename = "data_ultimo_aso", skip_serializing_if = "Option::is_none")]
    pub last_aso_date: Option<Option<NaiveDate>>,
}

/// Just enough of a member to pick one from a list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSummary {
    pub id: Uuid,
    #[serde(rename(deserialize = "nome"))]
    pub name: String,
    #[serde(rename(deserialize = "cargo"))]
    pub role: Option<String>,
    #[serde(rename(deserialize = "unidade"))]
    pub unit: Option<String>,
}

impl MemberSummary {
    pub fn matches(&self, term: &str) -> bool {
        contains_ignore_case(&self.name, term)
    }
}

/// Member shaped for display: Brazilian dates and a status computed for a given day
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    pub id: Uuid,
    pub name: String,
    pub initials: String,
    pub email: String,
    pub role: String,
    pub unit: String,
    pub cpf: Option<String>,
    pub last_aso_date: String,
    pub expiration_date: String,
    pub days_remaining: Option<i64>,
    pub status: Option<AsoStatus>,
    pub status_label: Option<&'static str>,
}

impl Member {
    /// Expiration from the view, or one year after the last exam when the view has none
    pub fn expiration(&self) -> Option<NaiveDate> {
        self.expiration_date
            .or_else(|| self.last_aso_date.and_then(expiration_from_last_aso))
    }

    /// Status recomputed from the expiration date; falls back to the view's status
    pub fn status_on(&self, today: NaiveDate) -> Option<AsoStatus> {
        match self.expiration() {
            Some(expiration) => Some(AsoStatus::classify(expiration, today)),
            None => self.status.as_deref().and_then(AsoStatus::parse),
        }
    }

    /// Case-insensitive match on name or email; an empty term matches everyone
    pub fn matches(&self, term: &str) -> bool {
        contains_ignore_case(&self.name, term)
            || self
                .email
                .as_deref()
                .is_some_and(|email| contains_ignore_case(email, term))
    }

    pub fn view(&self, today: NaiveDate) -> MemberView {
        let status = self.status_on(today);
        MemberView {
            id: self.id,
            name: self.name.clone(),
            initials: initials(&self.name),
            email: self.email.clone().unwrap_or_default(),
            role: self.role.clone().unwrap_or_default(),
            unit: self.unit.clone().unwrap_or_default(),
            cpf: self.cpf.clone(),
            last_aso_date: display_date(self.last_aso_date),
            expiration_date: display_date(self.expiration()),
            days_remaining: self.expiration().map(|exp| days_remaining(exp, today)),
            status,
            status_label: status.map(|s| s.label()),
        }
    }

    /// Lists all members with their computed expiration
    pub async fn list(backend: &BackendClient, token: &str) -> Result<Vec<Self>, BackendError> {
        backend
            .select(token, MEMBERS_STATUS_VIEW, &Query::new().order("nome", true))
            .await
    }

    pub async fn find_by_id(
        backend: &BackendClient,
        token: &str,
        id: Uuid,
    ) -> Result<Option<Self>, BackendError> {
        let rows: Vec<Self> = backend
            .select(token, MEMBERS_STATUS_VIEW, &Query::new().eq("id", id).limit(1))
            .await?;

        Ok(rows.into_iter().next())
    }

    /// Creates a new member record
    pub async fn create(
        backend: &BackendClient,
        token: &str,
        data: &NewMember,
    ) -> Result<Self, BackendError> {
        let rows: Vec<Self> = backend
            .insert(token, MEMBERS_TABLE, std::slice::from_ref(data))
            .await?;

        rows.into_iter().next().ok_or_else(|| BackendError::ApiError {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            message: "Insert returned no rows".to_string(),
        })
    }

    /// Updates member data; `None` when no row has that id
    pub async fn update(
        backend: &BackendClient,
        token: &str,
        id: Uuid,
        data: &MemberUpdate,
    ) -> Result<Option<Self>, BackendError> {
        let rows: Vec<Self> = backend
            .update(token, MEMBERS_TABLE, &Query::new().eq("id", id), data)
            .await?;

        Ok(rows.into_iter().next())
    }

    pub async fn set_last_aso_date(
        backend: &BackendClient,
        token: &str,
        id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<Self>, BackendError> {
        let update = MemberUpdate {
            last_aso_date: Some(Some(date)),
            ..MemberUpdate::default()
        };
        Self::update(backend, token, id, &update).await
    }

    pub async fn delete(backend: &BackendClient, token: &str, id: Uuid) -> Result<(), BackendError> {
        backend
            .delete(token, MEMBERS_TABLE, &Query::new().eq("id", id))
            .await
    }

    /// Id, name, role and unit of every member, ordered by name
    pub async fn list_summaries(
        backend: &BackendClient,
        token: &str,
    ) -> Result<Vec<MemberSummary>, BackendError> {
        backend
            .select(
                token,
                MEMBERS_TABLE,
                &Query::new().select("id, nome, cargo, unidade").order("nome", true),
            )
            .await
    }
}

pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.trim().to_lowercase())
}

/// "Ana Maria Silva" -> "AS"
pub fn initials(name: &str) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    let pick = |word: Option<&&str>| {
        word.and_then(|w| w.chars().next())
            .map(|c| c.to_uppercase().to_string())
            .unwrap_or_default()
    };

    match words.len() {
        0 => String::new(),
        1 => pick(words.first()),
        _ => format!("{}{}", pick(words.first()), pick(words.last())),
    }
}
