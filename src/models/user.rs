use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::{BackendClient, BackendError, Query};

pub const USERS_TABLE: &str = "usuarios";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemRole {
    Admin,
    #[default]
    User,
}

impl SystemRole {
    pub fn label(&self) -> &'static str {
        match self {
            SystemRole::Admin => "Administrador",
            SystemRole::User => "Usuário",
        }
    }
}

/// An account allowed into the dashboard; the id is the auth user id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppUser {
    pub id: Uuid,
    pub email: Option<String>,
    #[serde(rename(deserialize = "nome"))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "role_or_user")]
    pub role: SystemRole,
}

/// A null role column grants no admin rights
fn role_or_user<'de, D>(deserializer: D) -> Result<SystemRole, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<SystemRole>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl AppUser {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("Usuário")
    }

    pub async fn find_by_id(
        backend: &BackendClient,
        token: &str,
        id: Uuid,
    ) -> Result<Option<Self>, BackendError> {
        let rows: Vec<Self> = backend
            .select(token, USERS_TABLE, &Query::new().eq("id", id).limit(1))
            .await?;

        Ok(rows.into_iter().next())
    }

    pub async fn list(backend: &BackendClient, token: &str) -> Result<Vec<Self>, BackendError> {
        backend
            .select(token, USERS_TABLE, &Query::new().order("nome", true))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_mapping_and_default_role() {
        let user: AppUser = serde_json::from_value(json!({
            "id": "8d0b4a5e-3f0e-4f53-9a53-0b7c1f1d2e3a",
            "email": "roberto.silva@easyaso.com",
            "nome": "Dr. Roberto Silva"
        }))
        .unwrap();

        assert_eq!(user.role, SystemRole::User);
        assert_eq!(user.display_name(), "Dr. Roberto Silva");

        let admin: AppUser = serde_json::from_value(json!({
            "id": "8d0b4a5e-3f0e-4f53-9a53-0b7c1f1d2e3a",
            "email": "jorge.admin@company.com",
            "nome": null,
            "role": "admin"
        }))
        .unwrap();
        assert_eq!(admin.role.label(), "Administrador");
        assert_eq!(admin.display_name(), "jorge.admin@company.com");
    }

    #[test]
    fn test_null_role_is_plain_user() {
        let user: AppUser = serde_json::from_value(json!({
            "id": "8d0b4a5e-3f0e-4f53-9a53-0b7c1f1d2e3a",
            "email": "ana.s@company.com",
            "nome": "Ana Silva",
            "role": null
        }))
        .unwrap();

        assert_eq!(user.role, SystemRole::User);
        assert!(!matches!(user.role, SystemRole::Admin));
    }
}
