use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::{BackendClient, BackendError, Query};

pub const AUDIT_LOGS_TABLE: &str = "audit_logs";

#[derive(Debug, Clone, Deserialize)]
pub struct ActorName {
    pub nome: Option<String>,
}

/// Append-only activity record
#[derive(Debug, Clone, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub target: Option<String>,
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub actor: Option<ActorName>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewAuditLogEntry {
    pub action: String,
    pub target: String,
    pub details: Option<String>,
    /// `None` for entries written by the system itself
    pub actor_id: Option<Uuid>,
}

impl AuditLogEntry {
    pub fn actor_name(&self) -> Option<&str> {
        self.actor.as_ref().and_then(|a| a.nome.as_deref())
    }

    /// Most recent entries first, with the actor's name
    pub async fn recent(
        backend: &BackendClient,
        token: &str,
        limit: usize,
    ) -> Result<Vec<Self>, BackendError> {
        backend
            .select(
                token,
                AUDIT_LOGS_TABLE,
                &Query::new()
                    .select("*, actor:usuarios(nome)")
                    .order("timestamp", false)
                    .limit(limit),
            )
            .await
    }

    pub async fn append(
        backend: &BackendClient,
        token: &str,
        entries: &[NewAuditLogEntry],
    ) -> Result<(), BackendError> {
        let _: Vec<serde_json::Value> = backend.insert(token, AUDIT_LOGS_TABLE, entries).await?;
        Ok(())
    }
}
