use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::backend::BackendClient;
use crate::models::audit_log::{AuditLogEntry, NewAuditLogEntry};
use crate::models::member::initials;
use crate::services::dates::format_br_date;

/// Action keywords written to the audit log
pub mod actions {
    pub const ASO_LAUNCH: &str = "aso_launch";
    pub const MEMBER_CREATE: &str = "member_create";
    pub const MEMBER_UPDATE: &str = "member_update";
    pub const MEMBER_DELETE: &str = "member_delete";
    pub const MEMBER_IMPORT: &str = "member_import";
    pub const CONVOCATION_CREATE: &str = "convocation_create";
    pub const CONVOCATION_UPDATE: &str = "convocation_update";
    pub const CONVOCATION_DELETE: &str = "convocation_delete";
    pub const USER_INVITE: &str = "user_invite";
    pub const PASSWORD_CHANGE: &str = "password_change";
    pub const EXPIRATION_ALERT: &str = "expiration_alert";
}

const ACTION_PHRASES: &[(&str, &str)] = &[
    (actions::ASO_LAUNCH, "lançou um ASO para"),
    (actions::MEMBER_CREATE, "cadastrou o integrante"),
    (actions::MEMBER_UPDATE, "atualizou o cadastro de"),
    (actions::MEMBER_DELETE, "excluiu o integrante"),
    (actions::MEMBER_IMPORT, "importou integrantes de"),
    (actions::CONVOCATION_CREATE, "criou uma nova convocação para"),
    (actions::CONVOCATION_UPDATE, "alterou a convocação de"),
    (actions::CONVOCATION_DELETE, "removeu a convocação de"),
    (actions::USER_INVITE, "enviou um convite para"),
    (actions::PASSWORD_CHANGE, "alterou a própria senha"),
    (actions::EXPIRATION_ALERT, "gerou alerta de expiração para"),
];

pub const SYSTEM_ACTOR: &str = "Sistema";
pub const UNKNOWN_ACTOR: &str = "Usuário desconhecido";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Create,
    Edit,
    Delete,
    System,
}

/// Buckets an action keyword by the verb it contains
pub fn classify_action(action: &str) -> NotificationKind {
    let action = action.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| action.contains(w));

    if has(&["create", "add", "insert"]) {
        NotificationKind::Create
    } else if has(&["update", "edit"]) {
        NotificationKind::Edit
    } else if has(&["delete", "remove"]) {
        NotificationKind::Delete
    } else {
        NotificationKind::System
    }
}

/// Human phrase for an action keyword; unknown keywords are shown as-is
pub fn action_phrase(action: &str) -> &str {
    ACTION_PHRASES
        .iter()
        .find(|(keyword, _)| *keyword == action)
        .map(|(_, phrase)| *phrase)
        .unwrap_or(action)
}

pub fn describe(actor: &str, action: &str, target: Option<&str>) -> String {
    match target.filter(|t| !t.trim().is_empty()) {
        Some(target) => format!("{} {} {}", actor, action_phrase(action), target),
        None => format!("{} {}", actor, action_phrase(action)),
    }
}

/// "Agora mesmo" within the hour, "Há Nh" within a day, the date otherwise
pub fn relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let hours = (now - timestamp).num_hours();
    if hours == 0 {
        "Agora mesmo".to_string()
    } else if hours > 0 && hours < 24 {
        format!("Há {}h", hours)
    } else {
        format_br_date(timestamp.date_naive())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub actor_name: String,
    pub actor_initials: String,
    pub action: String,
    pub sentence: String,
    pub target: Option<String>,
    pub details: Option<String>,
    pub time_display: String,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn from_entry(entry: &AuditLogEntry, now: DateTime<Utc>) -> Self {
        let actor_name = match (entry.actor_id, entry.actor_name()) {
            (None, _) => SYSTEM_ACTOR.to_string(),
            (Some(_), Some(name)) => name.to_string(),
            (Some(_), None) => UNKNOWN_ACTOR.to_string(),
        };

        Self {
            id: entry.id,
            kind: classify_action(&entry.action),
            actor_initials: initials(&actor_name),
            sentence: describe(&actor_name, &entry.action, entry.target.as_deref()),
            actor_name,
            action: entry.action.clone(),
            target: entry.target.clone(),
            details: entry.details.clone().filter(|d| !d.is_empty()),
            time_display: relative_time(entry.timestamp, now),
            timestamp: entry.timestamp,
        }
    }
}

/// Records an action by the user behind `token`. Never fails the caller: problems
/// are logged and the entry is dropped.
pub async fn log_action(
    backend: &BackendClient,
    token: &str,
    action: &str,
    target: &str,
    details: Option<&str>,
) {
    let user = match backend.get_user(token).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::warn!(action, "No authenticated user found for logging");
            return;
        }
        Err(e) => {
            tracing::error!(action, error = %e, "Unexpected error logging action");
            return;
        }
    };

    let entry = NewAuditLogEntry {
        action: action.to_string(),
        target: target.to_string(),
        details: details.map(str::to_string),
        actor_id: Some(user.id),
    };

    match AuditLogEntry::append(backend, token, &[entry]).await {
        Ok(()) => tracing::debug!(action, target, "Action logged"),
        Err(e) => tracing::error!(action, error = %e, "Error logging action"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use secrecy::Secret;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn entry(actor_id: Option<&str>, actor: Option<&str>, action: &str) -> AuditLogEntry {
        serde_json::from_value(json!({
            "id": "1c9f0e7a-54b2-4d3e-8f6a-9b0c1d2e3f4a",
            "actor_id": actor_id,
            "action": action,
            "target": "Maria Paula",
            "details": "",
            "timestamp": "2023-10-20T10:00:00Z",
            "actor": actor.map(|nome| json!({ "nome": nome }))
        }))
        .unwrap()
    }

    #[test]
    fn test_classify_action() {
        assert_eq!(classify_action("member_create"), NotificationKind::Create);
        assert_eq!(classify_action("ADD_FILE"), NotificationKind::Create);
        assert_eq!(classify_action("member_update"), NotificationKind::Edit);
        assert_eq!(classify_action("convocation_delete"), NotificationKind::Delete);
        assert_eq!(classify_action("remove_attachment"), NotificationKind::Delete);
        assert_eq!(classify_action("aso_launch"), NotificationKind::System);
        assert_eq!(classify_action("expiration_alert"), NotificationKind::System);
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            describe("Jorge M.", actions::CONVOCATION_CREATE, Some("Ricardo Almeida")),
            "Jorge M. criou uma nova convocação para Ricardo Almeida"
        );
        assert_eq!(
            describe("Ana Silva", actions::PASSWORD_CHANGE, Some("")),
            "Ana Silva alterou a própria senha"
        );
        assert_eq!(describe("Ana", "custom_thing", Some("X")), "Ana custom_thing X");
    }

    #[test]
    fn test_relative_time() {
        let now = Utc.with_ymd_and_hms(2023, 10, 20, 12, 0, 0).unwrap();
        assert_eq!(relative_time(now - Duration::minutes(10), now), "Agora mesmo");
        assert_eq!(relative_time(now - Duration::hours(2), now), "Há 2h");
        assert_eq!(relative_time(now - Duration::hours(23), now), "Há 23h");
        assert_eq!(relative_time(now - Duration::hours(30), now), "19/10/2023");
        assert_eq!(relative_time(now + Duration::hours(3), now), "20/10/2023");
    }

    #[test]
    fn test_notification_actor_fallbacks() {
        let now = Utc.with_ymd_and_hms(2023, 10, 20, 12, 0, 0).unwrap();

        let system = Notification::from_entry(&entry(None, None, actions::EXPIRATION_ALERT), now);
        assert_eq!(system.actor_name, "Sistema");
        assert_eq!(system.kind, NotificationKind::System);
        assert_eq!(system.details, None);
        assert_eq!(system.time_display, "Há 2h");

        let known = Notification::from_entry(
            &entry(
                Some("8d0b4a5e-3f0e-4f53-9a53-0b7c1f1d2e3a"),
                Some("Dr. Roberto Silva"),
                actions::MEMBER_UPDATE,
            ),
            now,
        );
        assert_eq!(known.sentence, "Dr. Roberto Silva atualizou o cadastro de Maria Paula");
        assert_eq!(known.actor_initials, "DS");

        let unknown = Notification::from_entry(
            &entry(Some("8d0b4a5e-3f0e-4f53-9a53-0b7c1f1d2e3a"), None, actions::MEMBER_DELETE),
            now,
        );
        assert_eq!(unknown.actor_name, "Usuário desconhecido");
    }

    #[tokio::test]
    async fn test_log_action_skips_without_user() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/audit_logs"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let backend = BackendClient::new(&server.uri(), Secret::new("anon".to_string()));
        log_action(&backend, "expired", actions::ASO_LAUNCH, "Integrante: Ana", None).await;
    }

    #[tokio::test]
    async fn test_log_action_records_actor() {
        let server = MockServer::start().await;
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
        log_action(
            &backend,
            "token",
            actions::ASO_LAUNCH,
            "Integrante: Ana Silva",
            Some("Lançamento de ASO Periódico em 2023-10-25. Obs: "),
        )
        .await;
    }
}
