use chrono::NaiveDate;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::backend::{BackendClient, BackendError};
use crate::models::{
    audit_log::{AuditLogEntry, NewAuditLogEntry},
    member::Member,
    status::{days_remaining, AsoStatus},
};
use crate::services::{audit::actions, dates};

#[derive(Debug, Default, PartialEq)]
pub struct AlertStats {
    pub members_checked: usize,
    pub without_date: usize,
    pub alerts_created: usize,
}

/// Alert text when `days` is the first day of a new status bucket
pub fn alert_details(days: i64) -> Option<String> {
    if AsoStatus::from_days_remaining(days) == AsoStatus::from_days_remaining(days + 1) {
        return None;
    }

    if days < 0 {
        Some("ASO vencido".to_string())
    } else {
        Some(format!("Vencimento em {} dias", days))
    }
}

/// Background job that flags members whose exam status changed today
///
/// Runs with the service-role key, so the entries carry no actor and
/// show up as written by the system.
pub async fn scan_expirations(
    backend: &BackendClient,
    today: NaiveDate,
) -> Result<AlertStats, BackendError> {
    let token = backend.api_key().to_string();
    let members = Member::list(backend, &token).await?;

    let mut stats = AlertStats {
        members_checked: members.len(),
        ..AlertStats::default()
    };

    tracing::info!(
        total_members = stats.members_checked,
        "Starting expiration alert scan"
    );

    let mut entries = Vec::new();
    for member in &members {
        let Some(expiration) = member.expiration() else {
            stats.without_date += 1;
            continue;
        };

        let days = days_remaining(expiration, today);
        if let Some(details) = alert_details(days) {
            tracing::debug!(member_id = %member.id, days, "Expiration alert");
            entries.push(NewAuditLogEntry {
                action: actions::EXPIRATION_ALERT.to_string(),
                target: member.name.clone(),
                details: Some(details),
                actor_id: None,
            });
        }
    }

    if !entries.is_empty() {
        AuditLogEntry::append(backend, &token, &entries).await?;
    }
    stats.alerts_created = entries.len();

    tracing::info!(?stats, "Expiration alert scan completed");

    Ok(stats)
}

/// Registers the scan on `schedule` (six-field cron, seconds first) and starts it
pub async fn start_scheduler(
    backend: BackendClient,
    schedule: &str,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(schedule, move |_id, _scheduler| {
        let backend = backend.clone();
        Box::pin(async move {
            if let Err(e) = scan_expirations(&backend, dates::today()).await {
                tracing::error!(error = %e, "Expiration alert scan failed");
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    tracing::info!(schedule, "Expiration alert job scheduled");

    Ok(scheduler)
}
