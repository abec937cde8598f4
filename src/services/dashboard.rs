use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::models::member::{Member, MemberView};
use crate::models::status::AsoStatus;

pub const MONTH_LABELS: [&str; 12] = [
    "Jan", "Fev", "Mar", "Abr", "Mai", "Jun", "Jul", "Ago", "Set", "Out", "Nov", "Dez",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthCount {
    pub month: u32,
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: AsoStatus,
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub year: i32,
    pub total_members: usize,
    /// Exams done in the year, by month of the last exam
    pub monthly_exams: Vec<MonthCount>,
    pub total_exams: usize,
    pub expiring_in_year: usize,
    pub status_breakdown: Vec<StatusCount>,
    /// Members whose last exam or expiration falls in the year
    pub members: Vec<MemberView>,
}

fn in_year(date: Option<NaiveDate>, year: i32) -> bool {
    date.is_some_and(|d| d.year() == year)
}

/// Aggregates the member list for one calendar year
pub fn year_stats(members: &[Member], year: i32, today: NaiveDate) -> DashboardStats {
    let year_members: Vec<&Member> = members
        .iter()
        .filter(|m| in_year(m.last_aso_date, year) || in_year(m.expiration(), year))
        .collect();

    let mut per_month = [0usize; 12];
    for date in members.iter().filter_map(|m| m.last_aso_date) {
        if date.year() == year {
            per_month[date.month0() as usize] += 1;
        }
    }

    let monthly_exams: Vec<MonthCount> = per_month
        .iter()
        .zip(MONTH_LABELS)
        .enumerate()
        .map(|(i, (count, label))| MonthCount {
            month: i as u32 + 1,
            label,
            count: *count,
        })
        .collect();

    let expiring_in_year = year_members
        .iter()
        .filter(|m| in_year(m.expiration(), year))
        .count();

    let status_breakdown = AsoStatus::ALL
        .iter()
        .map(|status| StatusCount {
            status: *status,
            label: status.label(),
            count: year_members
                .iter()
                .filter(|m| m.status_on(today) == Some(*status))
                .count(),
        })
        .collect();

    DashboardStats {
        year,
        total_members: members.len(),
        total_exams: per_month.iter().sum(),
        monthly_exams,
        expiring_in_year,
        status_breakdown,
        members: year_members.iter().map(|m| m.view(today)).collect(),
    }
}
