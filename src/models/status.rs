use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// An ASO stays valid for one year after the exam.
pub const ASO_VALIDITY_MONTHS: u32 = 12;

pub const URGENT_DAYS: i64 = 30;
pub const SUMMON_DAYS: i64 = 60;
pub const NEAR_DAYS: i64 = 90;

/// Exam validity bucket, derived only from the days left until expiration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AsoStatus {
    Valid,
    Near,
    Summon,
    Urgent,
    Expired,
}

impl AsoStatus {
    pub const ALL: [AsoStatus; 5] = [
        AsoStatus::Valid,
        AsoStatus::Near,
        AsoStatus::Summon,
        AsoStatus::Urgent,
        AsoStatus::Expired,
    ];

    pub fn from_days_remaining(days: i64) -> Self {
        if days < 0 {
            AsoStatus::Expired
        } else if days < URGENT_DAYS {
            AsoStatus::Urgent
        } else if days < SUMMON_DAYS {
            AsoStatus::Summon
        } else if days < NEAR_DAYS {
            AsoStatus::Near
        } else {
            AsoStatus::Valid
        }
    }

    pub fn classify(expiration: NaiveDate, today: NaiveDate) -> Self {
        Self::from_days_remaining(days_remaining(expiration, today))
    }

    pub fn label(&self) -> &'static str {
        match self {
            AsoStatus::Valid => "Válido",
            AsoStatus::Near => "Próximo",
            AsoStatus::Summon => "Convocar",
            AsoStatus::Urgent => "Urgente",
            AsoStatus::Expired => "Vencido",
        }
    }

    /// Accepts the English names as well as the Portuguese labels the store view may emit.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL.into_iter().find(|status| {
            value.eq_ignore_ascii_case(status.as_str()) || value.eq_ignore_ascii_case(status.label())
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AsoStatus::Valid => "Valid",
            AsoStatus::Near => "Near",
            AsoStatus::Summon => "Summon",
            AsoStatus::Urgent => "Urgent",
            AsoStatus::Expired => "Expired",
        }
    }
}

pub fn days_remaining(expiration: NaiveDate, today: NaiveDate) -> i64 {
    (expiration - today).num_days()
}

/// Expiration used when the store has not computed one: one year after the last exam.
pub fn expiration_from_last_aso(last_aso: NaiveDate) -> Option<NaiveDate> {
    last_aso.checked_add_months(Months::new(ASO_VALIDITY_MONTHS))
}
