use chrono::{DateTime, Local, NaiveDate};
use thiserror::Error;

const BR_FORMAT: &str = "%d/%m/%Y";
const ISO_FORMAT: &str = "%Y-%m-%d";

/// Spreadsheet serial day numbers count from 1899-12-30; 25569 is 1970-01-01.
const EXCEL_UNIX_EPOCH_SERIAL: f64 = 25569.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Error, Debug, PartialEq)]
pub enum DateError {
    #[error("Data inválida: '{0}' (use DD/MM/AAAA)")]
    InvalidBrDate(String),

    #[error("Data inválida: '{0}' (use AAAA-MM-DD)")]
    InvalidIsoDate(String),

    #[error("Data de planilha fora do intervalo: {0}")]
    SerialOutOfRange(f64),
}

/// Server-local calendar day
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Parses "DD/MM/YYYY"
pub fn parse_br_date(input: &str) -> Result<NaiveDate, DateError> {
    let trimmed = input.trim();
    let mut parts = trimmed.split('/');

    let (Some(day), Some(month), Some(year), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(DateError::InvalidBrDate(input.to_string()));
    };

    // chrono accepts 1-digit fields; the year must be spelled out in full
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if year.len() != 4 || !digits(day) || !digits(month) || !digits(year) {
        return Err(DateError::InvalidBrDate(input.to_string()));
    }

    let parse = |s: &str| s.parse::<u32>().ok();
    match (parse(day), parse(month), year.parse::<i32>().ok()) {
        (Some(d), Some(m), Some(y)) => NaiveDate::from_ymd_opt(y, m, d)
            .ok_or_else(|| DateError::InvalidBrDate(input.to_string())),
        _ => Err(DateError::InvalidBrDate(input.to_string())),
    }
}

pub fn format_br_date(date: NaiveDate) -> String {
    date.format(BR_FORMAT).to_string()
}

pub fn parse_iso_date(input: &str) -> Result<NaiveDate, DateError> {
    NaiveDate::parse_from_str(input.trim(), ISO_FORMAT)
        .map_err(|_| DateError::InvalidIsoDate(input.to_string()))
}

pub fn format_iso_date(date: NaiveDate) -> String {
    date.format(ISO_FORMAT).to_string()
}

/// "25/10/2023" -> "2023-10-25"
pub fn br_to_iso(input: &str) -> Result<String, DateError> {
    parse_br_date(input).map(format_iso_date)
}

/// "2023-10-25" -> "25/10/2023"
pub fn iso_to_br(input: &str) -> Result<String, DateError> {
    parse_iso_date(input).map(format_br_date)
}

/// Accepts either DD/MM/YYYY or YYYY-MM-DD
pub fn parse_flexible_date(input: &str) -> Result<NaiveDate, DateError> {
    if input.contains('/') {
        parse_br_date(input)
    } else {
        parse_iso_date(input)
    }
}

/// Optional date formatted for display, "-" when absent
pub fn display_date(date: Option<NaiveDate>) -> String {
    date.map(format_br_date).unwrap_or_else(|| "-".to_string())
}

/// Converts a spreadsheet serial day number to a date. The fraction is the time
/// of day (UTC) and is dropped, not rounded.
pub fn from_excel_serial(serial: f64) -> Result<NaiveDate, DateError> {
    if !serial.is_finite() || serial < 0.0 {
        return Err(DateError::SerialOutOfRange(serial));
    }

    let seconds = ((serial - EXCEL_UNIX_EPOCH_SERIAL) * SECONDS_PER_DAY).round() as i64;
    DateTime::from_timestamp(seconds, 0)
        .map(|instant| instant.date_naive())
        .ok_or(DateError::SerialOutOfRange(serial))
}
