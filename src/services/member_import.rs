use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::backend::{BackendClient, BackendError};
use crate::models::member::MEMBERS_TABLE;
use crate::services::dates::{from_excel_serial, parse_flexible_date, parse_iso_date, DateError};

pub const CPF_LEN: usize = 11;

const COL_CPF: &str = "cpf";
const COL_NAME: &str = "nome";
const COL_ROLE: &str = "cargo";
const COL_UNIT: &str = "unidade";
const COL_LAST_ASO: &str = "data ultimo aso";

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Erro ao processar o arquivo Excel: {0}")]
    Workbook(String),

    #[error("Arquivo vazio ou inválido.")]
    Empty,

    #[error("Nenhum dado válido encontrado (Verifique se as colunas Nome e CPF existem).")]
    NoValidRows,

    #[error("CPF repetido na planilha: {}", .0.join(", "))]
    DuplicateCpf(Vec<String>),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

/// One spreadsheet row keyed by normalized header
pub type SheetRow = HashMap<String, Data>;

/// A member row ready for upsert, keyed on CPF
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportedMember {
    pub cpf: String,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "cargo")]
    pub role: Option<String>,
    #[serde(rename = "unidade")]
    pub unit: Option<String>,
    #[serde(rename = "data_ultimo_aso")]
    pub last_aso_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportBatch {
    pub members: Vec<ImportedMember>,
    pub rows_read: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub rows_read: usize,
    pub imported: usize,
    pub skipped: usize,
}

/// Reads the first sheet of an .xlsx/.xls/.ods file
pub fn read_sheet(bytes: &[u8]) -> Result<Vec<SheetRow>, ImportError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ImportError::Workbook(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ImportError::Empty)?
        .map_err(|e| ImportError::Workbook(e.to_string()))?;

    Ok(rows_from_cells(range.rows()))
}

/// First row is the header; blank rows are dropped
pub fn rows_from_cells<'a>(mut cells: impl Iterator<Item = &'a [Data]>) -> Vec<SheetRow> {
    let Some(header) = cells.next() else {
        return Vec::new();
    };

    let columns: Vec<Option<String>> = header
        .iter()
        .map(|cell| cell_text(cell).map(|name| normalize_header(&name)))
        .collect();

    cells
        .map(|row| {
            columns
                .iter()
                .zip(row.iter())
                .filter_map(|(column, cell)| match (column, cell) {
                    (Some(column), cell) if !is_blank(cell) => Some((column.clone(), cell.clone())),
                    _ => None,
                })
                .collect::<SheetRow>()
        })
        .filter(|row| !row.is_empty())
        .collect()
}

/// "Data Último ASO " -> "data ultimo aso"
pub fn normalize_header(header: &str) -> String {
    header
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .replace('ú', "u")
}

/// Keeps digits only and left-pads to 11; `None` when nothing usable is left
pub fn normalize_cpf(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() || digits.len() > CPF_LEN {
        return None;
    }
    Some(format!("{:0>width$}", digits, width = CPF_LEN))
}

fn is_blank(cell: &Data) -> bool {
    cell_text(cell).is_none()
}

fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        // Numeric CPFs lose their leading zeros; padding restores them
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        _ => String::new(),
    };

    Some(text).filter(|t| !t.is_empty())
}

/// Spreadsheet serial numbers or DD/MM/YYYY text
fn cell_date(cell: &Data) -> Result<Option<NaiveDate>, DateError> {
    match cell {
        Data::Float(f) => from_excel_serial(*f).map(Some),
        Data::Int(i) => from_excel_serial(*i as f64).map(Some),
        Data::DateTime(dt) => from_excel_serial(dt.as_f64()).map(Some),
        Data::DateTimeIso(s) => parse_iso_date(s.get(..10).unwrap_or(s)).map(Some),
        Data::String(s) if s.trim().is_empty() => Ok(None),
        Data::String(s) => parse_flexible_date(s).map(Some),
        _ => Ok(None),
    }
}

fn text_column(row: &SheetRow, column: &str) -> Option<String> {
    row.get(column).and_then(cell_text)
}

/// `None` means the row is skipped
pub fn normalize_row(row: &SheetRow) -> Option<ImportedMember> {
    let cpf = text_column(row, COL_CPF).and_then(|raw| normalize_cpf(&raw));
    let name = text_column(row, COL_NAME);

    let (Some(cpf), Some(name)) = (cpf, name) else {
        tracing::debug!(?row, "Skipping row without usable CPF or name");
        return None;
    };

    let last_aso_date = match row.get(COL_LAST_ASO).map(cell_date).transpose() {
        Ok(date) => date.flatten(),
        Err(e) => {
            tracing::warn!(cpf = %cpf, error = %e, "Skipping row with unreadable ASO date");
            return None;
        }
    };

    Some(ImportedMember {
        cpf,
        name,
        role: text_column(row, COL_ROLE),
        unit: text_column(row, COL_UNIT),
        last_aso_date,
    })
}

/// CPFs that appear more than once, sorted
pub fn duplicate_cpfs(members: &[ImportedMember]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates = BTreeSet::new();
    for member in members {
        if !seen.insert(member.cpf.as_str()) {
            duplicates.insert(member.cpf.clone());
        }
    }
    duplicates.into_iter().collect()
}

/// Validates sheet rows into an upsert batch
pub fn normalize_rows(rows: &[SheetRow]) -> Result<ImportBatch, ImportError> {
    if rows.is_empty() {
        return Err(ImportError::Empty);
    }

    let members: Vec<ImportedMember> = rows.iter().filter_map(normalize_row).collect();
    if members.is_empty() {
        return Err(ImportError::NoValidRows);
    }

    let duplicates = duplicate_cpfs(&members);
    if !duplicates.is_empty() {
        return Err(ImportError::DuplicateCpf(duplicates));
    }

    Ok(ImportBatch {
        skipped: rows.len() - members.len(),
        rows_read: rows.len(),
        members,
    })
}

/// Parses a spreadsheet and upserts its members on CPF
pub async fn import_members(
    backend: &BackendClient,
    token: &str,
    bytes: &[u8],
) -> Result<ImportReport, ImportError> {
    let rows = read_sheet(bytes)?;
    let batch = normalize_rows(&rows)?;

    tracing::info!(
        rows_read = batch.rows_read,
        valid = batch.members.len(),
        skipped = batch.skipped,
        "Spreadsheet processed, upserting members"
    );

    backend
        .upsert(token, MEMBERS_TABLE, &batch.members, COL_CPF)
        .await?;

    Ok(ImportReport {
        rows_read: batch.rows_read,
        imported: batch.members.len(),
        skipped: batch.skipped,
    })
}
