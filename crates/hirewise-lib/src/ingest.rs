//! Spreadsheet ingestion
//!
//! Turns uploaded bytes into sheet-kind-tagged raw tables, then into
//! normalized, metric-enriched upload batches.

use crate::derived::derive_metrics;
use crate::error::IngestError;
use crate::models::{Cell, RawTable, SheetKind, UploadBatch};
use crate::schema::{coerce, normalize_table};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::io::Cursor;
use tracing::debug;

/// Lowercase hex SHA-256 of the uploaded bytes
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Which table a workbook sheet feeds, by its trimmed case-insensitive name
pub fn classify_sheet(name: &str) -> Option<SheetKind> {
    match name.trim().to_ascii_lowercase().as_str() {
        "hired" => Some(SheetKind::Hired),
        "final" | "pipeline" => Some(SheetKind::Pipeline),
        _ => None,
    }
}

pub fn is_csv(filename: &str) -> bool {
    filename.trim().to_ascii_lowercase().ends_with(".csv")
}

/// Read raw tables from an upload, dispatching on the file name
///
/// CSV files carry a single table and need `kind`; everything else is
/// opened as a workbook and classified by sheet name.
pub fn read_upload(
    filename: &str,
    bytes: &[u8],
    kind: Option<SheetKind>,
) -> Result<Vec<(SheetKind, RawTable)>, IngestError> {
    if bytes.is_empty() {
        return Err(IngestError::Empty);
    }
    if is_csv(filename) {
        let kind = kind.ok_or(IngestError::MissingKind)?;
        return Ok(vec![(kind, read_csv(bytes)?)]);
    }
    read_workbook(bytes)
}

/// Read the `Hired` and `Final`/`Pipeline` sheets of an in-memory workbook
///
/// When two sheets map to the same kind the first one wins.
pub fn read_workbook(bytes: &[u8]) -> Result<Vec<(SheetKind, RawTable)>, IngestError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| IngestError::UnreadableWorkbook(e.to_string()))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let mut tables: Vec<(SheetKind, RawTable)> = Vec::new();

    for name in &sheet_names {
        let Some(kind) = classify_sheet(name) else {
            debug!(sheet = %name, "Ignoring unrecognized sheet");
            continue;
        };
        if tables.iter().any(|(k, _)| *k == kind) {
            debug!(sheet = %name, kind = %kind, "Ignoring second sheet of same kind");
            continue;
        }

        let range = workbook
            .worksheet_range(name)
            .map_err(|e| IngestError::UnreadableWorkbook(format!("sheet '{}': {}", name, e)))?;

        let rows: Vec<Vec<Cell>> = range
            .rows()
            .map(|row| row.iter().map(cell_from_data).collect())
            .collect();
        tables.push((kind, table_from_rows(rows)));
    }

    if tables.is_empty() {
        return Err(IngestError::NoUsableSheet);
    }
    Ok(tables)
}

/// Read a single CSV table; the first non-empty row is the header
pub fn read_csv(bytes: &[u8]) -> Result<RawTable, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(Cell::from).collect());
    }
    Ok(table_from_rows(rows))
}

/// Normalize a raw table and compute its derived metrics
pub fn prepare_batch(table: &RawTable, kind: SheetKind, today: NaiveDate) -> UploadBatch {
    let mut normalized = normalize_table(table, kind);
    derive_metrics(&mut normalized.records, kind, today);
    UploadBatch {
        kind,
        records: normalized.records,
        diagnostics: normalized.diagnostics.iter().map(|d| d.to_string()).collect(),
    }
}

fn table_from_rows(rows: Vec<Vec<Cell>>) -> RawTable {
    let mut rows = rows.into_iter().skip_while(|row| row.iter().all(Cell::is_empty));
    let headers = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| coerce::text(cell).unwrap_or_default())
            .collect(),
        None => return RawTable::default(),
    };

    let mut table = RawTable::new(headers);
    for row in rows.filter(|row| !row.iter().all(Cell::is_empty)) {
        table.push_row(row);
    }
    table
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) => Cell::text(s.clone()),
        Data::Float(n) => Cell::Number(*n),
        Data::Int(n) => Cell::Number(*n as f64),
        Data::Bool(b) => Cell::text(b.to_string()),
        Data::DateTime(dt) => coerce::excel_serial_to_date(dt.as_f64())
            .map(Cell::Date)
            .unwrap_or_default(),
        Data::DateTimeIso(s) => coerce::date(&Cell::text(s.clone()))
            .map(Cell::Date)
            .unwrap_or_else(|| Cell::text(s.clone())),
        Data::DurationIso(s) => Cell::text(s.clone()),
    }
}
