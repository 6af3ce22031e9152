//! Schema reconciliation
//!
//! Maps spreadsheets with arbitrary column spellings onto [`CanonicalRecord`]s:
//! - header normalization through a declarative word-rule table
//! - synonym collapse and canonical field mapping per sheet kind
//! - lossless retention of unmatched columns, reported as diagnostics

pub mod coerce;
pub mod fields;
pub mod headers;

pub use fields::{lookup, FieldSpec, FieldTarget, FIELD_TABLE};
pub use headers::{compact_key, normalize_header};

use crate::models::{CanonicalRecord, CategoricalField, Cell, RawTable, SheetKind, UNKNOWN};
use fields::{CountField, DateField, MoneyField};
use std::collections::BTreeSet;
use std::fmt;

/// Non-fatal findings from normalizing one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Column matched no canonical field; its values sit in `extra` under `key`
    UnmatchedColumn { header: String, key: String },
    /// A second spelling of an already-mapped field; kept in `extra` under `key`
    DuplicateColumn {
        field: &'static str,
        header: String,
        key: String,
    },
    /// No column for this categorical field; every record carries "Unknown"
    DefaultedField { field: CategoricalField },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnmatchedColumn { header, key } => {
                write!(f, "unmatched column '{}' kept as extra '{}'", header, key)
            }
            Diagnostic::DuplicateColumn { field, header, key } => write!(
                f,
                "column '{}' duplicates field '{}', kept as extra '{}'",
                header, field, key
            ),
            Diagnostic::DefaultedField { field } => {
                write!(f, "no column for '{}', defaulted to {}", field, UNKNOWN)
            }
        }
    }
}

/// Output of normalizing one raw table
#[derive(Debug, Clone)]
pub struct NormalizedTable {
    pub kind: SheetKind,
    pub records: Vec<CanonicalRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolution of one source column
#[derive(Debug, Clone)]
enum ColumnPlan {
    Field(&'static FieldSpec),
    Extra(String),
}

/// Normalize a raw table of the given sheet kind into canonical records
///
/// Deterministic and never fatal: unmatched columns survive in `extra`,
/// missing categorical fields become "Unknown", malformed cells are coerced.
/// Fully empty rows are skipped.
pub fn normalize_table(table: &RawTable, kind: SheetKind) -> NormalizedTable {
    let mut diagnostics = Vec::new();
    let mut mapped: BTreeSet<&'static str> = BTreeSet::new();

    let plans: Vec<ColumnPlan> = table
        .headers
        .iter()
        .map(|raw| {
            let normalized = normalize_header(raw);
            match lookup(&normalized, kind) {
                Some(field) => {
                    if mapped.insert(field.name) {
                        return ColumnPlan::Field(field);
                    }
                    diagnostics.push(Diagnostic::DuplicateColumn {
                        field: field.name,
                        header: raw.clone(),
                        key: normalized.clone(),
                    });
                    ColumnPlan::Extra(normalized)
                }
                None => {
                    diagnostics.push(Diagnostic::UnmatchedColumn {
                        header: raw.clone(),
                        key: normalized.clone(),
                    });
                    ColumnPlan::Extra(normalized)
                }
            }
        })
        .collect();

    for field in CategoricalField::ALL {
        let present = FIELD_TABLE
            .iter()
            .any(|f| f.target == FieldTarget::Categorical(field) && mapped.contains(f.name));
        if !present {
            diagnostics.push(Diagnostic::DefaultedField { field });
        }
    }

    let records = table
        .rows
        .iter()
        .filter(|row| !row.iter().all(Cell::is_empty))
        .map(|row| build_record(&plans, row))
        .collect();

    NormalizedTable {
        kind,
        records,
        diagnostics,
    }
}

fn build_record(plans: &[ColumnPlan], row: &[Cell]) -> CanonicalRecord {
    let mut record = CanonicalRecord::default();
    let empty = Cell::Empty;

    for (idx, plan) in plans.iter().enumerate() {
        let cell = row.get(idx).unwrap_or(&empty);
        match plan {
            ColumnPlan::Field(field) => apply_field(&mut record, field.target, cell),
            ColumnPlan::Extra(header) => {
                if let Some(value) = coerce::text(cell) {
                    record.extra.insert(header.clone(), value);
                }
            }
        }
    }

    record
}

fn apply_field(record: &mut CanonicalRecord, target: FieldTarget, cell: &Cell) {
    match target {
        FieldTarget::ReqId => record.req_id = coerce::text(cell),
        FieldTarget::PositionTitle => record.position_title = coerce::text(cell),
        FieldTarget::Categorical(field) => {
            *field.slot(record) = coerce::text(cell).unwrap_or_else(|| UNKNOWN.to_string());
        }
        FieldTarget::Count(field) => {
            let value = coerce::count(cell);
            match field {
                CountField::CvsShared => record.cvs_shared = value,
                CountField::Interviews1st => record.interviews_1st = value,
                CountField::InterviewsFinal => record.interviews_final = value,
                CountField::Offers => record.offers = value,
                CountField::Accepted => record.accepted = value,
            }
        }
        FieldTarget::Money(field) => {
            let value = coerce::money(cell);
            match field {
                MoneyField::MaxBudget => record.max_budget = value,
                MoneyField::AcceptedSalary => record.accepted_salary = value,
            }
        }
        FieldTarget::Date(field) => {
            let value = coerce::date(cell);
            match field {
                DateField::PosCreated => record.pos_created = value,
                DateField::FilledDate => record.filled_date = value,
                DateField::OfferDate => record.offer_date = value,
                DateField::StartDate => record.start_date = value,
            }
        }
    }
}

/// Render records back into a raw table with canonical headers
///
/// Only source fields are written; derived metrics are recomputed on
/// re-ingestion. Extras keep their normalized headers.
pub fn export_table(records: &[CanonicalRecord], kind: SheetKind) -> RawTable {
    let fields: Vec<&FieldSpec> = FIELD_TABLE.iter().filter(|f| f.applies_to(kind)).collect();
    let extra_headers: BTreeSet<&String> = records.iter().flat_map(|r| r.extra.keys()).collect();

    let mut headers: Vec<String> = fields.iter().map(|f| f.name.to_string()).collect();
    headers.extend(extra_headers.iter().map(|h| h.to_string()));
    let mut table = RawTable::new(headers);

    for record in records {
        let mut row: Vec<Cell> = fields.iter().map(|f| export_cell(record, f.target)).collect();
        row.extend(extra_headers.iter().map(|h| {
            record
                .extra
                .get(*h)
                .map(|v| Cell::text(v.clone()))
                .unwrap_or_default()
        }));
        table.push_row(row);
    }
    table
}

fn export_cell(record: &CanonicalRecord, target: FieldTarget) -> Cell {
    let opt_text = |v: &Option<String>| v.clone().map(Cell::Text).unwrap_or_default();
    let opt_num = |v: Option<f64>| v.map(Cell::Number).unwrap_or_default();
    let opt_date = |v: Option<chrono::NaiveDate>| v.map(Cell::Date).unwrap_or_default();

    match target {
        FieldTarget::ReqId => opt_text(&record.req_id),
        FieldTarget::PositionTitle => opt_text(&record.position_title),
        FieldTarget::Categorical(field) => Cell::text(field.value(record)),
        FieldTarget::Count(field) => Cell::Number(match field {
            CountField::CvsShared => record.cvs_shared,
            CountField::Interviews1st => record.interviews_1st,
            CountField::InterviewsFinal => record.interviews_final,
            CountField::Offers => record.offers,
            CountField::Accepted => record.accepted,
        }),
        FieldTarget::Money(MoneyField::MaxBudget) => opt_num(record.max_budget),
        FieldTarget::Money(MoneyField::AcceptedSalary) => opt_num(record.accepted_salary),
        FieldTarget::Date(DateField::PosCreated) => opt_date(record.pos_created),
        FieldTarget::Date(DateField::FilledDate) => opt_date(record.filled_date),
        FieldTarget::Date(DateField::OfferDate) => opt_date(record.offer_date),
        FieldTarget::Date(DateField::StartDate) => opt_date(record.start_date),
    }
}
