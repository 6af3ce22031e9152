//! Core data models for the recruitment insights engine

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Sentinel substituted for missing or unmapped categorical values
pub const UNKNOWN: &str = "Unknown";

/// Identifier of one ingested upload
pub type UploadId = u64;

/// Which kind of recruitment sheet a table came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetKind {
    /// Filled positions with outcome dates and salaries
    Hired,
    /// Open positions still in the funnel
    #[serde(alias = "final")]
    Pipeline,
}

impl SheetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SheetKind::Hired => "hired",
            SheetKind::Pipeline => "pipeline",
        }
    }
}

impl fmt::Display for SheetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SheetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hired" => Ok(SheetKind::Hired),
            "pipeline" | "final" => Ok(SheetKind::Pipeline),
            other => Err(format!("unknown sheet kind '{}'", other)),
        }
    }
}

/// One raw spreadsheet cell before coercion
///
/// Untagged so JSON position payloads (`{"Role": "Engineer", "Max Budgeted Salary": 90000}`)
/// deserialize directly. Date-shaped strings become `Date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Empty,
    Number(f64),
    Date(NaiveDate),
    Text(String),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value.to_string())
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<NaiveDate> for Cell {
    fn from(value: NaiveDate) -> Self {
        Cell::Date(value)
    }
}

/// A header row plus data rows with arbitrary column names
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Categorical attributes of a position; each is non-null after normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalField {
    HiringManager,
    TaPartner,
    SourcingPartner,
    Country,
    Project,
    BusinessLine,
    Role,
    JobState,
    Department,
    Location,
    Currency,
}

impl CategoricalField {
    pub const ALL: [CategoricalField; 11] = [
        CategoricalField::HiringManager,
        CategoricalField::TaPartner,
        CategoricalField::SourcingPartner,
        CategoricalField::Country,
        CategoricalField::Project,
        CategoricalField::BusinessLine,
        CategoricalField::Role,
        CategoricalField::JobState,
        CategoricalField::Department,
        CategoricalField::Location,
        CategoricalField::Currency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoricalField::HiringManager => "hiring_manager",
            CategoricalField::TaPartner => "ta_partner",
            CategoricalField::SourcingPartner => "sourcing_partner",
            CategoricalField::Country => "country",
            CategoricalField::Project => "project",
            CategoricalField::BusinessLine => "business_line",
            CategoricalField::Role => "role",
            CategoricalField::JobState => "job_state",
            CategoricalField::Department => "department",
            CategoricalField::Location => "location",
            CategoricalField::Currency => "currency",
        }
    }

    /// Read this field from a record
    pub fn value<'a>(&self, record: &'a CanonicalRecord) -> &'a str {
        match self {
            CategoricalField::HiringManager => &record.hiring_manager,
            CategoricalField::TaPartner => &record.ta_partner,
            CategoricalField::SourcingPartner => &record.sourcing_partner,
            CategoricalField::Country => &record.country,
            CategoricalField::Project => &record.project,
            CategoricalField::BusinessLine => &record.business_line,
            CategoricalField::Role => &record.role,
            CategoricalField::JobState => &record.job_state,
            CategoricalField::Department => &record.department,
            CategoricalField::Location => &record.location,
            CategoricalField::Currency => &record.currency,
        }
    }

    pub(crate) fn slot<'a>(&self, record: &'a mut CanonicalRecord) -> &'a mut String {
        match self {
            CategoricalField::HiringManager => &mut record.hiring_manager,
            CategoricalField::TaPartner => &mut record.ta_partner,
            CategoricalField::SourcingPartner => &mut record.sourcing_partner,
            CategoricalField::Country => &mut record.country,
            CategoricalField::Project => &mut record.project,
            CategoricalField::BusinessLine => &mut record.business_line,
            CategoricalField::Role => &mut record.role,
            CategoricalField::JobState => &mut record.job_state,
            CategoricalField::Department => &mut record.department,
            CategoricalField::Location => &mut record.location,
            CategoricalField::Currency => &mut record.currency,
        }
    }
}

impl fmt::Display for CategoricalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoricalField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoricalField::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| format!("unknown categorical field '{}'", s))
    }
}

/// One recruitment position instance, hired or open
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub req_id: Option<String>,
    pub position_title: Option<String>,

    pub hiring_manager: String,
    pub ta_partner: String,
    pub sourcing_partner: String,
    pub country: String,
    pub project: String,
    pub business_line: String,
    pub role: String,
    pub job_state: String,
    pub department: String,
    pub location: String,
    pub currency: String,

    pub cvs_shared: f64,
    pub interviews_1st: f64,
    pub interviews_final: f64,
    pub offers: f64,
    pub accepted: f64,

    pub max_budget: Option<f64>,
    pub accepted_salary: Option<f64>,

    pub pos_created: Option<NaiveDate>,
    pub filled_date: Option<NaiveDate>,
    pub offer_date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,

    pub time_to_fill: Option<i64>,
    pub salary_delta: Option<f64>,
    pub budget_variance_pct: Option<f64>,
    pub position_age: Option<i64>,
    pub cv_to_interview_rate: f64,
    pub interview_to_offer_rate: f64,
    pub offer_to_accept_rate: f64,

    /// Source columns that matched no canonical field, keyed by normalized header
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Default for CanonicalRecord {
    fn default() -> Self {
        Self {
            req_id: None,
            position_title: None,
            hiring_manager: UNKNOWN.to_string(),
            ta_partner: UNKNOWN.to_string(),
            sourcing_partner: UNKNOWN.to_string(),
            country: UNKNOWN.to_string(),
            project: UNKNOWN.to_string(),
            business_line: UNKNOWN.to_string(),
            role: UNKNOWN.to_string(),
            job_state: UNKNOWN.to_string(),
            department: UNKNOWN.to_string(),
            location: UNKNOWN.to_string(),
            currency: UNKNOWN.to_string(),
            cvs_shared: 0.0,
            interviews_1st: 0.0,
            interviews_final: 0.0,
            offers: 0.0,
            accepted: 0.0,
            max_budget: None,
            accepted_salary: None,
            pos_created: None,
            filled_date: None,
            offer_date: None,
            start_date: None,
            time_to_fill: None,
            salary_delta: None,
            budget_variance_pct: None,
            position_age: None,
            cv_to_interview_rate: 0.0,
            interview_to_offer_rate: 0.0,
            offer_to_accept_rate: 0.0,
            extra: BTreeMap::new(),
        }
    }
}

impl CanonicalRecord {
    /// Whether the position ended with at least one accepted offer
    pub fn is_success(&self) -> bool {
        self.accepted > 0.0
    }
}

/// Records produced from one sheet of one upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadBatch {
    pub kind: SheetKind,
    pub records: Vec<CanonicalRecord>,
    #[serde(default)]
    pub diagnostics: Vec<String>,
}

/// One ingested spreadsheet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Upload {
    pub id: UploadId,
    pub source_name: String,
    /// Hex SHA-256 of the uploaded bytes
    pub fingerprint: String,
    pub uploaded_at: DateTime<Utc>,
    pub batches: Vec<UploadBatch>,
}

impl Upload {
    pub fn batch(&self, kind: SheetKind) -> Option<&UploadBatch> {
        self.batches.iter().find(|b| b.kind == kind)
    }

    pub fn has_kind(&self, kind: SheetKind) -> bool {
        self.batch(kind).is_some()
    }
}

/// Summary of an upload without its records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSummary {
    pub id: UploadId,
    pub source_name: String,
    pub fingerprint: String,
    pub uploaded_at: DateTime<Utc>,
    pub hired_records: usize,
    pub pipeline_records: usize,
}

impl From<&Upload> for UploadSummary {
    fn from(upload: &Upload) -> Self {
        let count = |kind| upload.batch(kind).map(|b| b.records.len()).unwrap_or(0);
        Self {
            id: upload.id,
            source_name: upload.source_name.clone(),
            fingerprint: upload.fingerprint.clone(),
            uploaded_at: upload.uploaded_at,
            hired_records: count(SheetKind::Hired),
            pipeline_records: count(SheetKind::Pipeline),
        }
    }
}
