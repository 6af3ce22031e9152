//! Canonical field table
//!
//! Each canonical field lists the compact keys of every header spelling it
//! accepts. Fields with several accepted spellings are the synonym groups.

use super::headers::compact_key;
use crate::models::{CategoricalField, SheetKind};

/// Where a matched column's value lands in the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTarget {
    ReqId,
    PositionTitle,
    Categorical(CategoricalField),
    Count(CountField),
    Money(MoneyField),
    Date(DateField),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountField {
    CvsShared,
    Interviews1st,
    InterviewsFinal,
    Offers,
    Accepted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoneyField {
    MaxBudget,
    AcceptedSalary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    PosCreated,
    FilledDate,
    OfferDate,
    StartDate,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Canonical snake-case name
    pub name: &'static str,
    /// Display header as it appears after normalization
    pub header: &'static str,
    /// Extra accepted spellings besides `name` and `header`
    pub synonyms: &'static [&'static str],
    pub target: FieldTarget,
    /// Only hired sheets carry this field
    pub hired_only: bool,
}

impl FieldSpec {
    /// Whether a normalized header's compact key names this field
    pub fn accepts(&self, compact: &str) -> bool {
        compact_key(self.name) == compact
            || compact_key(self.header) == compact
            || self.synonyms.iter().any(|s| compact_key(s) == compact)
    }

    pub fn applies_to(&self, kind: SheetKind) -> bool {
        !self.hired_only || kind == SheetKind::Hired
    }
}

const fn spec(
    name: &'static str,
    header: &'static str,
    target: FieldTarget,
) -> FieldSpec {
    FieldSpec {
        name,
        header,
        synonyms: &[],
        target,
        hired_only: false,
    }
}

const fn hired(name: &'static str, header: &'static str, target: FieldTarget) -> FieldSpec {
    FieldSpec {
        name,
        header,
        synonyms: &[],
        target,
        hired_only: true,
    }
}

use CategoricalField as C;
use FieldTarget as T;

pub const FIELD_TABLE: &[FieldSpec] = &[
    spec("req_id", "Req ID", T::ReqId),
    spec("position_title", "Position Title", T::PositionTitle),
    spec("pos_created", "Position Created Date", T::Date(DateField::PosCreated)),
    spec("hiring_manager", "Hiring Manager", T::Categorical(C::HiringManager)),
    FieldSpec {
        name: "ta_partner",
        header: "TA Partner",
        synonyms: &["TAPartner", "Ta_Partner"],
        target: T::Categorical(C::TaPartner),
        hired_only: false,
    },
    FieldSpec {
        name: "sourcing_partner",
        header: "Sourcing Partner",
        synonyms: &["SourcingPartner", "Sourcing_Partner", "Source Partner"],
        target: T::Categorical(C::SourcingPartner),
        hired_only: false,
    },
    spec("country", "Country", T::Categorical(C::Country)),
    spec("project", "Project", T::Categorical(C::Project)),
    spec("business_line", "Business Line", T::Categorical(C::BusinessLine)),
    spec("role", "Role", T::Categorical(C::Role)),
    spec("job_state", "Job State", T::Categorical(C::JobState)),
    spec("department", "Department", T::Categorical(C::Department)),
    spec("location", "Location", T::Categorical(C::Location)),
    spec("currency", "Currency", T::Categorical(C::Currency)),
    spec("cvs_shared", "Number Of CVs Shared", T::Count(CountField::CvsShared)),
    spec("interviews_1st", "Number Of 1st Interviews", T::Count(CountField::Interviews1st)),
    spec("interviews_final", "Number Of Final Interviews", T::Count(CountField::InterviewsFinal)),
    spec("offers", "Number Of Offers", T::Count(CountField::Offers)),
    spec("accepted", "Number Of Accepted Offers", T::Count(CountField::Accepted)),
    spec("max_budget", "Max Budgeted Salary", T::Money(MoneyField::MaxBudget)),
    hired("filled_date", "Filled Date", T::Date(DateField::FilledDate)),
    hired("accepted_salary", "Accepted Salary", T::Money(MoneyField::AcceptedSalary)),
    hired("offer_date", "Offer Date", T::Date(DateField::OfferDate)),
    hired("start_date", "Start Date", T::Date(DateField::StartDate)),
];

/// Look up the field a normalized header maps to for this sheet kind
pub fn lookup(normalized_header: &str, kind: SheetKind) -> Option<&'static FieldSpec> {
    let compact = compact_key(normalized_header);
    if compact.is_empty() {
        return None;
    }
    FIELD_TABLE
        .iter()
        .filter(|f| f.applies_to(kind))
        .find(|f| f.accepts(&compact))
}
