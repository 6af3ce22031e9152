//! Derived recruitment metrics
//!
//! Pure functions of normalized records: time-to-fill, budget variance,
//! position age, and stage conversion rates. Negative time-to-fill values
//! (filled before created) are preserved as a data-quality signal.

use crate::models::{CanonicalRecord, SheetKind};
use chrono::NaiveDate;

/// Compute every derived field applicable to this sheet kind, in place
///
/// `today` anchors `position_age` for open positions.
pub fn derive_metrics(records: &mut [CanonicalRecord], kind: SheetKind, today: NaiveDate) {
    for record in records.iter_mut() {
        derive_record(record, kind, today);
    }
}

pub fn derive_record(record: &mut CanonicalRecord, kind: SheetKind, today: NaiveDate) {
    match kind {
        SheetKind::Hired => {
            record.time_to_fill = days_between(record.pos_created, record.filled_date);
            record.salary_delta = match (record.accepted_salary, record.max_budget) {
                (Some(salary), Some(budget)) => Some(salary - budget),
                _ => None,
            };
            record.budget_variance_pct = budget_variance_pct(record.accepted_salary, record.max_budget);
            record.position_age = None;
        }
        SheetKind::Pipeline => {
            record.time_to_fill = None;
            record.salary_delta = None;
            record.budget_variance_pct = None;
            record.position_age = days_between(record.pos_created, Some(today));
        }
    }

    record.cv_to_interview_rate = conversion_rate(record.interviews_1st, record.cvs_shared);
    record.interview_to_offer_rate = conversion_rate(record.offers, record.interviews_1st);
    record.offer_to_accept_rate = conversion_rate(record.accepted, record.offers);
}

/// Whole days from `start` to `end`; negative when `end` precedes `start`
pub fn days_between(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Option<i64> {
    Some((end? - start?).num_days())
}

/// (salary - budget) / budget * 100; null for a zero or missing budget
pub fn budget_variance_pct(accepted_salary: Option<f64>, max_budget: Option<f64>) -> Option<f64> {
    let salary = accepted_salary?;
    let budget = max_budget?;
    if budget == 0.0 {
        return None;
    }
    let pct = (salary - budget) / budget * 100.0;
    pct.is_finite().then_some(pct)
}

/// successor / predecessor * 100; exactly 0 when the predecessor is 0
pub fn conversion_rate(successor: f64, predecessor: f64) -> f64 {
    if predecessor > 0.0 {
        successor / predecessor * 100.0
    } else {
        0.0
    }
}
