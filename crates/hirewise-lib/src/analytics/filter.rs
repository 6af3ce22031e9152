//! Record filters and the options offered for them

use crate::models::{CanonicalRecord, CategoricalField};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Categorical fields offered as dashboard filters
pub const FILTERABLE_FIELDS: [CategoricalField; 4] = [
    CategoricalField::HiringManager,
    CategoricalField::TaPartner,
    CategoricalField::Country,
    CategoricalField::Project,
];

/// Multi-select filters ANDed across fields plus an inclusive creation-date range
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Allowed values per field; an empty set matches everything
    #[serde(default)]
    pub categories: BTreeMap<CategoricalField, BTreeSet<String>>,
    #[serde(default)]
    pub date_from: Option<NaiveDate>,
    #[serde(default)]
    pub date_to: Option<NaiveDate>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<I, S>(mut self, field: CategoricalField, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories
            .entry(field)
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn between(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.categories.values().all(BTreeSet::is_empty)
            && self.date_from.is_none()
            && self.date_to.is_none()
    }

    /// A record without a creation date fails any date bound
    pub fn matches(&self, record: &CanonicalRecord) -> bool {
        let categories_match = self
            .categories
            .iter()
            .all(|(field, allowed)| allowed.is_empty() || allowed.contains(field.value(record)));
        if !categories_match {
            return false;
        }

        if self.date_from.is_none() && self.date_to.is_none() {
            return true;
        }
        let Some(created) = record.pos_created else {
            return false;
        };
        self.date_from.map_or(true, |from| created >= from)
            && self.date_to.map_or(true, |to| created <= to)
    }

    pub fn apply<'a>(&self, records: &'a [CanonicalRecord]) -> Vec<&'a CanonicalRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub min: NaiveDate,
    pub max: NaiveDate,
}

/// Values a dashboard can filter on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterOptions {
    /// Sorted unique values per filterable field
    pub fields: BTreeMap<CategoricalField, Vec<String>>,
    /// Creation-date span, absent when no record has a date
    pub date_range: Option<DateRange>,
}

pub fn filter_options(records: &[CanonicalRecord]) -> FilterOptions {
    let fields = FILTERABLE_FIELDS
        .iter()
        .map(|field| {
            let values: BTreeSet<&str> = records.iter().map(|r| field.value(r)).collect();
            (*field, values.into_iter().map(str::to_string).collect())
        })
        .collect();

    let dates = records.iter().filter_map(|r| r.pos_created);
    let date_range = dates
        .clone()
        .min()
        .zip(dates.max())
        .map(|(min, max)| DateRange { min, max });

    FilterOptions { fields, date_range }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(ta: &str, country: &str, created: Option<NaiveDate>) -> CanonicalRecord {
        CanonicalRecord {
            ta_partner: ta.to_string(),
            country: country.to_string(),
            pos_created: created,
            ..Default::default()
        }
    }

    fn records() -> Vec<CanonicalRecord> {
        vec![
            record("Alice", "US", Some(ymd(2024, 1, 10))),
            record("Bob", "US", Some(ymd(2024, 3, 5))),
            record("Alice", "UK", Some(ymd(2024, 6, 20))),
            record("Cara", "UK", None),
        ]
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = FilterSpec::new().with(CategoricalField::Country, Vec::<String>::new());
        assert!(filter.is_empty());
        assert_eq!(filter.apply(&records()).len(), 4);
    }

    #[test]
    fn test_fields_are_anded() {
        let filter = FilterSpec::new()
            .with(CategoricalField::TaPartner, ["Alice", "Bob"])
            .with(CategoricalField::Country, ["US"]);
        let data = records();
        let matched = filter.apply(&data);
        assert_eq!(matched.len(), 2);
        assert!(matched.iter().all(|r| r.country == "US"));
    }

    #[test]
    fn test_date_range_is_inclusive_and_excludes_undated() {
        let filter = FilterSpec::new().between(Some(ymd(2024, 3, 5)), Some(ymd(2024, 6, 20)));
        let data = records();
        let matched = filter.apply(&data);
        assert_eq!(matched.len(), 2);
        assert!(matched.iter().all(|r| r.pos_created.is_some()));
    }

    #[test]
    fn test_filter_deserializes_from_json() {
        let filter: FilterSpec = serde_json::from_str(
            r#"{"categories": {"ta_partner": ["Alice"]}, "date_from": "2024-02-01"}"#,
        )
        .unwrap();
        assert_eq!(filter.apply(&records()).len(), 1);
    }

    #[test]
    fn test_filter_options() {
        let options = filter_options(&records());
        assert_eq!(
            options.fields[&CategoricalField::TaPartner],
            vec!["Alice", "Bob", "Cara"]
        );
        assert_eq!(
            options.fields[&CategoricalField::HiringManager],
            vec!["Unknown"]
        );
        assert_eq!(
            options.date_range,
            Some(DateRange {
                min: ymd(2024, 1, 10),
                max: ymd(2024, 6, 20)
            })
        );
        assert_eq!(filter_options(&[]).date_range, None);
    }
}
