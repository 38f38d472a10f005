//! Type-aware record comparison.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::record::{display_text, field_timestamp, resolve_present, Record};

/// Sort direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Active sort column and direction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SortState {
    pub sort_by: String,
    pub sort_direction: SortDirection,
}

/// Comparable projection of a field value
#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Bool(bool),
    Number(f64),
    Text(String),
    /// Anything else (arrays, objects), compared by its lowercased text
    Other(String),
}

impl SortKey {
    fn from_value(value: &Value) -> Option<SortKey> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(SortKey::Bool(*b)),
            Value::Number(n) => n.as_f64().map(SortKey::Number),
            Value::String(s) => Some(SortKey::Text(s.to_lowercase())),
            other => Some(SortKey::Other(other.to_string().to_lowercase())),
        }
    }

    fn text(&self) -> String {
        match self {
            SortKey::Bool(b) => b.to_string(),
            SortKey::Number(n) => n.to_string(),
            SortKey::Text(s) | SortKey::Other(s) => s.clone(),
        }
    }

    fn compare(&self, other: &SortKey) -> Ordering {
        match (self, other) {
            (SortKey::Bool(a), SortKey::Bool(b)) => (*a as u8).cmp(&(*b as u8)),
            (SortKey::Number(a), SortKey::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            (a, b) => a.text().cmp(&b.text()),
        }
    }
}

/// Comparator for one field
pub struct FieldComparator<'a> {
    path: &'a str,
    is_date: bool,
    direction: SortDirection,
}

impl<'a> FieldComparator<'a> {
    pub fn new(path: &'a str, is_date: bool, direction: SortDirection) -> Self {
        Self {
            path,
            is_date,
            direction,
        }
    }

    /// Compare two records.
    ///
    /// Date fields compare as epoch millis with absent or unparseable values at
    /// 0. Other fields put null/absent values last whatever the direction.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        if self.is_date {
            let a = field_timestamp(a, self.path).map_or(0, |ts| ts.timestamp_millis());
            let b = field_timestamp(b, self.path).map_or(0, |ts| ts.timestamp_millis());
            return self.directed(a.cmp(&b));
        }

        let a = resolve_present(a, self.path).and_then(SortKey::from_value);
        let b = resolve_present(b, self.path).and_then(SortKey::from_value);
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => self.directed(a.compare(&b)),
        }
    }

    fn directed(&self, ordering: Ordering) -> Ordering {
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// Stable in-place sort of record references
pub fn sort_records(records: &mut [&Record], state: &SortState, date_fields: &[String]) {
    let comparator = comparator_for(state, date_fields);
    records.sort_by(|a, b| comparator.compare(a, b));
}

/// [`sort_records`] over rows tagged with their position in the source list
pub fn sort_indexed(rows: &mut [(usize, &Record)], state: &SortState, date_fields: &[String]) {
    let comparator = comparator_for(state, date_fields);
    rows.sort_by(|(_, a), (_, b)| comparator.compare(a, b));
}

fn comparator_for<'s>(state: &'s SortState, date_fields: &[String]) -> FieldComparator<'s> {
    let is_date = date_fields.iter().any(|field| field == &state.sort_by);
    FieldComparator::new(&state.sort_by, is_date, state.sort_direction)
}

/// Text used by the search predicate for a field, empty when absent
pub fn search_text(record: &Record, path: &str) -> String {
    resolve_present(record, path)
        .map(display_text)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(field: &str, direction: SortDirection) -> SortState {
        SortState {
            sort_by: field.to_string(),
            sort_direction: direction,
        }
    }

    fn sorted_ids(records: &[Record], state: &SortState, date_fields: &[String]) -> Vec<i64> {
        let mut refs: Vec<&Record> = records.iter().collect();
        sort_records(&mut refs, state, date_fields);
        refs.iter().filter_map(|r| r["id"].as_i64()).collect()
    }

    #[test]
    fn test_strings_sort_case_insensitively() {
        let records = vec![
            json!({"id": 1, "name": "beta"}),
            json!({"id": 2, "name": "Alpha"}),
            json!({"id": 3, "name": "gamma"}),
        ];
        assert_eq!(sorted_ids(&records, &state("name", SortDirection::Asc), &[]), vec![2, 1, 3]);
        assert_eq!(sorted_ids(&records, &state("name", SortDirection::Desc), &[]), vec![3, 1, 2]);
    }

    #[test]
    fn test_nulls_last_in_both_directions() {
        let records = vec![
            json!({"id": 1, "score": null}),
            json!({"id": 2, "score": 5}),
            json!({"id": 3}),
            json!({"id": 4, "score": 1}),
        ];
        assert_eq!(sorted_ids(&records, &state("score", SortDirection::Asc), &[]), vec![4, 2, 1, 3]);
        assert_eq!(sorted_ids(&records, &state("score", SortDirection::Desc), &[]), vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_sort_is_stable() {
        let records = vec![
            json!({"id": 1, "severity": "high"}),
            json!({"id": 2, "severity": "low"}),
            json!({"id": 3, "severity": "HIGH"}),
            json!({"id": 4, "severity": "high"}),
        ];
        assert_eq!(sorted_ids(&records, &state("severity", SortDirection::Asc), &[]), vec![1, 3, 4, 2]);
        assert_eq!(sorted_ids(&records, &state("severity", SortDirection::Desc), &[]), vec![2, 1, 3, 4]);
    }

    #[test]
    fn test_date_fields_compare_as_timestamps() {
        let date_fields = vec!["created_at".to_string()];
        let records = vec![
            json!({"id": 1, "created_at": "2024-02-01"}),
            json!({"id": 2, "created_at": "2023-12-31T23:00:00Z"}),
            json!({"id": 3, "created_at": "bad"}),
            json!({"id": 4, "created_at": "2024-01-15 08:00:00"}),
        ];
        assert_eq!(
            sorted_ids(&records, &state("created_at", SortDirection::Desc), &date_fields),
            vec![1, 4, 2, 3]
        );
        assert_eq!(
            sorted_ids(&records, &state("created_at", SortDirection::Asc), &date_fields),
            vec![3, 2, 4, 1]
        );
    }

    #[test]
    fn test_booleans_and_numbers() {
        let records = vec![
            json!({"id": 1, "active": true, "hits": 10}),
            json!({"id": 2, "active": false, "hits": 9}),
            json!({"id": 3, "active": true, "hits": 100}),
        ];
        assert_eq!(sorted_ids(&records, &state("active", SortDirection::Asc), &[]), vec![2, 1, 3]);
        assert_eq!(sorted_ids(&records, &state("hits", SortDirection::Asc), &[]), vec![2, 1, 3]);
    }

    #[test]
    fn test_nested_paths() {
        let records = vec![
            json!({"id": 1, "keyword": {"name": "zeta"}}),
            json!({"id": 2, "keyword": {"name": "acme"}}),
        ];
        assert_eq!(sorted_ids(&records, &state("keyword.name", SortDirection::Asc), &[]), vec![2, 1]);
        assert_eq!(search_text(&records[0], "keyword.name"), "zeta");
        assert_eq!(search_text(&records[0], "keyword.missing.deeper"), "");
    }
}
