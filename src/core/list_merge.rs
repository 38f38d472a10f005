//! Incremental accumulation of paginated list responses.
//!
//! The first page of a list is shown as soon as it arrives; later pages are
//! appended as they are backfilled. A record that shows up on more than one page
//! (the server list shifted between requests) is kept once, at its first
//! position.

use std::collections::HashSet;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::core::record::{identity_key, Record, DEFAULT_ID_FIELD};

/// Pagination envelope fields reported by the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PageMeta {
    /// Total number of records on the server
    #[serde(default)]
    pub count: Option<usize>,
    /// URL of the next page, `None` on the last page
    #[serde(default)]
    pub next: Option<String>,
    /// URL of the previous page
    #[serde(default)]
    pub previous: Option<String>,
}

/// Paginated response body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page {
    pub results: Vec<Record>,
    #[serde(flatten)]
    pub meta: PageMeta,
}

/// A list endpoint answers either with an envelope or with a bare array
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SourceResponse {
    Paginated(Page),
    Bare(Vec<Record>),
}

/// Accumulated collection plus the latest pagination cursor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PagedList {
    pub records: Vec<Record>,
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
}

/// Merge one incoming page into `existing`.
///
/// With no envelope (`meta == None`) the page replaces the collection. Otherwise
/// incoming records whose id is already known are dropped and the rest are
/// appended in arrival order.
pub fn merge(
    existing: &PagedList,
    incoming: Vec<Record>,
    meta: Option<&PageMeta>,
    id_field: &str,
) -> PagedList {
    let meta = match meta {
        Some(meta) => meta,
        None => {
            return PagedList {
                count: incoming.len(),
                records: incoming,
                next: None,
                previous: None,
            }
        }
    };

    let mut seen: HashSet<String> = existing
        .records
        .iter()
        .map(|record| identity_key(record, id_field))
        .collect();

    let mut records = existing.records.clone();
    let mut dropped = 0u64;
    for record in incoming {
        if seen.insert(identity_key(&record, id_field)) {
            records.push(record);
        } else {
            dropped += 1;
        }
    }

    if dropped > 0 {
        debug!("Dropped {} duplicate records while merging page", dropped);
        metrics::counter!("list_merge_duplicates_dropped_total", dropped);
    }

    PagedList {
        records,
        count: meta.count.unwrap_or(existing.count),
        next: meta.next.clone(),
        previous: meta.previous.clone(),
    }
}

impl PagedList {
    /// Merge a whole response, keyed on the default `id` field
    pub fn absorb(&self, response: SourceResponse) -> PagedList {
        self.absorb_with(response, DEFAULT_ID_FIELD)
    }

    /// Merge a whole response, keyed on `id_field`
    pub fn absorb_with(&self, response: SourceResponse, id_field: &str) -> PagedList {
        match response {
            SourceResponse::Paginated(page) => merge(self, page.results, Some(&page.meta), id_field),
            SourceResponse::Bare(records) => merge(self, records, None, id_field),
        }
    }

    /// Whether the server reported more pages
    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }

    /// Copy of the list without the record identified by `id`.
    pub fn remove(&self, id: &str, id_field: &str) -> PagedList {
        let records: Vec<Record> = self
            .records
            .iter()
            .filter(|record| identity_key(record, id_field) != id)
            .cloned()
            .collect();
        let removed = self.records.len() - records.len();
        PagedList {
            records,
            count: self.count.saturating_sub(removed),
            next: self.next.clone(),
            previous: self.previous.clone(),
        }
    }

    /// Copy of the list with the record sharing `updated`'s id swapped in place.
    pub fn replace(&self, updated: Record, id_field: &str) -> PagedList {
        let key = identity_key(&updated, id_field);
        let records = self
            .records
            .iter()
            .map(|record| {
                if identity_key(record, id_field) == key {
                    updated.clone()
                } else {
                    record.clone()
                }
            })
            .collect();
        PagedList {
            records,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page_meta(count: Option<usize>, next: Option<&str>) -> PageMeta {
        PageMeta {
            count,
            next: next.map(str::to_string),
            previous: None,
        }
    }

    fn ids(list: &PagedList) -> Vec<i64> {
        list.records.iter().filter_map(|r| r["id"].as_i64()).collect()
    }

    #[test]
    fn test_merge_drops_known_ids() {
        let existing = PagedList {
            records: vec![json!({"id": 1})],
            count: 1,
            ..Default::default()
        };
        let merged = merge(
            &existing,
            vec![json!({"id": 1}), json!({"id": 2})],
            Some(&page_meta(Some(2), None)),
            "id",
        );
        assert_eq!(merged.records, vec![json!({"id": 1}), json!({"id": 2})]);
        assert_eq!(merged.count, 2);
        assert_eq!(merged.next, None);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let existing = PagedList {
            records: vec![json!({"id": 5}), json!({"id": 1})],
            count: 2,
            ..Default::default()
        };
        let incoming = vec![json!({"id": 2}), json!({"id": 1}), json!({"id": 3}), json!({"name": "no id"})];
        let meta = page_meta(Some(10), Some("https://api/list?page=3"));

        let once = merge(&existing, incoming.clone(), Some(&meta), "id");
        let twice = merge(&once, incoming, Some(&meta), "id");
        assert_eq!(once.records, twice.records);
        assert_eq!(ids(&once), vec![5, 1, 2, 3]);
        assert_eq!(once.records.len(), 5);
    }

    #[test]
    fn test_disjoint_pages_converge() {
        let a = vec![json!({"id": 1}), json!({"id": 2})];
        let b = vec![json!({"id": 3})];
        let meta = page_meta(Some(3), None);
        let empty = PagedList::default();

        let ab = merge(&merge(&empty, a.clone(), Some(&meta), "id"), b.clone(), Some(&meta), "id");
        let ba = merge(&merge(&empty, b, Some(&meta), "id"), a, Some(&meta), "id");

        assert_eq!(ab.records.len(), 3);
        let mut ab_ids = ids(&ab);
        let mut ba_ids = ids(&ba);
        ab_ids.sort();
        ba_ids.sort();
        assert_eq!(ab_ids, ba_ids);
        assert_eq!(ids(&ab), vec![1, 2, 3]);
        assert_eq!(ids(&ba), vec![3, 1, 2]);
    }

    #[test]
    fn test_bare_array_replaces() {
        let existing = PagedList {
            records: vec![json!({"id": 9})],
            count: 40,
            next: Some("https://api/list?page=2".to_string()),
            previous: None,
        };
        let merged = existing.absorb(SourceResponse::Bare(vec![json!({"id": 1}), json!({"id": 1})]));
        assert_eq!(merged.records, vec![json!({"id": 1}), json!({"id": 1})]);
        assert_eq!(merged.count, 2);
        assert!(merged.next.is_none());
        assert!(merged.previous.is_none());
    }

    #[test]
    fn test_count_and_cursor_follow_latest_page() {
        let existing = PagedList {
            records: vec![json!({"id": 1})],
            count: 7,
            next: Some("page2".to_string()),
            previous: None,
        };
        let merged = merge(
            &existing,
            vec![json!({"id": 2})],
            Some(&PageMeta {
                count: None,
                next: None,
                previous: Some("page1".to_string()),
            }),
            "id",
        );
        assert_eq!(merged.count, 7);
        assert!(!merged.has_more());
        assert_eq!(merged.previous.as_deref(), Some("page1"));
    }

    #[test]
    fn test_response_deserializes_both_shapes() {
        let paginated: SourceResponse =
            serde_json::from_str(r#"{"count": 3, "next": "u2", "previous": null, "results": [{"id": 1}]}"#)
                .unwrap();
        match paginated {
            SourceResponse::Paginated(page) => {
                assert_eq!(page.results.len(), 1);
                assert_eq!(page.meta.count, Some(3));
                assert_eq!(page.meta.next.as_deref(), Some("u2"));
            }
            other => panic!("expected paginated response, got {:?}", other),
        }

        let bare: SourceResponse = serde_json::from_str(r#"[{"id": 1}, {"id": 2}]"#).unwrap();
        assert!(matches!(bare, SourceResponse::Bare(ref records) if records.len() == 2));
    }

    #[test]
    fn test_remove_and_replace() {
        let list = PagedList {
            records: vec![json!({"id": 1, "name": "a"}), json!({"id": 2, "name": "b"})],
            count: 2,
            ..Default::default()
        };

        let removed = list.remove("1", "id");
        assert_eq!(ids(&removed), vec![2]);
        assert_eq!(removed.count, 1);

        let untouched = list.remove("42", "id");
        assert_eq!(untouched.count, 2);

        let replaced = list.replace(json!({"id": 2, "name": "renamed"}), "id");
        assert_eq!(replaced.records[1]["name"], "renamed");
        assert_eq!(replaced.records[0]["name"], "a");
        assert_eq!(list.records[1]["name"], "b");
    }
}
