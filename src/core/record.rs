//! Schema-less record helpers.
//!
//! Records arrive from the list endpoints as arbitrary JSON objects. Views only
//! ever need three things from them: a stable identity, dotted-path field access
//! for search/sort/filter, and date parsing for the date-range stage.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// One domain entity (alert, keyword, monitored domain, ...)
pub type Record = Value;

/// Field used as the unique identifier when none is configured
pub const DEFAULT_ID_FIELD: &str = "id";

/// Resolve a dotted path (`keyword.name`) against a record.
///
/// Returns `None` as soon as an intermediate step is absent or not an object.
/// An explicit JSON `null` at the leaf is returned as `Some(&Value::Null)`.
pub fn resolve<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    let mut current = record;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Like [`resolve`], but folds an explicit `null` into "absent".
pub fn resolve_present<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    resolve(record, path).filter(|value| !value.is_null())
}

/// Render a scalar value the way it would be displayed in a table cell.
///
/// Strings are returned without quotes; nulls become the empty string.
pub fn display_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Identity key used for de-duplication.
///
/// `1` and `"1"` map to the same key. A record without the id field is keyed by
/// its full serialization so that merging it twice is still a no-op.
pub fn identity_key(record: &Record, id_field: &str) -> String {
    match resolve_present(record, id_field) {
        Some(id) => display_text(id),
        None => format!("#{}", record),
    }
}

/// Parse a date-valued field into a UTC timestamp.
///
/// Accepts RFC 3339, naive `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DDTHH:MM:SS`
/// (taken as UTC), plain `YYYY-MM-DD` (midnight UTC) and numbers as epoch
/// milliseconds. Anything else is `None`.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_date_str(s.trim()),
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            Utc.timestamp_millis_opt(millis).single()
        }
        _ => None,
    }
}

fn parse_date_str(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Parse the field at `path`, if present.
pub fn field_timestamp(record: &Record, path: &str) -> Option<DateTime<Utc>> {
    resolve_present(record, path).and_then(parse_timestamp)
}

/// Coerce a loosely-typed collection into a record list; non-arrays are empty.
pub fn records_from_value(value: Value) -> Vec<Record> {
    match value {
        Value::Array(items) => items,
        _ => Vec::new(),
    }
}
