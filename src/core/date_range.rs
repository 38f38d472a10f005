//! Date-range filtering for list views.
//!
//! A view may declare one or more date-valued fields; the first one drives the
//! range selector. Presets are relative to "now", custom ranges take explicit
//! bounds and either bound may be open.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::core::record::{field_timestamp, Record};

/// Range selector value
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DateRange {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "30d")]
    ThirtyDays,
    #[serde(rename = "6m")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "custom")]
    Custom,
}

impl DateRange {
    /// Lower bound for a preset range, or `None` for `All`/`Custom`
    pub fn preset_start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            DateRange::All | DateRange::Custom => None,
            DateRange::OneWeek => Some(now - Duration::days(7)),
            DateRange::ThirtyDays => Some(now - Duration::days(30)),
            DateRange::SixMonths => now.checked_sub_months(Months::new(6)),
            DateRange::OneYear => now.checked_sub_months(Months::new(12)),
        }
    }
}

/// Selected range plus optional custom bounds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DateRangeState {
    pub range: DateRange,
    #[serde(default)]
    pub custom_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub custom_end: Option<DateTime<Utc>>,
}

impl DateRangeState {
    pub fn new(
        range: DateRange,
        custom_start: Option<DateTime<Utc>>,
        custom_end: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            range,
            custom_start,
            custom_end,
        }
    }

    /// Whether this state filters anything at all
    pub fn is_active(&self) -> bool {
        match self.range {
            DateRange::All => false,
            DateRange::Custom => self.custom_start.is_some() || self.custom_end.is_some(),
            _ => true,
        }
    }

    /// Effective `(start, end)` bounds at `now`
    pub fn bounds(&self, now: DateTime<Utc>) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        match self.range {
            DateRange::All => (None, None),
            DateRange::Custom => (self.custom_start, self.custom_end),
            preset => (preset.preset_start(now), Some(now)),
        }
    }

    /// Whether `record`'s `date_field` falls within the range at `now`.
    ///
    /// Under `All`, or `Custom` with both bounds open, every record passes. Otherwise
    /// a record whose date does not parse is excluded.
    pub fn contains_at(&self, record: &Record, date_field: &str, now: DateTime<Utc>) -> bool {
        if !self.is_active() {
            return true;
        }
        let (start, end) = self.bounds(now);
        match field_timestamp(record, date_field) {
            Some(ts) => start.map_or(true, |start| start <= ts) && end.map_or(true, |end| ts <= end),
            None => false,
        }
    }
}

/// Keep the records whose `date_field` falls within `state` at `now`.
pub fn apply_at<'a, I>(
    records: I,
    date_field: &str,
    state: &DateRangeState,
    now: DateTime<Utc>,
) -> Vec<&'a Record>
where
    I: IntoIterator<Item = &'a Record>,
{
    records
        .into_iter()
        .filter(|record| state.contains_at(record, date_field, now))
        .collect()
}
