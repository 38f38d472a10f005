//! Table controller shared by every list view.
//!
//! Owns the filter, date-range, sort and pagination state of one view and
//! derives the page currently shown from the raw record collection. The raw
//! collection is never mutated; the controller keeps the positions of the
//! filtered and sorted records and re-slices them on page changes.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::date_range::{DateRange, DateRangeState};
use crate::core::preferences::{PreferenceStore, Preferences, SavedFilterEntry};
use crate::core::record::{Record, DEFAULT_ID_FIELD};
use crate::core::sort::{search_text, sort_indexed, SortDirection, SortState};
use crate::utils::current_time;

/// Filter key driving the global search box
pub const SEARCH_KEY: &str = "search";

/// Errors surfaced by table operations
#[derive(Error, Debug, PartialEq)]
pub enum TableError {
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Filter control type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Search,
    Select,
}

/// One selectable option of a select filter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilterOption {
    pub value: String,
    pub label: String,
}

/// Declares one filter control of a view
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilterDescriptor {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: FilterKind,
    pub label: String,
    #[serde(default)]
    pub options: Vec<FilterOption>,
    /// Record field tested by the controller itself. Select filters match it
    /// exactly, search filters by case-insensitive substring. Without a field
    /// the value is only seen by the custom predicate.
    #[serde(default)]
    pub field: Option<String>,
}

impl FilterDescriptor {
    pub fn search(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: FilterKind::Search,
            label: label.into(),
            options: Vec::new(),
            field: None,
        }
    }

    pub fn select(key: impl Into<String>, label: impl Into<String>, options: Vec<FilterOption>) -> Self {
        Self {
            key: key.into(),
            kind: FilterKind::Select,
            label: label.into(),
            options,
            field: None,
        }
    }

    pub fn on_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

/// Filter key to chosen value, `""` meaning unconstrained
pub type FilterState = BTreeMap<String, String>;

/// A record tagged with its position in the controller's record list
pub type IndexedRow<'r> = (usize, &'r Record);

/// Further narrows the rows that passed the built-in stages
pub type CustomPredicate = Box<dyn for<'r> Fn(Vec<IndexedRow<'r>>, &FilterState) -> Vec<IndexedRow<'r>>>;

/// Called after every change of the filter state
pub type FiltersChangedHook = Box<dyn FnMut(&FilterState)>;

/// Static description of a view
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableConfig {
    /// Namespace for persisted preferences
    pub module_id: String,
    #[serde(default)]
    pub filters: Vec<FilterDescriptor>,
    /// Dotted paths searched by the global search box
    #[serde(default)]
    pub search_fields: Vec<String>,
    /// Date-valued dotted paths; the first one drives the date range
    #[serde(default)]
    pub date_fields: Vec<String>,
    pub default_sort: String,
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default = "default_id_field")]
    pub id_field: String,
}

fn default_page_size() -> usize {
    10
}

fn default_id_field() -> String {
    DEFAULT_ID_FIELD.to_string()
}

impl TableConfig {
    pub fn new(module_id: impl Into<String>, default_sort: impl Into<String>) -> Self {
        Self {
            module_id: module_id.into(),
            filters: Vec::new(),
            search_fields: Vec::new(),
            date_fields: Vec::new(),
            default_sort: default_sort.into(),
            default_page_size: default_page_size(),
            id_field: default_id_field(),
        }
    }

    fn is_date_field(&self, field: &str) -> bool {
        self.date_fields.iter().any(|f| f == field)
    }

    fn blank_filters(&self) -> FilterState {
        self.filters
            .iter()
            .map(|descriptor| (descriptor.key.clone(), String::new()))
            .collect()
    }
}

/// Current page and page size
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationState {
    pub current_page: usize,
    pub items_per_page: usize,
}

/// The slice of records currently shown
#[derive(Debug, Serialize)]
pub struct TableView<'a> {
    pub page_items: Vec<&'a Record>,
    pub total_filtered_count: usize,
    pub total_pages: usize,
    pub current_page: usize,
    pub items_per_page: usize,
}

/// Filter/sort/pagination controller for one view
pub struct TableController {
    config: TableConfig,
    prefs: Preferences,
    records: Arc<Vec<Record>>,
    loaded: bool,
    filters: FilterState,
    date_range: DateRangeState,
    sort: SortState,
    pagination: PaginationState,
    filters_visible: bool,
    saved_filters: BTreeMap<String, SavedFilterEntry>,
    custom_predicate: Option<CustomPredicate>,
    on_filters_changed: Option<FiltersChangedHook>,
    /// Positions in `records` of the filtered rows, in display order
    filtered: Vec<usize>,
}

impl TableController {
    /// Create a controller and restore the view's stored preferences
    pub fn new(config: TableConfig, store: Arc<dyn PreferenceStore>) -> Self {
        let prefs = Preferences::new(store, config.module_id.clone());
        let items_per_page = prefs.page_size(config.default_page_size.max(1));
        let filters_visible = prefs.filters_visible();
        let saved_filters = prefs.saved_filters();

        let sort = SortState {
            sort_by: config.default_sort.clone(),
            sort_direction: SortDirection::Desc,
        };

        Self {
            filters: config.blank_filters(),
            config,
            prefs,
            records: Arc::new(Vec::new()),
            loaded: false,
            date_range: DateRangeState::default(),
            sort,
            pagination: PaginationState {
                current_page: 1,
                items_per_page,
            },
            filters_visible,
            saved_filters,
            custom_predicate: None,
            on_filters_changed: None,
            filtered: Vec::new(),
        }
    }

    pub fn with_records(mut self, records: impl Into<Arc<Vec<Record>>>) -> Self {
        self.set_records(records);
        self
    }

    pub fn with_custom_predicate<F>(mut self, predicate: F) -> Self
    where
        F: for<'r> Fn(Vec<IndexedRow<'r>>, &FilterState) -> Vec<IndexedRow<'r>> + 'static,
    {
        self.custom_predicate = Some(Box::new(predicate));
        self.recompute();
        self
    }

    pub fn on_filters_changed<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&FilterState) + 'static,
    {
        self.on_filters_changed = Some(Box::new(hook));
        self
    }

    /// Replace the raw collection. The current page is kept but clamped.
    pub fn set_records(&mut self, records: impl Into<Arc<Vec<Record>>>) {
        self.records = records.into();
        self.loaded = true;
        self.recompute();
    }

    /// Whether a collection has been supplied yet
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn filter_state(&self) -> &FilterState {
        &self.filters
    }

    pub fn date_range(&self) -> &DateRangeState {
        &self.date_range
    }

    pub fn sort_state(&self) -> &SortState {
        &self.sort
    }

    pub fn pagination(&self) -> PaginationState {
        self.pagination
    }

    pub fn set_filter(&mut self, key: &str, value: impl Into<String>) {
        self.filters.insert(key.to_string(), value.into());
        self.filters_updated();
    }

    /// Shorthand for `set_filter(SEARCH_KEY, ..)`
    pub fn set_search(&mut self, value: impl Into<String>) {
        self.set_filter(SEARCH_KEY, value);
    }

    pub fn set_date_range(
        &mut self,
        range: DateRange,
        custom_start: Option<DateTime<Utc>>,
        custom_end: Option<DateTime<Utc>>,
    ) {
        self.date_range = DateRangeState::new(range, custom_start, custom_end);
        self.filters_updated();
    }

    /// Sort by `field`, flipping the direction if it is already active.
    ///
    /// A newly selected date field starts descending, anything else ascending.
    pub fn set_sort(&mut self, field: &str) {
        if self.sort.sort_by == field {
            self.sort.sort_direction = self.sort.sort_direction.flipped();
        } else {
            self.sort = SortState {
                sort_by: field.to_string(),
                sort_direction: if self.config.is_date_field(field) {
                    SortDirection::Desc
                } else {
                    SortDirection::Asc
                },
            };
        }
        self.recompute();
    }

    pub fn set_page(&mut self, page: usize) {
        self.pagination.current_page = page;
        self.clamp_page();
    }

    /// Change and persist the page size; zero is ignored
    pub fn set_page_size(&mut self, size: usize) {
        if size == 0 {
            warn!("Ignoring page size 0 for module {}", self.config.module_id);
            return;
        }
        self.pagination.items_per_page = size;
        self.pagination.current_page = 1;
        self.prefs.set_page_size(size);
    }

    pub fn filters_visible(&self) -> bool {
        self.filters_visible
    }

    pub fn set_filters_visible(&mut self, visible: bool) {
        self.filters_visible = visible;
        self.prefs.set_filters_visible(visible);
    }

    pub fn toggle_filters_visible(&mut self) -> bool {
        self.set_filters_visible(!self.filters_visible);
        self.filters_visible
    }

    /// Blank every filter value and the date range
    pub fn clear_filters(&mut self) {
        for value in self.filters.values_mut() {
            value.clear();
        }
        self.date_range = DateRangeState::default();
        self.filters_updated();
    }

    /// Clear filters and restore the default sort.
    ///
    /// Page size and panel visibility are user preferences and stay as they are.
    pub fn reset_to_default(&mut self) {
        self.sort = SortState {
            sort_by: self.config.default_sort.clone(),
            sort_direction: SortDirection::Desc,
        };
        self.clear_filters();
    }

    /// Number of constrained filters, counting an active date range as one
    pub fn active_filter_count(&self) -> usize {
        let filters = self.filters.values().filter(|value| !value.is_empty()).count();
        filters + usize::from(self.date_range.is_active())
    }

    /// Store the current filters and date range under `name`, replacing any
    /// entry with the same name.
    pub fn save_current_filter(&mut self, name: &str) -> Result<(), TableError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TableError::ValidationError(
                "saved filter name must not be empty".to_string(),
            ));
        }

        let entry = SavedFilterEntry {
            name: name.to_string(),
            filters: self.filters.clone(),
            date_range: self.date_range.clone(),
            saved_at: current_time(),
        };
        self.saved_filters.insert(entry.name.clone(), entry);
        self.prefs.set_saved_filters(&self.saved_filters);
        info!("Saved filter '{}' for module {}", name, self.config.module_id);
        Ok(())
    }

    /// Restore a saved filter; returns `false` if no entry has that name
    pub fn load_filter(&mut self, name: &str) -> bool {
        let entry = match self.saved_filters.get(name.trim()) {
            Some(entry) => entry.clone(),
            None => {
                warn!("No saved filter '{}' for module {}", name, self.config.module_id);
                return false;
            }
        };

        let mut filters = self.config.blank_filters();
        filters.extend(entry.filters);
        self.filters = filters;
        self.date_range = entry.date_range;
        self.filters_updated();
        true
    }

    /// Remove a saved filter; returns `false` if no entry has that name
    pub fn delete_filter(&mut self, name: &str) -> bool {
        if self.saved_filters.remove(name.trim()).is_none() {
            return false;
        }
        self.prefs.set_saved_filters(&self.saved_filters);
        info!("Deleted filter '{}' for module {}", name, self.config.module_id);
        true
    }

    /// Saved filters ordered by name
    pub fn saved_filters(&self) -> Vec<&SavedFilterEntry> {
        self.saved_filters.values().collect()
    }

    /// Records on the current page
    pub fn view(&self) -> TableView<'_> {
        let per_page = self.pagination.items_per_page;
        let start = (self.pagination.current_page - 1) * per_page;
        let page_items = self
            .filtered
            .iter()
            .skip(start)
            .take(per_page)
            .map(|&index| &self.records[index])
            .collect();

        TableView {
            page_items,
            total_filtered_count: self.filtered.len(),
            total_pages: self.total_pages(),
            current_page: self.pagination.current_page,
            items_per_page: per_page,
        }
    }

    pub fn total_pages(&self) -> usize {
        let per_page = self.pagination.items_per_page;
        (self.filtered.len() + per_page - 1) / per_page
    }

    fn filters_updated(&mut self) {
        self.pagination.current_page = 1;
        self.recompute();
        if let Some(hook) = self.on_filters_changed.as_mut() {
            hook(&self.filters);
        }
    }

    fn clamp_page(&mut self) {
        let last = self.total_pages().max(1);
        self.pagination.current_page = self.pagination.current_page.clamp(1, last);
    }

    fn recompute(&mut self) {
        let records = Arc::clone(&self.records);
        let rows = self.filter_and_sort(&records);

        let total = records.len();
        self.filtered = rows
            .into_iter()
            .map(|(index, _)| index)
            .filter(|index| {
                let known = *index < total;
                if !known {
                    warn!("Module {}: dropping unknown row index {}", self.config.module_id, index);
                }
                known
            })
            .collect();

        debug!(
            "Module {}: {} of {} records match",
            self.config.module_id,
            self.filtered.len(),
            records.len()
        );
        self.clamp_page();
    }

    fn filter_and_sort<'r>(&self, records: &'r [Record]) -> Vec<IndexedRow<'r>> {
        let mut rows: Vec<IndexedRow<'r>> = records.iter().enumerate().collect();

        if let Some(date_field) = self.config.date_fields.first() {
            let now = current_time();
            rows.retain(|(_, record)| self.date_range.contains_at(record, date_field, now));
        }

        if let Some(needle) = self.active_value(SEARCH_KEY) {
            if !self.config.search_fields.is_empty() {
                let needle = needle.to_lowercase();
                rows.retain(|(_, record)| {
                    self.config
                        .search_fields
                        .iter()
                        .any(|field| search_text(record, field).to_lowercase().contains(&needle))
                });
            }
        }

        for descriptor in &self.config.filters {
            let (field, value) = match (&descriptor.field, self.active_value(&descriptor.key)) {
                (Some(field), Some(value)) => (field, value),
                _ => continue,
            };
            match descriptor.kind {
                FilterKind::Select => rows.retain(|(_, record)| search_text(record, field) == value),
                FilterKind::Search => {
                    let needle = value.to_lowercase();
                    rows.retain(|(_, record)| search_text(record, field).to_lowercase().contains(&needle));
                }
            }
        }

        if let Some(predicate) = &self.custom_predicate {
            rows = predicate(rows, &self.filters);
        }

        sort_indexed(&mut rows, &self.sort, &self.config.date_fields);
        rows
    }

    fn active_value(&self, key: &str) -> Option<&str> {
        self.filters
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}
