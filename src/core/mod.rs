//! Core functionality for watch-list views.
//!
//! This module contains the pieces every list view is built from:
//! record access, date-range filtering, sorting, incremental list merging,
//! durable preferences and the table controller tying them together.

pub mod record;
pub mod date_range;
pub mod sort;
pub mod list_merge;
pub mod preferences;
pub mod table;

pub use record::Record;
pub use date_range::{DateRange, DateRangeState};
pub use sort::{SortDirection, SortState};
pub use list_merge::{merge, PageMeta, Page, PagedList, SourceResponse};
pub use preferences::{MemoryStore, PreferenceStore, Preferences, RedisStore, SavedFilterEntry, StoreError};
pub use table::{
    CustomPredicate, FilterDescriptor, FilterKind, FilterOption, FilterState, IndexedRow, PaginationState,
    TableConfig, TableController, TableError, TableView,
};
