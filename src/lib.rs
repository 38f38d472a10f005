//! Watch-list table controller
//!
//! Filtering, sorting, pagination and saved-filter persistence for the list
//! views of a threat-monitoring dashboard, plus incremental merging of
//! paginated list responses.

pub mod config;
pub mod core;
pub mod models;
pub mod source;
pub mod utils;
