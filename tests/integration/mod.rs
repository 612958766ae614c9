//! Integration tests for the tool registry

mod cache_validation;
mod concurrency;
mod lookup;
mod panel_loading;
mod panel_views;
mod persistence;
mod test_utils;
mod watching;
