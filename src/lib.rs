#![deny(clippy::unwrap_used)]

pub mod api;
pub mod config;
pub mod enquiry;
pub mod filter_state;
pub mod listing;
pub mod orchestrator;
pub mod pagination;
pub mod query;

pub use catalog_types;
