//! Domain types shared by adapters, the registry, and stores.

pub mod config;
pub mod interaction;
pub mod job;
pub mod listing;
pub mod params;
pub mod saved_search;
pub mod source_status;
