//! Aggregation pipeline - the core of the library.
//!
//! The pipeline orchestrates:
//! - Fan-out search across the registry
//! - Upsert of merged listings keyed by `(source, external_id)`
//! - Source sync bookkeeping
//! - The saved-search matching loop
//! - Job interactions and the pipeline board

pub mod aggregate;
pub mod interactions;
pub mod saved_search;
pub mod upsert;

pub use aggregate::{aggregate, aggregate_with_cancel, AggregationSummary};
pub use interactions::{job_with_state, pipeline_board, record_interaction, JobWithState};
pub use saved_search::{
    create_saved_search, delete_saved_search, mark_viewed, run_active_searches,
    run_active_searches_at, run_saved_search, run_saved_search_at, saved_search_results,
    toggle_saved_search, ScheduledRun, SearchRun, SearchRunFailure,
};
pub use upsert::{upsert_listings, upsert_listings_at, ListingDiagnostic, UpsertSummary};
