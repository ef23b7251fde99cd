//! Job Source Aggregation Library
//!
//! A registry of pluggable job source adapters, concurrent fan-out search
//! with per-source failure isolation, and a dedup/upsert pipeline keyed by
//! `(source, external_id)`.
//!
//! # Design Philosophy
//!
//! - Adapters only normalize; they never persist
//! - One source failing never taints another source's results
//! - The store owns uniqueness, not application locks
//! - First-seen values win; re-scrapes only move `scraped_at`
//!
//! # Usage
//!
//! ```rust,ignore
//! use job_sources::{aggregate, MemoryStore, RegistryConfig, SearchParams, SourceRegistry};
//! use job_sources::testing::MockSource;
//!
//! let mut registry = SourceRegistry::new(RegistryConfig::default());
//! registry.register(MockSource::new("greenhouse"));
//!
//! let store = MemoryStore::new();
//! let summary = aggregate(&registry, &store, &SearchParams::new("rust")).await?;
//! assert_eq!(summary.inserted + summary.updated, summary.total_found);
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Adapter contract and storage traits
//! - [`types`] - Listings, params, jobs, saved searches, interactions
//! - [`registry`] - Source registry and fan-out
//! - [`sources`] - Adapter wrappers (rate limiting)
//! - [`pipeline`] - Upsert, aggregation, saved-search loop
//! - [`stores`] - Storage implementations (MemoryStore, SqliteStore)
//! - [`testing`] - Mock source for testing

pub mod error;
pub mod pipeline;
pub mod registry;
pub mod sources;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{AggregationError, ListingError, Result, SourceError, SourceResult};
pub use traits::{
    source::{probe_with_search, JobSource},
    store::{AggregationStore, InteractionStore, JobStore, SavedSearchStore, SourceStatusStore},
};
pub use types::{
    config::{Credential, RateLimit, RegistryConfig, SourceConfig, SourceKind},
    interaction::{
        InteractionAction, JobInteraction, JobState, NewInteraction, PipelineBoard, PipelineStage,
    },
    job::{DedupKey, JobQuery, JobRecord, UpsertOutcome},
    listing::{ExperienceLevel, JobType, NormalizedListing},
    params::{PostedWithin, SearchParams, DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT},
    saved_search::{
        Frequency, NewSavedSearch, RecordedMatches, SavedSearch, SavedSearchStatus, SearchFilters,
    },
    source_status::{SourceStatus, SourceSync},
};

// Re-export the registry
pub use registry::{FanOut, SourceHealth, SourceRegistry, SourceReport};

// Re-export pipeline components
pub use pipeline::{
    // Aggregation
    aggregate, aggregate_with_cancel, AggregationSummary,
    // Upsert
    upsert_listings, upsert_listings_at, ListingDiagnostic, UpsertSummary,
    // Saved searches
    create_saved_search, delete_saved_search, mark_viewed, run_active_searches,
    run_saved_search, saved_search_results, toggle_saved_search, ScheduledRun, SearchRun,
    SearchRunFailure,
    // Interactions
    job_with_state, pipeline_board, record_interaction, JobWithState,
};

// Re-export wrappers
pub use sources::{JobSourceExt, RateLimitedSource};

// Re-export stores
pub use stores::MemoryStore;

#[cfg(feature = "sqlite")]
pub use stores::SqliteStore;
