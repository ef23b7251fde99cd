//! Storage traits for jobs, saved searches, interactions, and source status.
//!
//! The storage layer is split into focused traits:
//! - `JobStore`: persisted listings keyed by `(source, external_id)`
//! - `SavedSearchStore`: saved searches and their match sets
//! - `InteractionStore`: the append-only interaction log
//! - `SourceStatusStore`: per-source sync history
//! - `AggregationStore`: composite trait combining all four

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{
    interaction::{JobInteraction, NewInteraction},
    job::{DedupKey, JobQuery, JobRecord, UpsertOutcome},
    listing::NormalizedListing,
    saved_search::{NewSavedSearch, RecordedMatches, SavedSearch},
    source_status::{SourceStatus, SourceSync},
};

/// Persisted job listings.
///
/// Uniqueness of the dedup key is the store's job, not the caller's: two
/// concurrent upserts of the same key must yield one insert and one
/// existing.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert `listing` if its key is unseen; otherwise only move the
    /// existing record's `scraped_at` to `scraped_at`.
    async fn insert_if_absent(
        &self,
        listing: &NormalizedListing,
        scraped_at: DateTime<Utc>,
    ) -> Result<UpsertOutcome>;

    /// Upsert a validated batch, returning one outcome per listing in order.
    ///
    /// Transactional backends commit the whole batch or nothing.
    async fn upsert_batch(
        &self,
        listings: &[NormalizedListing],
        scraped_at: DateTime<Utc>,
    ) -> Result<Vec<UpsertOutcome>> {
        let mut outcomes = Vec::with_capacity(listings.len());
        for listing in listings {
            outcomes.push(self.insert_if_absent(listing, scraped_at).await?);
        }
        Ok(outcomes)
    }

    /// Look up a job by its dedup key.
    async fn find_by_key(&self, key: &DedupKey) -> Result<Option<JobRecord>>;

    /// Jobs scraped at or after `since` (all jobs when `None`), oldest first.
    async fn jobs_scraped_since(&self, since: Option<DateTime<Utc>>) -> Result<Vec<JobRecord>>;

    /// Jobs a saved-search run has to look at, oldest first: every job with
    /// an id above `after_id` (all jobs when `None`) plus any job scraped at
    /// or after `scraped_since`.
    ///
    /// Ids are assigned in commit order, so the id cursor catches batches
    /// committed late with an older `scraped_at`.
    async fn jobs_to_scan(
        &self,
        after_id: Option<i64>,
        scraped_since: Option<DateTime<Utc>>,
    ) -> Result<Vec<JobRecord>>;

    /// Look up a job by id.
    async fn get_job(&self, id: i64) -> Result<Option<JobRecord>>;

    /// Look up several jobs by id, skipping unknown ids.
    async fn get_jobs(&self, ids: &[i64]) -> Result<Vec<JobRecord>> {
        let mut jobs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(job) = self.get_job(*id).await? {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }

    /// Browse jobs, newest scrape first.
    async fn list_jobs(&self, query: &JobQuery) -> Result<Vec<JobRecord>>;

    /// Total persisted jobs.
    async fn count_jobs(&self) -> Result<usize>;
}

/// Saved searches and the set of jobs each has already counted.
#[async_trait]
pub trait SavedSearchStore: Send + Sync {
    async fn create_saved_search(
        &self,
        search: &NewSavedSearch,
        now: DateTime<Utc>,
    ) -> Result<SavedSearch>;

    async fn get_saved_search(&self, id: i64) -> Result<Option<SavedSearch>>;

    /// All saved searches, oldest first.
    async fn list_saved_searches(&self) -> Result<Vec<SavedSearch>>;

    /// Set the active flag. Returns `None` for an unknown id.
    async fn set_saved_search_active(&self, id: i64, active: bool) -> Result<Option<SavedSearch>>;

    /// Remove a saved search and its match set. Returns whether it existed.
    async fn delete_saved_search(&self, id: i64) -> Result<bool>;

    /// Record a run in one step: add the not-yet-counted `job_ids` to the
    /// match set, increase `new_job_count` by that many, set `last_run_at`,
    /// and raise `last_job_id` to `scanned_through`.
    ///
    /// Returns `None` for an unknown id.
    async fn record_matches(
        &self,
        id: i64,
        job_ids: &[i64],
        scanned_through: i64,
        ran_at: DateTime<Utc>,
    ) -> Result<Option<RecordedMatches>>;

    /// Reset `new_job_count` to zero and set `last_viewed_at`.
    async fn mark_viewed(&self, id: i64, viewed_at: DateTime<Utc>) -> Result<Option<SavedSearch>>;

    /// Jobs ever counted for this search, in match order.
    async fn matched_job_ids(&self, id: i64) -> Result<Vec<i64>>;
}

/// Append-only log of user actions on jobs.
#[async_trait]
pub trait InteractionStore: Send + Sync {
    async fn record_interaction(
        &self,
        interaction: &NewInteraction,
        now: DateTime<Utc>,
    ) -> Result<JobInteraction>;

    async fn interactions_for_job(&self, job_id: i64) -> Result<Vec<JobInteraction>>;

    async fn all_interactions(&self) -> Result<Vec<JobInteraction>>;
}

/// Per-source sync history.
#[async_trait]
pub trait SourceStatusStore: Send + Sync {
    async fn record_source_sync(&self, sync: &SourceSync) -> Result<SourceStatus>;

    async fn source_statuses(&self) -> Result<Vec<SourceStatus>>;
}

/// Composite storage trait used by the aggregation pipeline and server.
pub trait AggregationStore: JobStore + SavedSearchStore + InteractionStore + SourceStatusStore {}

// Blanket implementation: anything implementing all four traits is an AggregationStore
impl<T: JobStore + SavedSearchStore + InteractionStore + SourceStatusStore> AggregationStore for T {}
