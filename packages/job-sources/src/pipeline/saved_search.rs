//! Saved-search lifecycle and the matching loop.
//!
//! The loop is triggered externally (a schedule or "run now"). Each run
//! scans jobs inserted since the search's last run (by id cursor) plus jobs
//! re-scraped since then, and each job counts toward `new_job_count` at most
//! once over the life of the search.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{AggregationError, Result};
use crate::traits::store::{JobStore, SavedSearchStore};
use crate::types::{
    job::JobRecord,
    saved_search::{NewSavedSearch, SavedSearch},
};

/// Outcome of running one saved search.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRun {
    pub search_id: i64,

    /// Jobs inserted or re-scraped since the previous run
    pub scanned: usize,

    /// Scanned jobs satisfying the predicate
    pub matched: usize,

    /// Matches not counted by any earlier run
    pub new_matches: usize,

    pub new_job_count: i64,
    pub ran_at: DateTime<Utc>,
}

/// A saved search that failed during a scheduled pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRunFailure {
    pub search_id: i64,
    pub error: String,
}

/// Result of a scheduled pass over all saved searches.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledRun {
    pub runs: Vec<SearchRun>,
    pub failures: Vec<SearchRunFailure>,

    /// Active searches not yet due under their frequency
    pub not_due: usize,
}

fn validate(input: &NewSavedSearch) -> Result<()> {
    if input.name.trim().is_empty() {
        return Err(AggregationError::invalid("saved search name must not be empty"));
    }
    if let (Some(min), Some(max)) = (input.filters.salary_min, input.filters.salary_max) {
        if min > max {
            return Err(AggregationError::invalid(format!(
                "salaryMin {} exceeds salaryMax {}",
                min, max
            )));
        }
    }
    Ok(())
}

async fn require<S>(store: &S, id: i64) -> Result<SavedSearch>
where
    S: SavedSearchStore + ?Sized,
{
    store
        .get_saved_search(id)
        .await?
        .ok_or_else(|| AggregationError::not_found("saved search", id))
}

/// Create an active saved search.
pub async fn create_saved_search<S>(store: &S, input: NewSavedSearch) -> Result<SavedSearch>
where
    S: SavedSearchStore + ?Sized,
{
    validate(&input)?;
    let search = store.create_saved_search(&input, Utc::now()).await?;
    info!(search_id = search.id, name = %search.name, "Created saved search");
    Ok(search)
}

/// Flip between active and paused.
pub async fn toggle_saved_search<S>(store: &S, id: i64) -> Result<SavedSearch>
where
    S: SavedSearchStore + ?Sized,
{
    let current = require(store, id).await?;
    let updated = store
        .set_saved_search_active(id, !current.is_active)
        .await?
        .ok_or_else(|| AggregationError::not_found("saved search", id))?;
    info!(search_id = id, status = ?updated.status(), "Toggled saved search");
    Ok(updated)
}

/// Delete a saved search. Deletion is terminal.
pub async fn delete_saved_search<S>(store: &S, id: i64) -> Result<()>
where
    S: SavedSearchStore + ?Sized,
{
    if !store.delete_saved_search(id).await? {
        return Err(AggregationError::not_found("saved search", id));
    }
    info!(search_id = id, "Deleted saved search");
    Ok(())
}

/// Run one saved search now, whether or not it is paused.
pub async fn run_saved_search<S>(store: &S, id: i64) -> Result<SearchRun>
where
    S: JobStore + SavedSearchStore + ?Sized,
{
    run_saved_search_at(store, id, Utc::now()).await
}

/// Run one saved search as of `now`.
pub async fn run_saved_search_at<S>(store: &S, id: i64, now: DateTime<Utc>) -> Result<SearchRun>
where
    S: JobStore + SavedSearchStore + ?Sized,
{
    let search = require(store, id).await?;
    let candidates = store
        .jobs_to_scan(search.last_job_id, search.last_run_at)
        .await?;

    let matched: Vec<i64> = candidates
        .iter()
        .filter(|job| search.matches(job, now))
        .map(|job| job.id)
        .collect();
    let scanned_through = candidates
        .iter()
        .map(|job| job.id)
        .chain(search.last_job_id)
        .max()
        .unwrap_or(0);

    let recorded = store
        .record_matches(id, &matched, scanned_through, now)
        .await?
        .ok_or_else(|| AggregationError::not_found("saved search", id))?;

    let run = SearchRun {
        search_id: id,
        scanned: candidates.len(),
        matched: matched.len(),
        new_matches: recorded.new_matches,
        new_job_count: recorded.new_job_count,
        ran_at: now,
    };
    debug!(
        search_id = id,
        scanned = run.scanned,
        matched = run.matched,
        new_matches = run.new_matches,
        "Ran saved search"
    );
    Ok(run)
}

/// Run every active saved search that is due. One failing search does not
/// stop the others.
pub async fn run_active_searches<S>(store: &S) -> Result<ScheduledRun>
where
    S: JobStore + SavedSearchStore + ?Sized,
{
    run_active_searches_at(store, Utc::now()).await
}

pub async fn run_active_searches_at<S>(store: &S, now: DateTime<Utc>) -> Result<ScheduledRun>
where
    S: JobStore + SavedSearchStore + ?Sized,
{
    let mut pass = ScheduledRun::default();

    for search in store.list_saved_searches().await? {
        if !search.is_active {
            continue;
        }
        if !search.is_due(now) {
            pass.not_due += 1;
            continue;
        }

        match run_saved_search_at(store, search.id, now).await {
            Ok(run) => pass.runs.push(run),
            Err(err) => {
                warn!(search_id = search.id, error = %err, "Saved search run failed");
                pass.failures.push(SearchRunFailure {
                    search_id: search.id,
                    error: err.to_string(),
                });
            }
        }
    }

    info!(
        ran = pass.runs.len(),
        failed = pass.failures.len(),
        not_due = pass.not_due,
        "Scheduled saved-search pass complete"
    );
    Ok(pass)
}

/// Reset the unseen counter. `last_run_at` is left alone.
pub async fn mark_viewed<S>(store: &S, id: i64) -> Result<SavedSearch>
where
    S: SavedSearchStore + ?Sized,
{
    store
        .mark_viewed(id, Utc::now())
        .await?
        .ok_or_else(|| AggregationError::not_found("saved search", id))
}

/// Jobs ever matched by a saved search, in match order.
pub async fn saved_search_results<S>(store: &S, id: i64) -> Result<Vec<JobRecord>>
where
    S: JobStore + SavedSearchStore + ?Sized,
{
    require(store, id).await?;
    let ids = store.matched_job_ids(id).await?;
    store.get_jobs(&ids).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::upsert::upsert_listings_at;
    use crate::stores::MemoryStore;
    use crate::testing::listing;
    use crate::types::saved_search::{Frequency, SearchFilters};
    use chrono::Duration;

    #[tokio::test]
    async fn test_create_rejects_inverted_salary_bounds() {
        let store = MemoryStore::new();
        let input = NewSavedSearch::new("bad", "rust").with_filters(
            SearchFilters::new()
                .with_salary_min(200_000)
                .with_salary_max(100_000),
        );
        assert!(matches!(
            create_saved_search(&store, input).await,
            Err(AggregationError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_counts_new_matches_only_once() {
        let store = MemoryStore::new();
        let t0 = Utc::now();
        upsert_listings_at(&store, &[listing("rss", "1"), listing("rss", "2")], t0)
            .await
            .unwrap();

        let search = create_saved_search(&store, NewSavedSearch::new("eng", "engineer"))
            .await
            .unwrap();

        let first = run_saved_search_at(&store, search.id, t0).await.unwrap();
        assert_eq!(first.new_matches, 2);

        // Re-scrape of the same jobs plus one new job
        let t1 = t0 + Duration::minutes(10);
        upsert_listings_at(
            &store,
            &[listing("rss", "1"), listing("rss", "2"), listing("rss", "3")],
            t1,
        )
        .await
        .unwrap();

        let second = run_saved_search_at(&store, search.id, t1).await.unwrap();
        assert_eq!(second.scanned, 3);
        assert_eq!(second.new_matches, 1);
        assert_eq!(second.new_job_count, 3);
    }

    #[tokio::test]
    async fn test_run_sees_batch_committed_late_with_older_timestamp() {
        let store = MemoryStore::new();
        let t0 = Utc::now();
        let t1 = t0 + Duration::minutes(5);

        let search = create_saved_search(&store, NewSavedSearch::new("eng", "engineer"))
            .await
            .unwrap();
        let first = run_saved_search_at(&store, search.id, t1).await.unwrap();
        assert_eq!(first.scanned, 0);

        // A slow aggregation stamped at t0 lands after the run at t1
        upsert_listings_at(
            &store,
            &[listing("rss", "1"), listing("rss", "2"), listing("rss", "3")],
            t0,
        )
        .await
        .unwrap();

        let second = run_saved_search_at(&store, search.id, t1 + Duration::minutes(15))
            .await
            .unwrap();
        assert_eq!(second.scanned, 3);
        assert_eq!(second.new_matches, 3);
        assert_eq!(second.new_job_count, 3);

        let third = run_saved_search_at(&store, search.id, t1 + Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(third.scanned, 0);
        assert_eq!(third.new_job_count, 3);
    }

    #[tokio::test]
    async fn test_run_reports_counter_from_store_after_view_reset() {
        let store = MemoryStore::new();
        let t0 = Utc::now();
        upsert_listings_at(&store, &[listing("rss", "1")], t0)
            .await
            .unwrap();
        let search = create_saved_search(&store, NewSavedSearch::new("all", ""))
            .await
            .unwrap();

        run_saved_search_at(&store, search.id, t0).await.unwrap();
        mark_viewed(&store, search.id).await.unwrap();
        upsert_listings_at(&store, &[listing("rss", "2")], t0 + Duration::minutes(1))
            .await
            .unwrap();

        let run = run_saved_search_at(&store, search.id, t0 + Duration::minutes(2))
            .await
            .unwrap();
        assert_eq!(run.new_matches, 1);
        assert_eq!(run.new_job_count, 1);
    }

    #[tokio::test]
    async fn test_mark_viewed_keeps_last_run() {
        let store = MemoryStore::new();
        upsert_listings_at(&store, &[listing("rss", "1")], Utc::now())
            .await
            .unwrap();
        let search = create_saved_search(&store, NewSavedSearch::new("all", ""))
            .await
            .unwrap();
        run_saved_search(&store, search.id).await.unwrap();

        let before = store.get_saved_search(search.id).await.unwrap().unwrap();
        let viewed = mark_viewed(&store, search.id).await.unwrap();

        assert_eq!(viewed.new_job_count, 0);
        assert!(viewed.last_viewed_at.is_some());
        assert_eq!(viewed.last_run_at, before.last_run_at);
        assert_eq!(saved_search_results(&store, search.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_scheduled_pass_skips_paused_and_not_due() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let daily = create_saved_search(&store, NewSavedSearch::new("daily", ""))
            .await
            .unwrap();
        let paused = create_saved_search(&store, NewSavedSearch::new("paused", ""))
            .await
            .unwrap();
        toggle_saved_search(&store, paused.id).await.unwrap();
        create_saved_search(
            &store,
            NewSavedSearch::new("live", "").with_frequency(Frequency::Realtime),
        )
        .await
        .unwrap();

        let first = run_active_searches_at(&store, now).await.unwrap();
        assert_eq!(first.runs.len(), 2);

        let second = run_active_searches_at(&store, now + Duration::minutes(15))
            .await
            .unwrap();
        assert_eq!(second.runs.len(), 1);
        assert_eq!(second.not_due, 1);
        assert!(second.runs.iter().all(|r| r.search_id != daily.id));
    }

    #[tokio::test]
    async fn test_unknown_search_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            run_saved_search(&store, 99).await,
            Err(AggregationError::NotFound { .. })
        ));
        assert!(matches!(
            delete_saved_search(&store, 99).await,
            Err(AggregationError::NotFound { .. })
        ));
        assert!(matches!(
            mark_viewed(&store, 99).await,
            Err(AggregationError::NotFound { .. })
        ));
    }
}
