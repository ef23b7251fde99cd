//! Aggregation: fan a search out to every enabled source, then upsert the
//! merged results.

use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::Result;
use crate::pipeline::upsert::{upsert_listings_at, ListingDiagnostic};
use crate::registry::{FanOut, SourceRegistry};
use crate::traits::store::{JobStore, SourceStatusStore};
use crate::types::{params::SearchParams, source_status::SourceSync};

/// Result of one aggregation run.
///
/// Returned even when some sources failed; only a store failure turns the
/// whole run into an error.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationSummary {
    pub total_found: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: Vec<ListingDiagnostic>,

    /// One entry per enabled source, in registry order
    pub sources: Vec<SourceSync>,
}

impl AggregationSummary {
    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceSync> {
        self.sources.iter().filter(|s| !s.succeeded())
    }
}

/// Search every enabled source and upsert what came back.
pub async fn aggregate<S>(
    registry: &SourceRegistry,
    store: &S,
    params: &SearchParams,
) -> Result<AggregationSummary>
where
    S: JobStore + SourceStatusStore + ?Sized,
{
    let fan_out = registry.search_all_detailed(params).await;
    reconcile(fan_out, store).await
}

/// Like [`aggregate`], but stops waiting on slow sources once `cancel`
/// fires. Whatever already arrived is still upserted.
pub async fn aggregate_with_cancel<S>(
    registry: &SourceRegistry,
    store: &S,
    params: &SearchParams,
    cancel: &CancellationToken,
) -> Result<AggregationSummary>
where
    S: JobStore + SourceStatusStore + ?Sized,
{
    let fan_out = registry.search_all_with_cancel(params, cancel).await;
    reconcile(fan_out, store).await
}

async fn reconcile<S>(fan_out: FanOut, store: &S) -> Result<AggregationSummary>
where
    S: JobStore + SourceStatusStore + ?Sized,
{
    let now = Utc::now();
    let upserted = upsert_listings_at(store, &fan_out.listings, now).await?;

    let syncs: Vec<SourceSync> = fan_out
        .reports
        .iter()
        .map(|report| SourceSync {
            source: report.source.clone(),
            synced_at: now,
            listing_count: report.listing_count(),
            duration_ms: report.elapsed.as_millis() as u64,
            error: report.error().map(ToString::to_string),
        })
        .collect();

    // Sync bookkeeping is best effort; the listings are already committed
    for sync in &syncs {
        if let Err(err) = store.record_source_sync(sync).await {
            warn!(source = %sync.source, error = %err, "Failed to record source sync");
        }
    }

    let summary = AggregationSummary {
        total_found: upserted.total_found,
        inserted: upserted.inserted,
        updated: upserted.updated,
        skipped: upserted.skipped,
        sources: syncs,
    };

    info!(
        total_found = summary.total_found,
        inserted = summary.inserted,
        updated = summary.updated,
        skipped = summary.skipped.len(),
        failed_sources = summary.failed_sources().count(),
        "Aggregation complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;
    use crate::testing::{listings, MockSource};

    #[tokio::test]
    async fn test_partial_failure_still_reports_counts() {
        let mut registry = SourceRegistry::default();
        registry.register(MockSource::new("a").with_listings(listings("a", "a", 3)));
        registry.register(MockSource::new("b").failing("503 Service Unavailable"));
        registry.register(MockSource::new("c").with_listings(listings("c", "c", 2)));
        let store = MemoryStore::new();

        let summary = aggregate(&registry, &store, &SearchParams::new("rust"))
            .await
            .unwrap();

        assert_eq!(summary.total_found, 5);
        assert_eq!(summary.inserted, 5);
        assert_eq!(summary.sources.len(), 3);
        assert_eq!(summary.failed_sources().count(), 1);
        assert!(summary.sources[1]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("503")));

        let statuses = store.source_statuses().await.unwrap();
        let b = statuses.iter().find(|s| s.name == "b").unwrap();
        assert!(b.last_error.is_some());
        assert!(b.last_success_at.is_none());
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let mut registry = SourceRegistry::default();
        registry.register(MockSource::new("a").with_listings(listings("a", "a", 3)));
        let store = MemoryStore::new();
        let params = SearchParams::new("rust");

        aggregate(&registry, &store, &params).await.unwrap();
        let second = aggregate(&registry, &store, &params).await.unwrap();

        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, second.total_found);
        assert_eq!(store.job_count(), 3);
    }
}
