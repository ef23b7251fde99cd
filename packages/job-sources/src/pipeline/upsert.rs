//! Upsert pipeline: reconcile normalized listings against the store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::traits::store::JobStore;
use crate::types::listing::NormalizedListing;

/// Why one incoming listing was not persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDiagnostic {
    /// Position in the incoming batch
    pub index: usize,
    pub source: String,
    pub external_id: String,
    pub reason: String,
}

/// Result of an upsert run.
///
/// `inserted + updated == total_found` always holds. Malformed listings are
/// not part of `total_found`; they are reported in `skipped`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertSummary {
    /// Valid listings classified by the store
    pub total_found: usize,

    /// First sightings of a dedup key
    pub inserted: usize,

    /// Keys that already existed
    pub updated: usize,

    pub skipped: Vec<ListingDiagnostic>,
}

impl UpsertSummary {
    /// Every classified listing is exactly one of inserted or updated.
    pub fn is_consistent(&self) -> bool {
        self.inserted + self.updated == self.total_found
    }
}

/// Upsert a batch, stamping it with the current time.
pub async fn upsert_listings<S>(store: &S, listings: &[NormalizedListing]) -> Result<UpsertSummary>
where
    S: JobStore + ?Sized,
{
    upsert_listings_at(store, listings, Utc::now()).await
}

/// Upsert a batch with an explicit scrape timestamp.
///
/// Malformed listings are skipped with a diagnostic. A store failure aborts
/// the whole batch and is returned as an error.
pub async fn upsert_listings_at<S>(
    store: &S,
    listings: &[NormalizedListing],
    scraped_at: DateTime<Utc>,
) -> Result<UpsertSummary>
where
    S: JobStore + ?Sized,
{
    let mut valid = Vec::with_capacity(listings.len());
    let mut skipped = Vec::new();

    for (index, listing) in listings.iter().enumerate() {
        match listing.validate() {
            Ok(()) => valid.push(listing.clone()),
            Err(err) => {
                warn!(
                    index,
                    source = %listing.source,
                    external_id = %listing.external_id,
                    error = %err,
                    "Skipping malformed listing"
                );
                skipped.push(ListingDiagnostic {
                    index,
                    source: listing.source.clone(),
                    external_id: listing.external_id.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    if valid.is_empty() {
        return Ok(UpsertSummary {
            skipped,
            ..Default::default()
        });
    }

    let outcomes = store.upsert_batch(&valid, scraped_at).await?;
    let inserted = outcomes.iter().filter(|o| o.is_inserted()).count();

    let summary = UpsertSummary {
        total_found: outcomes.len(),
        inserted,
        updated: outcomes.len() - inserted,
        skipped,
    };

    debug!(
        total_found = summary.total_found,
        inserted = summary.inserted,
        updated = summary.updated,
        skipped = summary.skipped.len(),
        "Upserted listings"
    );
    Ok(summary)
}
