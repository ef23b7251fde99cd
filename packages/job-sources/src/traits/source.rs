//! The adapter contract every job source implements.

use async_trait::async_trait;

use crate::error::{SourceError, SourceResult};
use crate::types::{config::SourceConfig, listing::NormalizedListing, params::SearchParams};

/// A pluggable integration with one external job source.
///
/// Adapters are read-only against their source and never persist anything.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Configuration the adapter was built with.
    fn config(&self) -> &SourceConfig;

    /// Unique source name.
    fn name(&self) -> &str {
        &self.config().name
    }

    /// Search the source.
    ///
    /// Filters the source cannot honor must be ignored, not rejected. Errors
    /// are reserved for transport, auth, and parse failures.
    async fn search(&self, params: &SearchParams) -> SourceResult<Vec<NormalizedListing>>;

    /// Look up one listing by its source-scoped id.
    ///
    /// `Ok(None)` means not found; adapters without single-item lookup keep
    /// this default and report [`SourceError::Unsupported`].
    async fn get_job(&self, _external_id: &str) -> SourceResult<Option<NormalizedListing>> {
        Err(SourceError::Unsupported {
            operation: "get_job",
        })
    }

    /// Cheap liveness probe.
    ///
    /// Adapters without a lighter endpoint can delegate to
    /// [`probe_with_search`].
    async fn health_check(&self) -> SourceResult<bool>;
}

/// Liveness by running the smallest possible search.
pub async fn probe_with_search<S: JobSource + ?Sized>(source: &S) -> SourceResult<bool> {
    source.search(&SearchParams::probe()).await.map(|_| true)
}
