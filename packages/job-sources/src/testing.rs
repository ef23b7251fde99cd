//! Testing utilities including a mock job source.
//!
//! These are useful for testing applications that use the job sources
//! library without calling any real job board.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{SourceError, SourceResult};
use crate::traits::source::{probe_with_search, JobSource};
use crate::types::{config::SourceConfig, listing::NormalizedListing, params::SearchParams};

/// A mock job source for testing.
///
/// Returns every configured listing from `search`, ignoring filters and the
/// requested limit. Clones share listings and call history, so a test can
/// keep a handle after registering the source.
#[derive(Clone)]
pub struct MockSource {
    config: SourceConfig,

    /// Listings returned by every search
    listings: Arc<RwLock<Vec<NormalizedListing>>>,

    /// Error message returned instead of results
    failure: Option<String>,

    /// Latency added before every call settles
    delay: Option<Duration>,

    panics: bool,
    unhealthy: bool,

    /// Call tracking
    calls: Arc<RwLock<Vec<MockSourceCall>>>,
}

/// Record of a call made to the mock source.
#[derive(Debug, Clone, PartialEq)]
pub enum MockSourceCall {
    Search { query: String, limit: usize },
    GetJob { external_id: String },
    HealthCheck,
}

impl MockSource {
    /// Create an enabled mock source with no listings.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(SourceConfig::new(name))
    }

    /// Create a mock source from an explicit config.
    pub fn with_config(config: SourceConfig) -> Self {
        Self {
            config,
            listings: Arc::new(RwLock::new(Vec::new())),
            failure: None,
            delay: None,
            panics: false,
            unhealthy: false,
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Add a listing.
    pub fn with_listing(self, listing: NormalizedListing) -> Self {
        self.listings.write().unwrap().push(listing);
        self
    }

    /// Add multiple listings.
    pub fn with_listings(self, listings: impl IntoIterator<Item = NormalizedListing>) -> Self {
        self.listings.write().unwrap().extend(listings);
        self
    }

    /// Fail every search with a transport error.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Delay every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Panic inside every search.
    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    /// Report `Ok(false)` from health checks while searches still work.
    pub fn unhealthy(mut self) -> Self {
        self.unhealthy = true;
        self
    }

    /// Replace the listings returned from now on.
    pub fn set_listings(&self, listings: Vec<NormalizedListing>) {
        *self.listings.write().unwrap() = listings;
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockSourceCall> {
        self.calls.read().unwrap().clone()
    }

    /// Number of searches made so far.
    pub fn search_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MockSourceCall::Search { .. }))
            .count()
    }

    fn record(&self, call: MockSourceCall) {
        self.calls.write().unwrap().push(call);
    }

    async fn settle(&self) -> SourceResult<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panics {
            panic!("mock source {} panicked", self.config.name);
        }
        match &self.failure {
            Some(message) => Err(SourceError::Http(message.clone().into())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl JobSource for MockSource {
    fn config(&self) -> &SourceConfig {
        &self.config
    }

    async fn search(&self, params: &SearchParams) -> SourceResult<Vec<NormalizedListing>> {
        self.record(MockSourceCall::Search {
            query: params.query.clone(),
            limit: params.limit(),
        });
        self.settle().await?;
        Ok(self.listings.read().unwrap().clone())
    }

    async fn get_job(&self, external_id: &str) -> SourceResult<Option<NormalizedListing>> {
        self.record(MockSourceCall::GetJob {
            external_id: external_id.to_string(),
        });
        self.settle().await?;
        Ok(self
            .listings
            .read()
            .unwrap()
            .iter()
            .find(|l| l.external_id == external_id)
            .cloned())
    }

    async fn health_check(&self) -> SourceResult<bool> {
        self.record(MockSourceCall::HealthCheck);
        if self.unhealthy {
            return Ok(false);
        }
        probe_with_search(self).await
    }
}

/// A valid listing fixture for `source`.
pub fn listing(source: &str, external_id: &str) -> NormalizedListing {
    NormalizedListing::new(
        source,
        external_id,
        format!("Engineer {}", external_id),
        "Acme",
        format!("https://{}.example/jobs/{}", source, external_id),
    )
}

/// `count` listings with ids `{prefix}-0`, `{prefix}-1`, ...
pub fn listings(source: &str, prefix: &str, count: usize) -> Vec<NormalizedListing> {
    (0..count)
        .map(|i| listing(source, &format!("{}-{}", prefix, i)))
        .collect()
}
