//! Rate-limited source wrapper.
//!
//! Wraps any JobSource with rate limiting using the governor crate.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::error::SourceResult;
use crate::traits::source::JobSource;
use crate::types::{config::SourceConfig, listing::NormalizedListing, params::SearchParams};

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A source wrapper that enforces a request budget.
///
/// Every outbound call (search, lookup, health probe) waits for a permit.
pub struct RateLimitedSource<S: JobSource> {
    inner: S,
    limiter: Arc<DefaultRateLimiter>,
}

impl<S: JobSource> RateLimitedSource<S> {
    /// Allow `requests_per_minute` calls per minute.
    pub fn per_minute(source: S, requests_per_minute: NonZeroU32) -> Self {
        Self::with_quota(source, Quota::per_minute(requests_per_minute))
    }

    /// Create with a custom quota.
    pub fn with_quota(source: S, quota: Quota) -> Self {
        Self {
            inner: source,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn wait_for_permit(&self) {
        self.limiter.until_ready().await;
    }
}

#[async_trait]
impl<S: JobSource> JobSource for RateLimitedSource<S> {
    fn config(&self) -> &SourceConfig {
        self.inner.config()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn search(&self, params: &SearchParams) -> SourceResult<Vec<NormalizedListing>> {
        self.wait_for_permit().await;
        self.inner.search(params).await
    }

    async fn get_job(&self, external_id: &str) -> SourceResult<Option<NormalizedListing>> {
        self.wait_for_permit().await;
        self.inner.get_job(external_id).await
    }

    async fn health_check(&self) -> SourceResult<bool> {
        self.wait_for_permit().await;
        self.inner.health_check().await
    }
}

/// Box a source for the registry, wrapping it when its config declares a
/// rate limit.
pub fn apply_configured_limit<S: JobSource + 'static>(source: S) -> Arc<dyn JobSource> {
    match source.config().rate_limit {
        Some(limit) => match NonZeroU32::new(limit.requests_per_minute) {
            Some(rpm) => Arc::new(RateLimitedSource::per_minute(source, rpm)),
            None => {
                tracing::warn!(
                    source = %source.name(),
                    "Ignoring rate limit of 0 requests per minute"
                );
                Arc::new(source)
            }
        },
        None => Arc::new(source),
    }
}

/// Extension trait for easy rate limiting.
pub trait JobSourceExt: JobSource + Sized {
    /// Wrap this source with a per-minute budget.
    fn rate_limited(self, requests_per_minute: NonZeroU32) -> RateLimitedSource<Self> {
        RateLimitedSource::per_minute(self, requests_per_minute)
    }
}

// Implement for all sources
impl<S: JobSource + Sized> JobSourceExt for S {}
