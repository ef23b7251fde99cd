//! The source registry: owns the configured adapters and fans calls out
//! to them.
//!
//! One adapter's failure never aborts or taints another's results. Every
//! adapter call runs under its own timeout and panic guard; errors are
//! logged and reported per source, never propagated to the caller.

use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use indexmap::IndexMap;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{SourceError, SourceResult};
use crate::sources::apply_configured_limit;
use crate::traits::source::JobSource;
use crate::types::{config::RegistryConfig, listing::NormalizedListing, params::SearchParams};

struct Registered {
    source: Arc<dyn JobSource>,
    enabled: AtomicBool,
}

/// Outcome of one adapter within a fan-out.
#[derive(Debug)]
pub struct SourceReport {
    pub source: String,

    /// Listing count on success
    pub outcome: Result<usize, SourceError>,

    pub elapsed: Duration,
}

impl SourceReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn listing_count(&self) -> usize {
        self.outcome.as_ref().ok().copied().unwrap_or(0)
    }

    pub fn error(&self) -> Option<&SourceError> {
        self.outcome.as_ref().err()
    }
}

/// Merged result of a fan-out search.
#[derive(Debug, Default)]
pub struct FanOut {
    /// Successful results in adapter order, then per-adapter order
    pub listings: Vec<NormalizedListing>,

    /// One report per enabled adapter, in adapter order
    pub reports: Vec<SourceReport>,
}

impl FanOut {
    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceReport> {
        self.reports.iter().filter(|r| !r.is_success())
    }
}

/// Health of one adapter.
#[derive(Debug, Clone)]
pub struct SourceHealth {
    pub name: String,
    pub enabled: bool,
    pub healthy: bool,

    /// Why the probe failed, when it raised an error
    pub error: Option<String>,

    pub elapsed: Duration,
}

/// Registry of job source adapters.
///
/// Built once at startup and shared by handle. Registration takes `&mut
/// self`; enabling and disabling go through `&self` so a shared registry can
/// be toggled at runtime.
pub struct SourceRegistry {
    sources: IndexMap<String, Registered>,
    config: RegistryConfig,
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl SourceRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            sources: IndexMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register an adapter under its name, wrapping it in a rate limiter
    /// when its config declares one.
    ///
    /// Registering an existing name replaces that adapter in place and
    /// returns the old one.
    pub fn register<S: JobSource + 'static>(&mut self, source: S) -> Option<Arc<dyn JobSource>> {
        self.register_arc(apply_configured_limit(source))
    }

    /// Register an already shared adapter as-is.
    pub fn register_arc(&mut self, source: Arc<dyn JobSource>) -> Option<Arc<dyn JobSource>> {
        let name = source.name().to_string();
        let enabled = source.config().enabled;
        let replaced = self
            .sources
            .insert(
                name.clone(),
                Registered {
                    source,
                    enabled: AtomicBool::new(enabled),
                },
            )
            .map(|old| old.source);

        if replaced.is_some() {
            info!(source = %name, "Replaced job source");
        } else {
            debug!(source = %name, enabled, "Registered job source");
        }
        replaced
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn JobSource>> {
        self.sources.get(name).map(|r| Arc::clone(&r.source))
    }

    /// All adapters in registration order.
    pub fn get_all(&self) -> Vec<Arc<dyn JobSource>> {
        self.sources.values().map(|r| Arc::clone(&r.source)).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }

    /// Enabled adapters in registration order.
    pub fn get_enabled(&self) -> Vec<Arc<dyn JobSource>> {
        self.sources
            .values()
            .filter(|r| r.enabled.load(Ordering::Acquire))
            .map(|r| Arc::clone(&r.source))
            .collect()
    }

    /// Enable or disable an adapter. Returns false for an unknown name.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        match self.sources.get(name) {
            Some(registered) => {
                registered.enabled.store(enabled, Ordering::Release);
                info!(source = %name, enabled, "Toggled job source");
                true
            }
            None => false,
        }
    }

    /// `None` for an unknown name.
    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.sources
            .get(name)
            .map(|r| r.enabled.load(Ordering::Acquire))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Search every enabled adapter concurrently and concatenate the
    /// successful results.
    pub async fn search_all(&self, params: &SearchParams) -> Vec<NormalizedListing> {
        self.search_all_detailed(params).await.listings
    }

    /// Like [`search_all`](Self::search_all), also reporting each adapter's
    /// outcome.
    pub async fn search_all_detailed(&self, params: &SearchParams) -> FanOut {
        self.fan_out(params, None).await
    }

    /// Fan out until every adapter settles or `cancel` fires.
    ///
    /// On cancellation, results already collected are kept and adapters
    /// still running report [`SourceError::Cancelled`].
    pub async fn search_all_with_cancel(
        &self,
        params: &SearchParams,
        cancel: &CancellationToken,
    ) -> FanOut {
        self.fan_out(params, Some(cancel)).await
    }

    async fn fan_out(&self, params: &SearchParams, cancel: Option<&CancellationToken>) -> FanOut {
        let enabled = self.get_enabled();
        if enabled.is_empty() {
            debug!("No enabled job sources");
            return FanOut::default();
        }

        let started = Instant::now();
        let mut settled: Vec<Option<(SourceResult<Vec<NormalizedListing>>, Duration)>> =
            enabled.iter().map(|_| None).collect();

        let mut pending: FuturesUnordered<_> = enabled
            .iter()
            .enumerate()
            .map(|(slot, source)| {
                let limit = self.timeout_for(source.as_ref());
                async move {
                    let call_started = Instant::now();
                    let outcome = guarded(limit, source.search(params)).await;
                    (slot, outcome, call_started.elapsed())
                }
            })
            .collect();

        loop {
            let next = match cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        warn!(pending = pending.len(), "Fan-out cancelled, dropping pending sources");
                        break;
                    }
                    next = pending.next() => next,
                },
                None => pending.next().await,
            };

            match next {
                Some((slot, outcome, elapsed)) => settled[slot] = Some((outcome, elapsed)),
                None => break,
            }
        }
        drop(pending);

        let mut fan_out = FanOut::default();
        for (source, slot) in enabled.iter().zip(settled) {
            let name = source.name().to_string();
            let (outcome, elapsed) =
                slot.unwrap_or_else(|| (Err(SourceError::Cancelled), started.elapsed()));

            let outcome = match outcome {
                Ok(mut listings) => {
                    for listing in &mut listings {
                        listing.source.clone_from(&name);
                    }
                    let count = listings.len();
                    debug!(source = %name, count, elapsed_ms = elapsed.as_millis() as u64, "Source search succeeded");
                    fan_out.listings.extend(listings);
                    Ok(count)
                }
                Err(err) => {
                    warn!(source = %name, error = %err, "Source search failed");
                    Err(err)
                }
            };

            fan_out.reports.push(SourceReport {
                source: name,
                outcome,
                elapsed,
            });
        }

        info!(
            sources = fan_out.reports.len(),
            failed = fan_out.failed_sources().count(),
            listings = fan_out.listings.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fan-out search complete"
        );
        fan_out
    }

    /// Probe every registered adapter, enabled or not.
    pub async fn health_report_all(&self) -> Vec<SourceHealth> {
        let probes = self.sources.iter().map(|(name, registered)| {
            let limit = self.timeout_for(registered.source.as_ref());
            let enabled = registered.enabled.load(Ordering::Acquire);
            async move {
                let started = Instant::now();
                let (healthy, error) =
                    match guarded(limit, registered.source.health_check()).await {
                        Ok(healthy) => (healthy, None),
                        Err(err) => {
                            warn!(source = %name, error = %err, "Health check failed");
                            (false, Some(err.to_string()))
                        }
                    };
                SourceHealth {
                    name: name.clone(),
                    enabled,
                    healthy,
                    error,
                    elapsed: started.elapsed(),
                }
            }
        });

        join_all(probes).await
    }

    /// Health of every registered adapter by name, in registration order.
    pub async fn health_check_all(&self) -> IndexMap<String, bool> {
        self.health_report_all()
            .await
            .into_iter()
            .map(|h| (h.name, h.healthy))
            .collect()
    }

    /// Single-listing lookup routed to one adapter.
    pub async fn get_job(
        &self,
        source: &str,
        external_id: &str,
    ) -> SourceResult<Option<NormalizedListing>> {
        let adapter = self.get(source).ok_or_else(|| SourceError::UnknownSource {
            name: source.to_string(),
        })?;
        let limit = self.timeout_for(adapter.as_ref());
        let found = guarded(limit, adapter.get_job(external_id)).await?;
        Ok(found.map(|mut listing| {
            listing.source = source.to_string();
            listing
        }))
    }

    fn timeout_for(&self, source: &dyn JobSource) -> Duration {
        source.config().timeout.unwrap_or(self.config.source_timeout)
    }
}

/// Run an adapter call under a timeout, turning a panic into an error.
async fn guarded<T, F>(limit: Duration, call: F) -> SourceResult<T>
where
    F: Future<Output = SourceResult<T>>,
{
    match tokio::time::timeout(limit, AssertUnwindSafe(call).catch_unwind()).await {
        Ok(Ok(result)) => result,
        Ok(Err(payload)) => Err(SourceError::Panicked(panic_message(payload))),
        Err(_) => Err(SourceError::Timeout { after: limit }),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{listing, listings, MockSource, MockSourceCall};
    use crate::types::config::SourceConfig;

    fn registry() -> SourceRegistry {
        SourceRegistry::new(RegistryConfig::new().with_source_timeout(Duration::from_millis(200)))
    }

    #[tokio::test]
    async fn test_failing_source_is_isolated() {
        let mut registry = registry();
        registry.register(MockSource::new("a").with_listings(listings("a", "a", 3)));
        registry.register(MockSource::new("b").failing("connection refused"));
        registry.register(MockSource::new("c").with_listings(listings("c", "c", 2)));

        let results = registry.search_all(&SearchParams::new("rust")).await;
        assert_eq!(results.len(), 5);
        let ids: Vec<_> = results.iter().map(|l| l.external_id.as_str()).collect();
        assert_eq!(ids, vec!["a-0", "a-1", "a-2", "c-0", "c-1"]);

        let health = registry.health_check_all().await;
        assert_eq!(health.get("a"), Some(&true));
        assert_eq!(health.get("b"), Some(&false));
        assert_eq!(health.get("c"), Some(&true));
    }

    #[tokio::test]
    async fn test_no_enabled_sources_yields_empty() {
        let mut registry = registry();
        assert!(registry.search_all(&SearchParams::new("rust")).await.is_empty());

        registry.register(MockSource::with_config(SourceConfig::new("off").disabled()));
        let fan_out = registry.search_all_detailed(&SearchParams::new("rust")).await;
        assert!(fan_out.listings.is_empty());
        assert!(fan_out.reports.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let mut registry = registry();
        registry.register(
            MockSource::new("slow")
                .with_listing(listing("slow", "1"))
                .with_delay(Duration::from_secs(5)),
        );
        registry.register(MockSource::new("fast").with_listing(listing("fast", "1")));

        let fan_out = registry.search_all_detailed(&SearchParams::new("x")).await;
        assert_eq!(fan_out.listings.len(), 1);
        assert_eq!(fan_out.listings[0].source, "fast");
        assert!(matches!(
            fan_out.reports[0].outcome,
            Err(SourceError::Timeout { .. })
        ));
        assert_eq!(fan_out.reports[1].listing_count(), 1);
    }

    #[tokio::test]
    async fn test_per_source_timeout_override() {
        let mut registry = registry();
        registry.register(
            MockSource::with_config(
                SourceConfig::new("patient").with_timeout(Duration::from_secs(2)),
            )
            .with_listing(listing("patient", "1"))
            .with_delay(Duration::from_millis(300)),
        );

        let results = registry.search_all(&SearchParams::new("x")).await;
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_panicking_source_is_isolated() {
        let mut registry = registry();
        registry.register(MockSource::new("boom").panicking());
        registry.register(MockSource::new("ok").with_listing(listing("ok", "1")));

        let fan_out = registry.search_all_detailed(&SearchParams::new("x")).await;
        assert_eq!(fan_out.listings.len(), 1);
        assert!(matches!(fan_out.reports[0].outcome, Err(SourceError::Panicked(_))));
    }

    #[tokio::test]
    async fn test_results_follow_registration_order_not_completion() {
        let mut registry = registry();
        registry.register(
            MockSource::new("first")
                .with_listing(listing("first", "1"))
                .with_delay(Duration::from_millis(50)),
        );
        registry.register(MockSource::new("second").with_listing(listing("second", "1")));

        let results = registry.search_all(&SearchParams::new("x")).await;
        let sources: Vec<_> = results.iter().map(|l| l.source.as_str()).collect();
        assert_eq!(sources, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_registry_stamps_source_name() {
        let mut registry = registry();
        registry.register(MockSource::new("greenhouse").with_listing(listing("placeholder", "abc123")));

        let results = registry.search_all(&SearchParams::new("x")).await;
        assert_eq!(results[0].source, "greenhouse");
    }

    #[tokio::test]
    async fn test_registry_does_not_truncate() {
        let mut registry = registry();
        registry.register(MockSource::new("chatty").with_listings(listings("chatty", "j", 3)));

        let results = registry.search_all(&SearchParams::new("x").with_limit(1)).await;
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_disabled_sources_skip_search_but_get_health_checked() {
        let mut registry = registry();
        let off = MockSource::with_config(SourceConfig::new("off").disabled());
        registry.register(off.clone());
        registry.register(MockSource::new("on"));

        registry.search_all(&SearchParams::new("x")).await;
        assert_eq!(off.search_count(), 0);

        let report = registry.health_report_all().await;
        assert_eq!(report.len(), 2);
        assert!(!report[0].enabled);
        assert!(report[0].healthy);
        assert!(off.calls().contains(&MockSourceCall::HealthCheck));
    }

    #[tokio::test]
    async fn test_last_registration_wins_in_place() {
        let mut registry = registry();
        registry.register(MockSource::new("a").with_listing(listing("a", "old")));
        registry.register(MockSource::new("b"));
        let replaced = registry.register(MockSource::new("a").with_listing(listing("a", "new")));

        assert!(replaced.is_some());
        assert_eq!(registry.names(), vec!["a", "b"]);
        let results = registry.search_all(&SearchParams::new("x")).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].external_id, "new");
    }

    #[tokio::test]
    async fn test_set_enabled_toggles_fan_out() {
        let mut registry = registry();
        registry.register(MockSource::new("a").with_listing(listing("a", "1")));

        assert!(registry.set_enabled("a", false));
        assert_eq!(registry.is_enabled("a"), Some(false));
        assert!(registry.search_all(&SearchParams::new("x")).await.is_empty());

        assert!(registry.set_enabled("a", true));
        assert_eq!(registry.search_all(&SearchParams::new("x")).await.len(), 1);
        assert!(!registry.set_enabled("missing", true));
        assert_eq!(registry.is_enabled("missing"), None);
    }

    #[tokio::test]
    async fn test_cancel_keeps_completed_results() {
        let mut registry = SourceRegistry::default();
        registry.register(MockSource::new("fast").with_listing(listing("fast", "1")));
        registry.register(
            MockSource::new("straggler")
                .with_listing(listing("straggler", "1"))
                .with_delay(Duration::from_secs(10)),
        );

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let fan_out = registry
            .search_all_with_cancel(&SearchParams::new("x"), &token)
            .await;
        assert_eq!(fan_out.listings.len(), 1);
        assert_eq!(fan_out.listings[0].source, "fast");
        assert!(matches!(fan_out.reports[1].outcome, Err(SourceError::Cancelled)));
    }

    #[tokio::test]
    async fn test_unhealthy_probe_reports_no_error() {
        let mut registry = registry();
        registry.register(MockSource::new("sick").unhealthy());

        let report = registry.health_report_all().await;
        assert!(!report[0].healthy);
        assert!(report[0].error.is_none());
    }

    #[tokio::test]
    async fn test_get_job_routes_to_source() {
        let mut registry = registry();
        registry.register(MockSource::new("lever").with_listing(listing("lever", "42")));

        let found = registry.get_job("lever", "42").await.unwrap().unwrap();
        assert_eq!(found.source, "lever");
        assert!(registry.get_job("lever", "nope").await.unwrap().is_none());
        assert!(matches!(
            registry.get_job("missing", "1").await,
            Err(SourceError::UnknownSource { .. })
        ));
    }
}
