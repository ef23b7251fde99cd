//! Integration tests for fan-out search and the upsert pipeline.
//!
//! These tests verify:
//! 1. Failure isolation across sources
//! 2. The counting invariant `inserted + updated == total_found`
//! 3. Idempotence of repeated runs
//! 4. Uniqueness of `(source, external_id)` under concurrent upserts
//! 5. The conservative merge policy

use std::sync::Arc;
use std::time::Duration;

use job_sources::{
    aggregate, upsert_listings,
    testing::{listing, listings, MockSource},
    DedupKey, JobStore, MemoryStore, NormalizedListing, RegistryConfig, SearchParams,
    SourceRegistry,
};
use proptest::prelude::*;

/// Helper to build a registry with a short timeout.
fn test_registry() -> SourceRegistry {
    SourceRegistry::new(RegistryConfig::new().with_source_timeout(Duration::from_millis(500)))
}

#[tokio::test]
async fn test_one_failing_source_among_three() {
    let mut registry = test_registry();
    registry.register(MockSource::new("a").with_listings(listings("a", "a", 3)));
    registry.register(MockSource::new("b").failing("invalid API key"));
    registry.register(MockSource::new("c").with_listings(listings("c", "c", 2)));

    let results = registry.search_all(&SearchParams::new("engineer")).await;
    assert_eq!(results.len(), 5);

    let health = registry.health_check_all().await;
    let expected: Vec<(String, bool)> = vec![
        ("a".to_string(), true),
        ("b".to_string(), false),
        ("c".to_string(), true),
    ];
    assert_eq!(health.into_iter().collect::<Vec<_>>(), expected);
}

#[tokio::test]
async fn test_greenhouse_rescrape_keeps_first_description() {
    let greenhouse = MockSource::new("greenhouse")
        .with_listing(listing("greenhouse", "abc123").with_description("Original posting"));
    let mut registry = test_registry();
    registry.register(greenhouse.clone());
    let store = MemoryStore::new();
    let params = SearchParams::new("engineer");

    let first = aggregate(&registry, &store, &params).await.unwrap();
    assert_eq!((first.inserted, first.updated), (1, 0));

    greenhouse.set_listings(vec![
        listing("greenhouse", "abc123").with_description("Edited posting text")
    ]);
    let second = aggregate(&registry, &store, &params).await.unwrap();
    assert_eq!((second.inserted, second.updated), (0, 1));
    assert_eq!(store.count_jobs().await.unwrap(), 1);

    let stored = store
        .find_by_key(&DedupKey::new("greenhouse", "abc123"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.description.as_deref(), Some("Original posting"));
    assert!(stored.scraped_at >= stored.first_seen_at);
}

#[tokio::test]
async fn test_concurrent_overlapping_upserts_insert_once() {
    let store = Arc::new(MemoryStore::new());
    let batch = listings("lever", "job", 20);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            let batch = batch.clone();
            tokio::spawn(async move { upsert_listings(store.as_ref(), &batch).await.unwrap() })
        })
        .collect();

    let mut inserted = 0;
    for handle in handles {
        let summary = handle.await.unwrap();
        assert!(summary.is_consistent());
        inserted += summary.inserted;
    }

    assert_eq!(inserted, 20);
    assert_eq!(store.count_jobs().await.unwrap(), 20);
}

#[tokio::test]
async fn test_slow_source_does_not_block_aggregation() {
    let mut registry = test_registry();
    registry.register(
        MockSource::new("slow")
            .with_listings(listings("slow", "s", 2))
            .with_delay(Duration::from_secs(5)),
    );
    registry.register(MockSource::new("fast").with_listings(listings("fast", "f", 2)));
    let store = MemoryStore::new();

    let summary = aggregate(&registry, &store, &SearchParams::new("x"))
        .await
        .unwrap();
    assert_eq!(summary.total_found, 2);
    assert_eq!(summary.failed_sources().count(), 1);
    assert!(summary.sources[0]
        .error
        .as_deref()
        .is_some_and(|e| e.contains("timed out")));
}

fn arb_listing() -> impl Strategy<Value = NormalizedListing> {
    (
        prop::sample::select(vec!["greenhouse", "lever", "rss"]),
        0u8..12,
        prop::bool::weighted(0.15),
    )
        .prop_map(|(source, id, malformed)| {
            let mut l = listing(source, &id.to_string());
            if malformed {
                l.url = String::new();
            }
            l
        })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn prop_counts_always_balance(batch in prop::collection::vec(arb_listing(), 0..40)) {
        let rt = runtime();
        let store = MemoryStore::new();

        let summary = rt.block_on(upsert_listings(&store, &batch)).unwrap();
        prop_assert_eq!(summary.inserted + summary.updated, summary.total_found);
        prop_assert_eq!(summary.total_found + summary.skipped.len(), batch.len());
        prop_assert_eq!(store.job_count(), summary.inserted);
    }

    #[test]
    fn prop_second_run_inserts_nothing(batch in prop::collection::vec(arb_listing(), 0..40)) {
        let rt = runtime();
        let store = MemoryStore::new();

        let first = rt.block_on(upsert_listings(&store, &batch)).unwrap();
        let second = rt.block_on(upsert_listings(&store, &batch)).unwrap();

        prop_assert_eq!(second.inserted, 0);
        prop_assert_eq!(second.updated, second.total_found);
        prop_assert_eq!(second.total_found, first.total_found);
        prop_assert_eq!(store.job_count(), first.inserted);
    }
}
