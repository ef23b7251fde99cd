//! Test harness driving the API router in-process.
//!
//! Each test gets a fresh in-memory SQLite store and a registry of mock
//! sources; requests go through the full router via `tower::ServiceExt`.

use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use job_sources::{
    testing::{listings, MockSource},
    RegistryConfig, SourceRegistry, SqliteStore,
};
use serde_json::Value;
use server_core::{
    server::{build_app, AppState},
    Config,
};
use std::time::Duration;
use test_context::AsyncTestContext;
use tower::ServiceExt;

/// Test harness with a live router over an in-memory database.
///
/// # Example using test-context
///
/// ```ignore
/// use test_context::test_context;
///
/// #[test_context(TestHarness)]
/// #[tokio::test]
/// async fn my_test(ctx: &TestHarness) {
///     let (status, body) = ctx.get("/api/jobs").await;
///     // ... test code
/// }
/// ```
pub struct TestHarness {
    pub state: AppState,
    pub app: Router,

    /// Handle to the "greenhouse" mock, for changing listings between runs
    pub greenhouse: MockSource,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new().await
    }

    async fn teardown(self) {
        // In-memory database is dropped with the pool
    }
}

impl TestHarness {
    /// Three sources: two healthy boards and one with a bad key.
    pub async fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let greenhouse =
            MockSource::new("greenhouse").with_listings(listings("greenhouse", "gh", 3));

        let mut registry = SourceRegistry::new(
            RegistryConfig::new().with_source_timeout(Duration::from_millis(500)),
        );
        registry.register(greenhouse.clone());
        registry.register(MockSource::new("lever").failing("invalid API key"));
        registry.register(MockSource::new("rss").with_listings(listings("rss", "r", 2)));

        let store = SqliteStore::in_memory()
            .await
            .expect("Failed to create in-memory store");
        let state = AppState::new(store, registry, Config::default());
        let app = build_app(state.clone());

        Self {
            state,
            app,
            greenhouse,
        }
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, None).await
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header(CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(request.body(body).expect("valid request"))
            .await
            .expect("router is infallible");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}
