//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use job_sources::{SourceRegistry, SqliteStore};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::server::routes::{
    create_search_handler, delete_search_handler, disable_source_handler, enable_source_handler,
    get_job_handler, health_handler, list_jobs_handler, list_searches_handler,
    list_sources_handler, pipeline_handler, record_interaction_handler, run_search_handler,
    search_jobs_handler, search_results_handler, toggle_search_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqliteStore>,
    pub registry: Arc<SourceRegistry>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: SqliteStore, registry: SourceRegistry, config: Config) -> Self {
        Self {
            store: Arc::new(store),
            registry: Arc::new(registry),
            config: Arc::new(config),
        }
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    // No configured origins: allow any origin for development
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE])
}

/// Build the Axum application router
pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        // Jobs
        .route("/api/jobs", get(list_jobs_handler))
        .route("/api/jobs/search", post(search_jobs_handler))
        .route("/api/jobs/:id", get(get_job_handler))
        .route("/api/jobs/:id/interactions", post(record_interaction_handler))
        .route("/api/pipeline", get(pipeline_handler))
        // Saved searches
        .route(
            "/api/searches",
            get(list_searches_handler).post(create_search_handler),
        )
        .route("/api/searches/:id", delete(delete_search_handler))
        .route("/api/searches/:id/toggle", post(toggle_search_handler))
        .route("/api/searches/:id/run", post(run_search_handler))
        .route("/api/searches/:id/jobs", get(search_results_handler))
        // Sources
        .route("/api/sources", get(list_sources_handler))
        .route("/api/sources/:name/enable", post(enable_source_handler))
        .route("/api/sources/:name/disable", post(disable_source_handler))
        // Health check
        .route("/api/health", get(health_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
