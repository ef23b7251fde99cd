use axum::{extract::Extension, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::server::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: DateTime<Utc>,
    database: DatabaseHealth,
    sources: SourcesHealth,
}

#[derive(Serialize)]
pub struct DatabaseHealth {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
pub struct SourcesHealth {
    /// Names of enabled sources, in registration order
    enabled: Vec<String>,

    /// Probe result for every registered source
    health: IndexMap<String, bool>,
}

/// Health check endpoint
///
/// Checks:
/// - Database connectivity and responsiveness
/// - Every registered source's health probe
///
/// Returns 200 OK when the database answers, 503 Service Unavailable
/// otherwise. Unhealthy sources are reported but never fail the check.
pub async fn health_handler(
    Extension(state): Extension<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let db_health = match tokio::time::timeout(
        std::time::Duration::from_secs(5),
        state.store.ping(),
    )
    .await
    {
        Ok(Ok(())) => DatabaseHealth {
            status: "ok".to_string(),
            error: None,
        },
        Ok(Err(e)) => DatabaseHealth {
            status: "error".to_string(),
            error: Some(format!("Query failed: {}", e)),
        },
        Err(_) => DatabaseHealth {
            status: "error".to_string(),
            error: Some("Query timeout (>5s)".to_string()),
        },
    };

    let enabled = state
        .registry
        .get_enabled()
        .iter()
        .map(|source| source.name().to_string())
        .collect();
    let health = state.registry.health_check_all().await;

    let is_healthy = db_health.status == "ok";

    let overall_status = if is_healthy { "healthy" } else { "unhealthy" };

    let status_code = if is_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: overall_status.to_string(),
            timestamp: Utc::now(),
            database: db_health,
            sources: SourcesHealth { enabled, health },
        }),
    )
}
