//! Source listing and runtime enable/disable.

use axum::{
    extract::{Extension, Path},
    Json,
};
use job_sources::{RateLimit, SourceKind, SourceStatus, SourceStatusStore};
use serde::Serialize;

use crate::server::app::AppState;
use crate::server::error::{ApiError, ApiResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSummary {
    name: String,
    kind: SourceKind,
    enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    rate_limit: Option<RateLimit>,

    /// Sync history; absent until the source's first aggregation run
    status: Option<SourceStatus>,
}

/// Registered sources in registration order, with their sync history.
pub async fn list_sources_handler(
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Vec<SourceSummary>>> {
    let mut statuses = state.store.source_statuses().await?;

    let summaries = state
        .registry
        .get_all()
        .into_iter()
        .map(|source| {
            let config = source.config();
            let status = statuses
                .iter()
                .position(|s| s.name == config.name)
                .map(|index| statuses.swap_remove(index));
            SourceSummary {
                name: config.name.clone(),
                kind: config.kind,
                enabled: state.registry.is_enabled(&config.name).unwrap_or(false),
                rate_limit: config.rate_limit,
                status,
            }
        })
        .collect();

    Ok(Json(summaries))
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    name: String,
    enabled: bool,
}

pub async fn enable_source_handler(
    Extension(state): Extension<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<ToggleResponse>> {
    set_enabled(&state, name, true)
}

pub async fn disable_source_handler(
    Extension(state): Extension<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<ToggleResponse>> {
    set_enabled(&state, name, false)
}

fn set_enabled(state: &AppState, name: String, enabled: bool) -> ApiResult<Json<ToggleResponse>> {
    if !state.registry.set_enabled(&name, enabled) {
        return Err(ApiError::NotFound(format!("unknown source: {}", name)));
    }
    Ok(Json(ToggleResponse { name, enabled }))
}
