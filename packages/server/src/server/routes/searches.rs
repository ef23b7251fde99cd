//! Saved search endpoints.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use job_sources::{
    create_saved_search, delete_saved_search, mark_viewed, run_saved_search,
    saved_search_results, toggle_saved_search, JobRecord, NewSavedSearch, SavedSearch,
    SavedSearchStore, SearchRun,
};
use serde::Serialize;

use crate::server::app::AppState;
use crate::server::error::ApiResult;

pub async fn list_searches_handler(
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Vec<SavedSearch>>> {
    let searches = state.store.list_saved_searches().await?;
    Ok(Json(searches))
}

pub async fn create_search_handler(
    Extension(state): Extension<AppState>,
    Json(input): Json<NewSavedSearch>,
) -> ApiResult<(StatusCode, Json<SavedSearch>)> {
    let search = create_saved_search(state.store.as_ref(), input).await?;
    Ok((StatusCode::CREATED, Json(search)))
}

pub async fn toggle_search_handler(
    Extension(state): Extension<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<SavedSearch>> {
    let search = toggle_saved_search(state.store.as_ref(), id).await?;
    Ok(Json(search))
}

pub async fn delete_search_handler(
    Extension(state): Extension<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    delete_saved_search(state.store.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Run a saved search immediately, paused or not.
pub async fn run_search_handler(
    Extension(state): Extension<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<SearchRun>> {
    let run = run_saved_search(state.store.as_ref(), id).await?;
    Ok(Json(run))
}

#[derive(Serialize)]
pub struct SearchResultsResponse {
    search: SavedSearch,
    jobs: Vec<JobRecord>,
}

/// Matched jobs of a saved search. Reading them counts as viewing, so the
/// unseen counter is reset.
pub async fn search_results_handler(
    Extension(state): Extension<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<SearchResultsResponse>> {
    let jobs = saved_search_results(state.store.as_ref(), id).await?;
    let search = mark_viewed(state.store.as_ref(), id).await?;
    Ok(Json(SearchResultsResponse { search, jobs }))
}
