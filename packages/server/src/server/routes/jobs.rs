//! Job search, browse, and interaction endpoints.

use std::collections::BTreeMap;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use job_sources::{
    aggregate, job_with_state, pipeline_board, record_interaction, AggregationSummary,
    InteractionAction, JobInteraction, JobQuery, JobRecord, JobStore, JobWithState,
    NewInteraction, PipelineStage, SearchParams,
};
use serde::{Deserialize, Serialize};

use crate::server::app::AppState;
use crate::server::error::ApiResult;

#[derive(Serialize)]
pub struct SearchResponse {
    success: bool,
    #[serde(flatten)]
    summary: AggregationSummary,
}

/// Fan a search out to every enabled source and persist the results.
///
/// Source failures are reported in `sources`; only a store failure fails
/// the request.
pub async fn search_jobs_handler(
    Extension(state): Extension<AppState>,
    Json(mut params): Json<SearchParams>,
) -> ApiResult<Json<SearchResponse>> {
    params.requested_limit = Some(state.config.clamp_limit(params.requested_limit));

    let summary = aggregate(&state.registry, state.store.as_ref(), &params).await?;
    tracing::info!(
        query = %params.query,
        total_found = summary.total_found,
        inserted = summary.inserted,
        updated = summary.updated,
        "Job search complete"
    );

    Ok(Json(SearchResponse {
        success: true,
        summary,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListJobsParams {
    q: Option<String>,
    source: Option<String>,
    remote: Option<bool>,
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Serialize)]
pub struct JobListResponse {
    jobs: Vec<JobRecord>,
    count: usize,
    limit: usize,
    offset: usize,
}

/// Browse persisted jobs, newest scrape first.
pub async fn list_jobs_handler(
    Extension(state): Extension<AppState>,
    Query(params): Query<ListJobsParams>,
) -> ApiResult<Json<JobListResponse>> {
    let limit = state.config.clamp_limit(params.limit);
    let offset = params.offset.unwrap_or(0);

    let query = JobQuery {
        text: params.q.filter(|q| !q.trim().is_empty()),
        source: params.source.filter(|s| !s.trim().is_empty()),
        remote: params.remote.filter(|remote| *remote),
        limit: Some(limit),
        offset,
    };

    let jobs = state.store.list_jobs(&query).await?;
    Ok(Json(JobListResponse {
        count: jobs.len(),
        jobs,
        limit,
        offset,
    }))
}

pub async fn get_job_handler(
    Extension(state): Extension<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<JobWithState>> {
    let job = job_with_state(state.store.as_ref(), id).await?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionRequest {
    action: InteractionAction,
    pipeline_stage: Option<PipelineStage>,
    notes: Option<String>,
    rating: Option<u8>,
    applied_at: Option<DateTime<Utc>>,
    response_at: Option<DateTime<Utc>>,
}

impl InteractionRequest {
    fn into_new(self, job_id: i64) -> NewInteraction {
        NewInteraction {
            job_id,
            action: self.action,
            pipeline_stage: self.pipeline_stage,
            notes: self.notes,
            rating: self.rating,
            applied_at: self.applied_at,
            response_at: self.response_at,
        }
    }
}

pub async fn record_interaction_handler(
    Extension(state): Extension<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<InteractionRequest>,
) -> ApiResult<(StatusCode, Json<JobInteraction>)> {
    let recorded = record_interaction(state.store.as_ref(), request.into_new(id)).await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}

#[derive(Serialize)]
pub struct PipelineResponse {
    columns: BTreeMap<PipelineStage, Vec<JobRecord>>,
}

/// Jobs grouped by pipeline stage, hidden and archived jobs excluded.
pub async fn pipeline_handler(
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<PipelineResponse>> {
    let board = pipeline_board(state.store.as_ref()).await?;

    let mut columns = BTreeMap::new();
    for (stage, job_ids) in board.columns {
        let jobs = state.store.get_jobs(&job_ids).await?;
        columns.insert(stage, jobs);
    }

    Ok(Json(PipelineResponse { columns }))
}
