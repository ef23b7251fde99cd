//! End-to-end tests of the JSON API.
//!
//! The harness registers three mock sources: `greenhouse` (3 listings),
//! `lever` (always fails), and `rss` (2 listings).

mod common;

use axum::http::StatusCode;
use common::TestHarness;
use job_sources::testing::{listing, MockSourceCall};
use serde_json::{json, Value};
use test_context::test_context;

/// Run a search and return the id of the first listed job.
async fn seed(ctx: &TestHarness) -> i64 {
    let (status, _) = ctx
        .post("/api/jobs/search", json!({ "query": "engineer" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = ctx.get("/api/jobs?limit=1").await;
    body["jobs"][0]["id"].as_i64().unwrap()
}

fn source_names(body: &Value) -> Vec<&str> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect()
}

// ============================================================================
// Search
// ============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn test_search_reports_failed_source_and_keeps_others(ctx: &TestHarness) {
    let (status, body) = ctx
        .post("/api/jobs/search", json!({ "query": "engineer" }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["totalFound"], 5);
    assert_eq!(body["inserted"], 5);
    assert_eq!(body["updated"], 0);

    let sources = body["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 3);
    assert_eq!(sources[1]["source"], "lever");
    assert!(sources[1]["error"]
        .as_str()
        .is_some_and(|e| e.contains("invalid API key")));
    assert!(sources[0]["error"].is_null());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_repeated_search_only_updates(ctx: &TestHarness) {
    ctx.post("/api/jobs/search", json!({ "query": "engineer" }))
        .await;

    ctx.greenhouse.set_listings(vec![
        listing("greenhouse", "gh-0").with_description("edited"),
        listing("greenhouse", "gh-new"),
    ]);
    let (_, body) = ctx
        .post("/api/jobs/search", json!({ "query": "engineer" }))
        .await;

    assert_eq!(body["totalFound"], 4);
    assert_eq!(body["inserted"], 1);
    assert_eq!(body["updated"], 3);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_search_limit_is_capped(ctx: &TestHarness) {
    ctx.post("/api/jobs/search", json!({ "query": "rust", "limit": 500 }))
        .await;

    let calls = ctx.greenhouse.calls();
    assert!(calls.contains(&MockSourceCall::Search {
        query: "rust".to_string(),
        limit: 100,
    }));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_malformed_search_body_is_rejected(ctx: &TestHarness) {
    let (status, _) = ctx
        .post("/api/jobs/search", json!({ "remote": "sometimes" }))
        .await;
    assert!(status.is_client_error());
}

// ============================================================================
// Browsing jobs
// ============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn test_list_jobs_filters_and_limits(ctx: &TestHarness) {
    seed(ctx).await;

    let (status, body) = ctx.get("/api/jobs?source=rss").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert!(body["jobs"]
        .as_array()
        .unwrap()
        .iter()
        .all(|j| j["source"] == "rss"));

    let (_, paged) = ctx.get("/api/jobs?limit=2&offset=4").await;
    assert_eq!(paged["count"], 1);

    let (_, capped) = ctx.get("/api/jobs?limit=1000").await;
    assert_eq!(capped["limit"], 100);
    assert_eq!(capped["count"], 5);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_get_job_and_missing_job(ctx: &TestHarness) {
    let id = seed(ctx).await;

    let (status, body) = ctx.get(&format!("/api/jobs/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["job"]["id"], id);
    assert!(body["state"]["lastAction"].is_null());
    assert_eq!(body["interactions"], json!([]));

    let (status, body) = ctx.get("/api/jobs/9999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

// ============================================================================
// Interactions
// ============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn test_interactions_drive_state_and_pipeline(ctx: &TestHarness) {
    let id = seed(ctx).await;

    let (status, body) = ctx
        .post(
            &format!("/api/jobs/{}/interactions", id),
            json!({ "action": "applied", "pipelineStage": "interviewing", "rating": 4 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["jobId"], id);

    let (_, job) = ctx.get(&format!("/api/jobs/{}", id)).await;
    assert_eq!(job["state"]["pipelineStage"], "interviewing");
    assert_eq!(job["state"]["rating"], 4);

    let (status, board) = ctx.get("/api/pipeline").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(board["columns"]["interviewing"][0]["id"], id);

    // Hiding the job takes it off the board
    ctx.post(
        &format!("/api/jobs/{}/interactions", id),
        json!({ "action": "hidden" }),
    )
    .await;
    let (_, board) = ctx.get("/api/pipeline").await;
    assert_eq!(board["columns"]["interviewing"], json!([]));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_invalid_interactions(ctx: &TestHarness) {
    let id = seed(ctx).await;

    let (status, _) = ctx
        .post(
            &format!("/api/jobs/{}/interactions", id),
            json!({ "action": "saved", "rating": 9 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = ctx
        .post("/api/jobs/9999/interactions", json!({ "action": "saved" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Saved searches
// ============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn test_saved_search_lifecycle(ctx: &TestHarness) {
    seed(ctx).await;

    let (status, created) = ctx
        .post(
            "/api/searches",
            json!({ "name": "boards", "query": "engineer", "filters": { "remoteOnly": false } }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["isActive"], true);
    let id = created["id"].as_i64().unwrap();

    let (status, run) = ctx.post(&format!("/api/searches/{}/run", id), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["newMatches"], 5);
    assert_eq!(run["newJobCount"], 5);

    let (_, listed) = ctx.get("/api/searches").await;
    assert_eq!(listed[0]["newJobCount"], 5);

    let (status, results) = ctx.get(&format!("/api/searches/{}/jobs", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results["jobs"].as_array().unwrap().len(), 5);
    assert_eq!(results["search"]["newJobCount"], 0);
    assert!(!results["search"]["lastRunAt"].is_null());

    let (_, toggled) = ctx
        .post(&format!("/api/searches/{}/toggle", id), json!({}))
        .await;
    assert_eq!(toggled["isActive"], false);

    let (status, _) = ctx.delete(&format!("/api/searches/{}", id)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = ctx.delete(&format!("/api/searches/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_saved_search_validation(ctx: &TestHarness) {
    let (status, body) = ctx
        .post("/api/searches", json!({ "name": "  ", "query": "rust" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("name"));

    let (status, _) = ctx
        .post(
            "/api/searches",
            json!({
                "name": "inverted",
                "query": "",
                "filters": { "salaryMin": 200000, "salaryMax": 100000 }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = ctx.post("/api/searches/42/run", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Sources and health
// ============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn test_sources_list_status_after_search(ctx: &TestHarness) {
    let (_, before) = ctx.get("/api/sources").await;
    assert_eq!(source_names(&before), vec!["greenhouse", "lever", "rss"]);
    assert!(before[0]["status"].is_null());

    seed(ctx).await;

    let (_, after) = ctx.get("/api/sources").await;
    assert_eq!(after[0]["status"]["jobCount"], 3);
    assert!(after[1]["status"]["lastError"]
        .as_str()
        .is_some_and(|e| e.contains("invalid API key")));
    assert!(after[1]["status"]["lastSuccessAt"].is_null());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_disabled_source_is_skipped(ctx: &TestHarness) {
    let (status, body) = ctx.post("/api/sources/rss/disable", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enabled"], false);

    let (_, search) = ctx
        .post("/api/jobs/search", json!({ "query": "engineer" }))
        .await;
    assert_eq!(search["totalFound"], 3);
    assert_eq!(search["sources"].as_array().unwrap().len(), 2);

    let (_, sources) = ctx.get("/api/sources").await;
    assert_eq!(sources[2]["enabled"], false);

    ctx.post("/api/sources/rss/enable", json!({})).await;
    let (_, search) = ctx
        .post("/api/jobs/search", json!({ "query": "engineer" }))
        .await;
    assert_eq!(search["sources"].as_array().unwrap().len(), 3);

    let (status, _) = ctx.post("/api/sources/monster/disable", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_health_reports_database_and_sources(ctx: &TestHarness) {
    ctx.post("/api/sources/rss/disable", json!({})).await;

    let (status, body) = ctx.get("/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"]["status"], "ok");
    assert!(body["timestamp"].is_string());
    assert_eq!(body["sources"]["enabled"], json!(["greenhouse", "lever"]));
    assert_eq!(
        body["sources"]["health"],
        json!({ "greenhouse": true, "lever": false, "rss": true })
    );
}
