//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! This module provides periodic tasks that run on schedules:
//! - Re-running saved searches against newly scraped jobs
//!
//! # Architecture
//!
//! Scheduled tasks run independently of request handling. The saved-search
//! pass only reads jobs already in the store; it never calls a source.
//!
//! ```text
//! Scheduler (SAVED_SEARCH_SCHEDULE)
//!     │
//!     └─► run_active_searches()
//!             └─► For each active, due search → match jobs scraped since last run
//! ```

use std::sync::Arc;

use anyhow::Result;
use job_sources::{run_active_searches, SqliteStore};
use tokio_cron_scheduler::{Job, JobScheduler};

/// Start all scheduled tasks
pub async fn start_scheduler(store: Arc<SqliteStore>, schedule: &str) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let search_store = store.clone();
    let search_job = Job::new_async(schedule, move |_uuid, _lock| {
        let store = search_store.clone();
        Box::pin(async move {
            if let Err(e) = run_saved_search_pass(&store).await {
                tracing::error!("Saved search task failed: {}", e);
            }
        })
    })?;

    scheduler.add(search_job).await?;
    scheduler.start().await?;

    tracing::info!(schedule = %schedule, "Scheduled tasks started (saved-search matching)");
    Ok(scheduler)
}

/// Run one pass of the saved-search matching loop
///
/// Failures of individual searches are logged and reported by the pass
/// itself; only a failure to list searches is an error here.
pub async fn run_saved_search_pass(store: &SqliteStore) -> Result<()> {
    tracing::info!("Running saved search task");

    let pass = run_active_searches(store).await?;
    let new_matches: usize = pass.runs.iter().map(|run| run.new_matches).sum();

    tracing::info!(
        ran = pass.runs.len(),
        failed = pass.failures.len(),
        new_matches,
        "Saved search task complete"
    );

    Ok(())
}
