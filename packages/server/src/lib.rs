// Job Aggregator - API Core
//
// JSON API over the job-sources core: fan-out search, persisted jobs,
// saved searches, interactions, and source health.
//
// Saved searches are re-run on a schedule from kernel/scheduled_tasks.rs.

pub mod config;
pub mod kernel;
pub mod server;

pub use config::*;
