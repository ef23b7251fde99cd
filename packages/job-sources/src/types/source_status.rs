//! Per-source sync bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one source within one aggregation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSync {
    pub source: String,
    pub synced_at: DateTime<Utc>,
    pub listing_count: usize,
    pub duration_ms: u64,

    /// `None` when the source succeeded
    pub error: Option<String>,
}

impl SourceSync {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Persisted health history of a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStatus {
    pub id: i64,
    pub name: String,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,

    /// Jobs currently stored for this source
    pub job_count: i64,

    pub sync_count: i64,
    pub avg_sync_duration_ms: Option<i64>,
}

impl SourceStatus {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            last_sync_at: None,
            last_success_at: None,
            last_error_at: None,
            last_error: None,
            job_count: 0,
            sync_count: 0,
            avg_sync_duration_ms: None,
        }
    }

    /// Fold a sync result into the running status.
    pub fn apply(&mut self, sync: &SourceSync, job_count: i64) {
        self.last_sync_at = Some(sync.synced_at);
        match &sync.error {
            None => {
                self.last_success_at = Some(sync.synced_at);
            }
            Some(err) => {
                self.last_error_at = Some(sync.synced_at);
                self.last_error = Some(err.clone());
            }
        }

        let previous_total = self.avg_sync_duration_ms.unwrap_or(0) * self.sync_count;
        self.sync_count += 1;
        self.avg_sync_duration_ms =
            Some((previous_total + sync.duration_ms as i64) / self.sync_count);
        self.job_count = job_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sync(duration_ms: u64, error: Option<&str>) -> SourceSync {
        SourceSync {
            source: "rss".to_string(),
            synced_at: Utc::now(),
            listing_count: 3,
            duration_ms,
            error: error.map(String::from),
        }
    }

    #[test]
    fn test_apply_tracks_average_duration() {
        let mut status = SourceStatus::new(1, "rss");
        status.apply(&sync(100, None), 3);
        status.apply(&sync(300, None), 5);

        assert_eq!(status.sync_count, 2);
        assert_eq!(status.avg_sync_duration_ms, Some(200));
        assert_eq!(status.job_count, 5);
        assert!(status.last_error.is_none());
    }

    #[test]
    fn test_apply_keeps_last_success_on_failure() {
        let mut status = SourceStatus::new(1, "rss");
        status.apply(&sync(10, None), 1);
        let success_at = status.last_success_at;

        status.apply(&sync(10, Some("timed out")), 1);
        assert_eq!(status.last_success_at, success_at);
        assert_eq!(status.last_error.as_deref(), Some("timed out"));
        assert!(status.last_error_at.is_some());
    }
}
