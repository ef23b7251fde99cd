//! Search parameters passed uniformly to every adapter.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::listing::{ExperienceLevel, JobType, NormalizedListing};

/// Result limit applied when the caller does not ask for one.
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Upper bound on any requested result limit.
pub const MAX_SEARCH_LIMIT: usize = 100;

/// Recency bucket for "posted within".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostedWithin {
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl PostedWithin {
    pub fn as_duration(&self) -> Duration {
        match self {
            PostedWithin::Day => Duration::hours(24),
            PostedWithin::Week => Duration::days(7),
            PostedWithin::Month => Duration::days(30),
        }
    }

    /// Earliest posted timestamp inside this bucket.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.as_duration()
    }
}

/// Normalized search request.
///
/// Every adapter receives the same shape. Adapters apply the filters they
/// understand and silently ignore the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    /// Free-text query
    #[serde(default)]
    pub query: String,

    pub location: Option<String>,

    /// Only remote listings when `Some(true)`
    pub remote: Option<bool>,

    pub job_type: Option<JobType>,
    pub experience_level: Option<ExperienceLevel>,
    pub salary_min: Option<i64>,
    pub posted_within: Option<PostedWithin>,

    /// Requested result count; see [`SearchParams::limit`]
    #[serde(rename = "limit")]
    pub requested_limit: Option<usize>,
}

impl SearchParams {
    /// Create params for a free-text query with no filters.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Minimal request used by liveness probes.
    pub fn probe() -> Self {
        Self::new("test").with_limit(1)
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn remote_only(mut self) -> Self {
        self.remote = Some(true);
        self
    }

    pub fn with_job_type(mut self, job_type: JobType) -> Self {
        self.job_type = Some(job_type);
        self
    }

    pub fn with_experience_level(mut self, level: ExperienceLevel) -> Self {
        self.experience_level = Some(level);
        self
    }

    pub fn with_salary_min(mut self, salary_min: i64) -> Self {
        self.salary_min = Some(salary_min);
        self
    }

    pub fn posted_within(mut self, bucket: PostedWithin) -> Self {
        self.posted_within = Some(bucket);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.requested_limit = Some(limit);
        self
    }

    /// Effective result limit: the requested value (default 50) capped at 100.
    pub fn limit(&self) -> usize {
        self.requested_limit
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .clamp(1, MAX_SEARCH_LIMIT)
    }

    /// Best-effort filter for adapters that fetch broadly and filter locally.
    ///
    /// Listings missing a field are admitted: an adapter cannot know a value
    /// the source never reported.
    pub fn admits(&self, listing: &NormalizedListing, now: DateTime<Utc>) -> bool {
        let query = self.query.trim().to_lowercase();
        if !query.is_empty() {
            let haystack = format!(
                "{} {} {}",
                listing.title,
                listing.company,
                listing.description.as_deref().unwrap_or_default()
            )
            .to_lowercase();
            if !query.split_whitespace().all(|term| haystack.contains(term)) {
                return false;
            }
        }

        if let (Some(wanted), Some(actual)) = (&self.location, &listing.location) {
            if !actual.to_lowercase().contains(&wanted.to_lowercase()) {
                return false;
            }
        }

        if self.remote == Some(true) && !listing.remote {
            return false;
        }

        if let (Some(wanted), Some(actual)) = (self.job_type, listing.job_type) {
            if wanted != actual {
                return false;
            }
        }

        if let (Some(wanted), Some(actual)) = (self.experience_level, listing.experience_level) {
            if wanted != actual {
                return false;
            }
        }

        if let Some(floor) = self.salary_min {
            if let Some(top) = listing.salary_max.or(listing.salary_min) {
                if top < floor {
                    return false;
                }
            }
        }

        if let (Some(bucket), Some(posted)) = (self.posted_within, listing.posted_at) {
            if posted < bucket.cutoff(now) {
                return false;
            }
        }

        true
    }
}
