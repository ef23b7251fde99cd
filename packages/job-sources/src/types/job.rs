//! Persisted job records and the dedup key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::listing::{ExperienceLevel, JobType, NormalizedListing};
use crate::types::params::{DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT};

/// `(source, external_id)`: unique across all persisted jobs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DedupKey {
    pub source: String,
    pub external_id: String,
}

impl DedupKey {
    pub fn new(source: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            external_id: external_id.into(),
        }
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.external_id)
    }
}

/// How a store reconciled one listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First sighting of the key; a new record was created
    Inserted(i64),

    /// The key already existed; only operational fields were touched
    Existing(i64),
}

impl UpsertOutcome {
    pub fn job_id(&self) -> i64 {
        match self {
            UpsertOutcome::Inserted(id) | UpsertOutcome::Existing(id) => *id,
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(self, UpsertOutcome::Inserted(_))
    }
}

/// A job as stored: the normalized listing plus store-owned fields.
///
/// Listing fields hold the first-seen values; re-scrapes only move
/// `scraped_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: i64,
    pub external_id: String,
    pub source: String,

    /// Link to the `job_sources` row
    pub source_id: Option<i64>,

    /// Link to the normalized `companies` row
    pub company_id: Option<i64>,

    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub description: Option<String>,
    pub url: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub remote: bool,
    pub job_type: Option<JobType>,
    pub experience_level: Option<ExperienceLevel>,
    pub skills: Vec<String>,
    pub raw: serde_json::Value,

    /// When the key was first inserted
    pub first_seen_at: DateTime<Utc>,

    /// Most recent scrape that returned this key
    pub scraped_at: DateTime<Utc>,

    /// Reserved for semantic matching
    pub embedding: Option<Vec<f32>>,
}

impl JobRecord {
    /// Build a fresh record from a listing at first sight.
    pub fn from_listing(
        id: i64,
        listing: &NormalizedListing,
        source_id: Option<i64>,
        company_id: Option<i64>,
        scraped_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            external_id: listing.external_id.clone(),
            source: listing.source.clone(),
            source_id,
            company_id,
            title: listing.title.clone(),
            company: listing.company.clone(),
            location: listing.location.clone(),
            salary: listing.salary.clone(),
            salary_min: listing.salary_min,
            salary_max: listing.salary_max,
            description: listing.description.clone(),
            url: listing.url.clone(),
            posted_at: listing.posted_at,
            remote: listing.remote,
            job_type: listing.job_type,
            experience_level: listing.experience_level,
            skills: listing.skills.clone(),
            raw: listing.raw.clone(),
            first_seen_at: scraped_at,
            scraped_at,
            embedding: None,
        }
    }

    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(&self.source, &self.external_id)
    }

    /// Case-insensitive substring match on title, company, or description.
    pub fn contains_text(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.company.to_lowercase().contains(&needle)
            || self
                .description
                .as_deref()
                .map(|d| d.to_lowercase().contains(&needle))
                .unwrap_or(false)
    }
}

/// Browse query over persisted jobs, newest scrape first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobQuery {
    /// Substring over title, company, and description
    pub text: Option<String>,
    pub source: Option<String>,

    /// Only remote jobs when `Some(true)`
    pub remote: Option<bool>,

    pub limit: Option<usize>,

    #[serde(default)]
    pub offset: usize,
}

impl JobQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn for_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn remote_only(mut self) -> Self {
        self.remote = Some(true);
        self
    }

    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }

    /// Effective page size: default 50, capped at 100.
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .clamp(1, MAX_SEARCH_LIMIT)
    }

    pub fn matches(&self, job: &JobRecord) -> bool {
        if let Some(text) = self.text.as_deref().filter(|t| !t.trim().is_empty()) {
            if !job.contains_text(text.trim()) {
                return false;
            }
        }
        if let Some(source) = &self.source {
            if &job.source != source {
                return false;
            }
        }
        if self.remote == Some(true) && !job.remote {
            return false;
        }
        true
    }
}
