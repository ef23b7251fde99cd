//! Saved searches and the matching predicate.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::job::JobRecord;
use crate::types::listing::{ExperienceLevel, JobType};

/// Structured filters of a saved search.
///
/// Empty lists and `None` bounds do not restrict results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchFilters {
    /// Any of these (substring of the job location)
    pub locations: Vec<String>,
    pub remote_only: bool,

    /// Inclusive lower bound on the job's top salary
    pub salary_min: Option<i64>,

    /// Inclusive upper bound on the job's bottom salary
    pub salary_max: Option<i64>,

    pub job_types: Vec<JobType>,
    pub experience_levels: Vec<ExperienceLevel>,

    /// Allow-list, any of
    pub companies: Vec<String>,

    /// Deny-list, none of
    pub exclude_companies: Vec<String>,

    /// Job skills must intersect these
    pub skills: Vec<String>,

    pub posted_within_days: Option<u32>,
}

impl SearchFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remote_only(mut self) -> Self {
        self.remote_only = true;
        self
    }

    pub fn with_salary_min(mut self, min: i64) -> Self {
        self.salary_min = Some(min);
        self
    }

    pub fn with_salary_max(mut self, max: i64) -> Self {
        self.salary_max = Some(max);
        self
    }

    pub fn with_locations(mut self, locations: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.locations = locations.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_job_types(mut self, job_types: impl IntoIterator<Item = JobType>) -> Self {
        self.job_types = job_types.into_iter().collect();
        self
    }

    pub fn with_experience_levels(
        mut self,
        levels: impl IntoIterator<Item = ExperienceLevel>,
    ) -> Self {
        self.experience_levels = levels.into_iter().collect();
        self
    }

    pub fn with_companies(mut self, companies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.companies = companies.into_iter().map(Into::into).collect();
        self
    }

    pub fn excluding_companies(
        mut self,
        companies: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.exclude_companies = companies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_skills(mut self, skills: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.skills = skills.into_iter().map(Into::into).collect();
        self
    }

    pub fn posted_within_days(mut self, days: u32) -> Self {
        self.posted_within_days = Some(days);
        self
    }

    /// True when every filter present is satisfied by `job`.
    pub fn matches(&self, job: &JobRecord, now: DateTime<Utc>) -> bool {
        if !self.locations.is_empty() {
            let Some(location) = job.location.as_deref().map(str::to_lowercase) else {
                return false;
            };
            if !self
                .locations
                .iter()
                .any(|wanted| location.contains(&wanted.to_lowercase()))
            {
                return false;
            }
        }

        if self.remote_only && !job.remote {
            return false;
        }

        if let Some(floor) = self.salary_min {
            match job.salary_max.or(job.salary_min) {
                Some(top) if top >= floor => {}
                _ => return false,
            }
        }

        if let Some(ceiling) = self.salary_max {
            match job.salary_min.or(job.salary_max) {
                Some(bottom) if bottom <= ceiling => {}
                _ => return false,
            }
        }

        if !self.job_types.is_empty()
            && !job.job_type.is_some_and(|t| self.job_types.contains(&t))
        {
            return false;
        }

        if !self.experience_levels.is_empty()
            && !job
                .experience_level
                .is_some_and(|l| self.experience_levels.contains(&l))
        {
            return false;
        }

        if !self.companies.is_empty()
            && !self
                .companies
                .iter()
                .any(|c| c.eq_ignore_ascii_case(job.company.trim()))
        {
            return false;
        }

        if self
            .exclude_companies
            .iter()
            .any(|c| c.eq_ignore_ascii_case(job.company.trim()))
        {
            return false;
        }

        if !self.skills.is_empty()
            && !job
                .skills
                .iter()
                .any(|have| self.skills.iter().any(|want| want.eq_ignore_ascii_case(have)))
        {
            return false;
        }

        if let Some(days) = self.posted_within_days {
            // Sources that omit a posting date fall back to first sighting
            let posted = job.posted_at.unwrap_or(job.first_seen_at);
            if posted < now - Duration::days(i64::from(days)) {
                return false;
            }
        }

        true
    }
}

/// Free-text predicate: every whitespace-separated term must appear in the
/// title, company, or description. A blank query matches everything.
pub fn query_matches(query: &str, job: &JobRecord) -> bool {
    query
        .split_whitespace()
        .all(|term| job.contains_text(term))
}

/// How often the scheduled loop re-evaluates a saved search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Realtime,
    #[default]
    Daily,
    Weekly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Realtime => "realtime",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
        }
    }

    /// Minimum gap between scheduled runs; realtime runs on every tick.
    pub fn interval(&self) -> Duration {
        match self {
            Frequency::Realtime => Duration::zero(),
            Frequency::Daily => Duration::days(1),
            Frequency::Weekly => Duration::weeks(1),
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "realtime" => Ok(Frequency::Realtime),
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            other => Err(format!("invalid frequency: {}", other)),
        }
    }
}

/// Lifecycle of a saved search. Deletion removes the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SavedSearchStatus {
    Active,
    Paused,
}

/// A persisted query the user wants re-evaluated over time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSearch {
    pub id: i64,
    pub name: String,
    pub query: String,
    pub filters: SearchFilters,
    pub is_active: bool,
    pub notify_email: bool,
    pub frequency: Frequency,

    /// Matches counted since the user last viewed results
    pub new_job_count: i64,

    pub created_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_viewed_at: Option<DateTime<Utc>>,

    /// Highest job id visible to the last run. Jobs above it have not been
    /// scanned yet, whatever their `scraped_at`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_job_id: Option<i64>,
}

/// What a run changed on its saved search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedMatches {
    /// Jobs added to the match set by this run
    pub new_matches: usize,

    /// Counter value after the run
    pub new_job_count: i64,
}

impl SavedSearch {
    pub fn status(&self) -> SavedSearchStatus {
        if self.is_active {
            SavedSearchStatus::Active
        } else {
            SavedSearchStatus::Paused
        }
    }

    /// Full predicate: query and every structured filter.
    pub fn matches(&self, job: &JobRecord, now: DateTime<Utc>) -> bool {
        query_matches(&self.query, job) && self.filters.matches(job, now)
    }

    /// Whether the scheduled loop should run this search at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        match self.last_run_at {
            None => true,
            Some(last) => now - last >= self.frequency.interval(),
        }
    }
}

/// Input for creating a saved search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSavedSearch {
    pub name: String,
    pub query: String,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default)]
    pub notify_email: bool,
}

impl NewSavedSearch {
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    /// Build the stored form with a fresh, active lifecycle.
    pub fn into_saved(self, id: i64, now: DateTime<Utc>) -> SavedSearch {
        SavedSearch {
            id,
            name: self.name,
            query: self.query,
            filters: self.filters,
            is_active: true,
            notify_email: self.notify_email,
            frequency: self.frequency,
            new_job_count: 0,
            created_at: now,
            last_run_at: None,
            last_viewed_at: None,
            last_job_id: None,
        }
    }
}
