//! The normalized listing shape every adapter produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ListingError;
use crate::types::job::DedupKey;

/// Employment type of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    FullTime,
    PartTime,
    Contract,
    #[serde(alias = "internship")]
    Intern,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::FullTime => "full-time",
            JobType::PartTime => "part-time",
            JobType::Contract => "contract",
            JobType::Intern => "intern",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full-time" | "fulltime" | "full_time" => Ok(JobType::FullTime),
            "part-time" | "parttime" | "part_time" => Ok(JobType::PartTime),
            "contract" => Ok(JobType::Contract),
            "intern" | "internship" => Ok(JobType::Intern),
            other => Err(format!("invalid job type: {}", other)),
        }
    }
}

/// Seniority of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Entry,
    Mid,
    Senior,
    Staff,
    Principal,
    Manager,
    Director,
    Executive,
}

impl ExperienceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperienceLevel::Entry => "entry",
            ExperienceLevel::Mid => "mid",
            ExperienceLevel::Senior => "senior",
            ExperienceLevel::Staff => "staff",
            ExperienceLevel::Principal => "principal",
            ExperienceLevel::Manager => "manager",
            ExperienceLevel::Director => "director",
            ExperienceLevel::Executive => "executive",
        }
    }
}

impl fmt::Display for ExperienceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExperienceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "entry" => Ok(ExperienceLevel::Entry),
            "mid" => Ok(ExperienceLevel::Mid),
            "senior" => Ok(ExperienceLevel::Senior),
            "staff" => Ok(ExperienceLevel::Staff),
            "principal" => Ok(ExperienceLevel::Principal),
            "manager" => Ok(ExperienceLevel::Manager),
            "director" => Ok(ExperienceLevel::Director),
            "executive" => Ok(ExperienceLevel::Executive),
            other => Err(format!("invalid experience level: {}", other)),
        }
    }
}

/// A job listing normalized from any source.
///
/// `(source, external_id)` is the dedup key: it identifies the same posting
/// across repeated scrapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedListing {
    /// Source-scoped identifier
    pub external_id: String,

    /// Name of the adapter that produced this listing
    #[serde(default)]
    pub source: String,

    pub title: String,
    pub company: String,
    pub location: Option<String>,

    /// Salary as displayed by the source ("$150k - $180k")
    pub salary: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,

    #[serde(default)]
    pub description: Option<String>,

    /// Canonical URL of the posting
    pub url: String,

    pub posted_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub remote: bool,

    pub job_type: Option<JobType>,
    pub experience_level: Option<ExperienceLevel>,

    #[serde(default)]
    pub skills: Vec<String>,

    /// Source-specific payload, kept verbatim
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl NormalizedListing {
    /// Create a listing with the required fields set.
    pub fn new(
        source: impl Into<String>,
        external_id: impl Into<String>,
        title: impl Into<String>,
        company: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            source: source.into(),
            title: title.into(),
            company: company.into(),
            location: None,
            salary: None,
            salary_min: None,
            salary_max: None,
            description: None,
            url: url.into(),
            posted_at: None,
            remote: false,
            job_type: None,
            experience_level: None,
            skills: Vec::new(),
            raw: serde_json::Value::Null,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_salary_range(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.salary_min = min;
        self.salary_max = max;
        self
    }

    pub fn with_salary_text(mut self, salary: impl Into<String>) -> Self {
        self.salary = Some(salary.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_posted_at(mut self, posted_at: DateTime<Utc>) -> Self {
        self.posted_at = Some(posted_at);
        self
    }

    pub fn remote(mut self, remote: bool) -> Self {
        self.remote = remote;
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

    pub fn with_skills(mut self, skills: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.skills = skills.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = raw;
        self
    }

    /// The dedup key for this listing.
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(&self.source, &self.external_id)
    }

    /// Check the fields the store requires.
    pub fn validate(&self) -> Result<(), ListingError> {
        let required = [
            ("externalId", &self.external_id),
            ("source", &self.source),
            ("title", &self.title),
            ("company", &self.company),
            ("url", &self.url),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ListingError::MissingField { field });
            }
        }

        if let (Some(min), Some(max)) = (self.salary_min, self.salary_max) {
            if min > max {
                return Err(ListingError::InvalidSalaryRange { min, max });
            }
        }

        Ok(())
    }
}
