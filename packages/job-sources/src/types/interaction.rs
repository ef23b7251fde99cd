//! User interactions with jobs and the state derived from them.
//!
//! Interactions are append-only rows. The "current state" of a job is never
//! stored; it is folded from the rows on read.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{AggregationError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionAction {
    Viewed,
    Saved,
    Hidden,
    Applied,
    Archived,
}

impl InteractionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionAction::Viewed => "viewed",
            InteractionAction::Saved => "saved",
            InteractionAction::Hidden => "hidden",
            InteractionAction::Applied => "applied",
            InteractionAction::Archived => "archived",
        }
    }
}

impl std::str::FromStr for InteractionAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "viewed" => Ok(InteractionAction::Viewed),
            "saved" => Ok(InteractionAction::Saved),
            "hidden" => Ok(InteractionAction::Hidden),
            "applied" => Ok(InteractionAction::Applied),
            "archived" => Ok(InteractionAction::Archived),
            other => Err(format!("invalid interaction action: {}", other)),
        }
    }
}

/// Kanban column of the personal application pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Interested,
    Applied,
    Interviewing,
    Offer,
    Rejected,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 5] = [
        PipelineStage::Interested,
        PipelineStage::Applied,
        PipelineStage::Interviewing,
        PipelineStage::Offer,
        PipelineStage::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Interested => "interested",
            PipelineStage::Applied => "applied",
            PipelineStage::Interviewing => "interviewing",
            PipelineStage::Offer => "offer",
            PipelineStage::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for PipelineStage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        PipelineStage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| format!("invalid pipeline stage: {}", s))
    }
}

/// One recorded user action on a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInteraction {
    pub id: i64,
    pub job_id: i64,
    pub action: InteractionAction,
    pub pipeline_stage: Option<PipelineStage>,
    pub notes: Option<String>,
    pub rating: Option<u8>,
    pub applied_at: Option<DateTime<Utc>>,
    pub response_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Input for recording an interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInteraction {
    pub job_id: i64,
    pub action: InteractionAction,
    pub pipeline_stage: Option<PipelineStage>,
    pub notes: Option<String>,
    pub rating: Option<u8>,
    pub applied_at: Option<DateTime<Utc>>,
    pub response_at: Option<DateTime<Utc>>,
}

impl NewInteraction {
    pub fn new(job_id: i64, action: InteractionAction) -> Self {
        Self {
            job_id,
            action,
            pipeline_stage: None,
            notes: None,
            rating: None,
            applied_at: None,
            response_at: None,
        }
    }

    pub fn with_stage(mut self, stage: PipelineStage) -> Self {
        self.pipeline_stage = Some(stage);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_rating(mut self, rating: u8) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_applied_at(mut self, applied_at: DateTime<Utc>) -> Self {
        self.applied_at = Some(applied_at);
        self
    }

    /// Ratings are 1 to 5.
    pub fn validate(&self) -> Result<()> {
        if let Some(rating) = self.rating {
            if !(1..=5).contains(&rating) {
                return Err(AggregationError::invalid(format!(
                    "rating must be between 1 and 5, got {}",
                    rating
                )));
            }
        }
        Ok(())
    }

    pub fn into_interaction(self, id: i64, created_at: DateTime<Utc>) -> JobInteraction {
        JobInteraction {
            id,
            job_id: self.job_id,
            action: self.action,
            pipeline_stage: self.pipeline_stage,
            notes: self.notes,
            rating: self.rating,
            applied_at: self.applied_at,
            response_at: self.response_at,
            created_at,
        }
    }
}

/// Current state of one job, folded from its interaction log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobState {
    pub last_action: Option<InteractionAction>,
    pub pipeline_stage: Option<PipelineStage>,
    pub notes: Option<String>,
    pub rating: Option<u8>,
    pub applied_at: Option<DateTime<Utc>>,
    pub response_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl JobState {
    /// Fold rows in `(created_at, id)` order; each field keeps its latest
    /// non-empty value.
    pub fn derive(interactions: &[JobInteraction]) -> Self {
        let mut ordered: Vec<&JobInteraction> = interactions.iter().collect();
        ordered.sort_by_key(|i| (i.created_at, i.id));

        let mut state = JobState::default();
        for row in ordered {
            state.last_action = Some(row.action);
            state.updated_at = Some(row.created_at);
            if row.pipeline_stage.is_some() {
                state.pipeline_stage = row.pipeline_stage;
            }
            if let Some(notes) = row.notes.as_ref().filter(|n| !n.trim().is_empty()) {
                state.notes = Some(notes.clone());
            }
            if row.rating.is_some() {
                state.rating = row.rating;
            }
            if row.applied_at.is_some() {
                state.applied_at = row.applied_at;
            }
            if row.response_at.is_some() {
                state.response_at = row.response_at;
            }
        }
        state
    }

    /// Whether the job should stay off boards and discovery lists.
    pub fn is_dismissed(&self) -> bool {
        matches!(
            self.last_action,
            Some(InteractionAction::Hidden) | Some(InteractionAction::Archived)
        )
    }
}

/// Jobs grouped by pipeline stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineBoard {
    pub columns: BTreeMap<PipelineStage, Vec<i64>>,
}

impl PipelineBoard {
    /// Group jobs by derived stage, dropping hidden and archived ones.
    ///
    /// Within a column jobs keep the order in which they first appear in
    /// `interactions`.
    pub fn build(interactions: &[JobInteraction]) -> Self {
        let mut by_job: IndexMap<i64, Vec<JobInteraction>> = IndexMap::new();
        for row in interactions {
            by_job.entry(row.job_id).or_default().push(row.clone());
        }

        let mut columns: BTreeMap<PipelineStage, Vec<i64>> =
            PipelineStage::ALL.into_iter().map(|s| (s, Vec::new())).collect();

        for (job_id, rows) in by_job {
            let state = JobState::derive(&rows);
            if state.is_dismissed() {
                continue;
            }
            if let Some(stage) = state.pipeline_stage {
                columns.entry(stage).or_default().push(job_id);
            }
        }

        Self { columns }
    }

    pub fn column(&self, stage: PipelineStage) -> &[i64] {
        self.columns.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }
}
