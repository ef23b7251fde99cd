//! Recording user actions on jobs and reading back derived state.

use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use crate::error::{AggregationError, Result};
use crate::traits::store::{InteractionStore, JobStore};
use crate::types::{
    interaction::{JobInteraction, JobState, NewInteraction, PipelineBoard},
    job::JobRecord,
};

/// A job together with the state folded from its interactions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobWithState {
    pub job: JobRecord,
    pub state: JobState,
    pub interactions: Vec<JobInteraction>,
}

/// Append an interaction to a known job.
pub async fn record_interaction<S>(store: &S, input: NewInteraction) -> Result<JobInteraction>
where
    S: JobStore + InteractionStore + ?Sized,
{
    input.validate()?;
    if store.get_job(input.job_id).await?.is_none() {
        return Err(AggregationError::not_found("job", input.job_id));
    }

    let recorded = store.record_interaction(&input, Utc::now()).await?;
    debug!(
        job_id = recorded.job_id,
        action = recorded.action.as_str(),
        "Recorded interaction"
    );
    Ok(recorded)
}

pub async fn job_with_state<S>(store: &S, job_id: i64) -> Result<JobWithState>
where
    S: JobStore + InteractionStore + ?Sized,
{
    let job = store
        .get_job(job_id)
        .await?
        .ok_or_else(|| AggregationError::not_found("job", job_id))?;
    let interactions = store.interactions_for_job(job_id).await?;

    Ok(JobWithState {
        state: JobState::derive(&interactions),
        job,
        interactions,
    })
}

/// The personal pipeline board over every job with interactions.
pub async fn pipeline_board<S>(store: &S) -> Result<PipelineBoard>
where
    S: InteractionStore + ?Sized,
{
    let interactions = store.all_interactions().await?;
    Ok(PipelineBoard::build(&interactions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::upsert::upsert_listings;
    use crate::stores::MemoryStore;
    use crate::testing::listing;
    use crate::types::interaction::{InteractionAction, PipelineStage};

    #[tokio::test]
    async fn test_interaction_on_unknown_job_is_not_found() {
        let store = MemoryStore::new();
        let result =
            record_interaction(&store, NewInteraction::new(7, InteractionAction::Saved)).await;
        assert!(matches!(result, Err(AggregationError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_state_and_board_follow_interactions() {
        let store = MemoryStore::new();
        upsert_listings(&store, &[listing("rss", "1")]).await.unwrap();
        let job_id = store.jobs_scraped_since(None).await.unwrap()[0].id;

        record_interaction(
            &store,
            NewInteraction::new(job_id, InteractionAction::Applied)
                .with_stage(PipelineStage::Applied)
                .with_rating(4),
        )
        .await
        .unwrap();

        let view = job_with_state(&store, job_id).await.unwrap();
        assert_eq!(view.state.pipeline_stage, Some(PipelineStage::Applied));
        assert_eq!(view.state.rating, Some(4));

        let board = pipeline_board(&store).await.unwrap();
        assert_eq!(board.column(PipelineStage::Applied), &[job_id]);
    }
}
