//! Plan generation, lookup and workout completion

use super::{require_athlete, CommandError};
use crate::db::AppState;
use crate::llm::LlmError;
use crate::models::TrainingPlan;
use crate::plans::{self, FeedbackInput, PlanAdherence, PlanError, PlanOptions};

/// Generate a fresh plan for the athlete, replacing the current one
pub async fn generate_plan(
  state: &AppState,
  athlete_id: &str,
  options: PlanOptions,
) -> Result<TrainingPlan, CommandError> {
  let planner = state.planner.as_ref().ok_or(LlmError::MissingApiKey)?;
  let athlete = require_athlete(state, athlete_id).await?;

  let plan = plans::generate_and_save(&state.repo, &**planner, &athlete, &options).await?;
  Ok(plan)
}

pub async fn get_plan(state: &AppState, athlete_id: &str) -> Result<Option<TrainingPlan>, CommandError> {
  Ok(state.repo.find_plan(athlete_id).await?)
}

/// Mark a workout done with the athlete's RPE and comment
pub async fn complete_workout(
  state: &AppState,
  athlete_id: &str,
  week_number: u32,
  workout_index: usize,
  feedback: FeedbackInput,
) -> Result<TrainingPlan, CommandError> {
  let plan = plans::complete_workout(&state.repo, athlete_id, week_number, workout_index, feedback).await?;
  Ok(plan)
}

pub async fn plan_adherence(state: &AppState, athlete_id: &str) -> Result<PlanAdherence, CommandError> {
  let plan = state
    .repo
    .find_plan(athlete_id)
    .await?
    .ok_or_else(|| PlanError::PlanNotFound(athlete_id.to_string()))?;
  Ok(PlanAdherence::compute(&plan))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::commands::testing::test_state;
  use crate::llm::{PlanGenerator, PlanRequest};
  use crate::models::{Metrics, PlanWeek};
  use crate::test_utils::{mock_athlete, mock_week};
  use async_trait::async_trait;
  use std::sync::Arc;

  struct CannedGenerator;

  #[async_trait]
  impl PlanGenerator for CannedGenerator {
    async fn generate_plan(&self, request: &PlanRequest) -> Result<Vec<PlanWeek>, LlmError> {
      Ok((1..=request.weeks).map(mock_week).collect())
    }
  }

  fn options() -> PlanOptions {
    PlanOptions {
      goal: Some("Sub-20 5K".to_string()),
      weeks: 2,
      days_per_week: 3,
    }
  }

  async fn seed_scored_athlete(state: &crate::db::AppState) {
    let mut athlete = mock_athlete("a1");
    athlete.metrics = Metrics {
      vdot: Some(52.0),
      ..Metrics::default()
    };
    state.repo.create_athlete(&athlete).await.unwrap();
  }

  #[tokio::test]
  async fn test_generation_requires_planner() {
    let state = test_state(None).await;
    seed_scored_athlete(&state).await;

    let result = generate_plan(&state, "a1", options()).await;
    assert!(matches!(result, Err(CommandError::Llm(LlmError::MissingApiKey))));

    state.shutdown().await;
  }

  #[tokio::test]
  async fn test_generate_complete_and_track() {
    let state = test_state(Some(Arc::new(CannedGenerator))).await;
    seed_scored_athlete(&state).await;

    let plan = generate_plan(&state, "a1", options()).await.unwrap();
    assert_eq!(plan.goal, "Sub-20 5K");
    assert_eq!(get_plan(&state, "a1").await.unwrap(), Some(plan));

    complete_workout(&state, "a1", 1, 0, FeedbackInput { rpe: 3, comment: None })
      .await
      .unwrap();

    let adherence = plan_adherence(&state, "a1").await.unwrap();
    assert_eq!(adherence.planned_workouts, 6);
    assert_eq!(adherence.completed_workouts, 1);
    assert_eq!(adherence.average_rpe, Some(3.0));

    state.shutdown().await;
  }

  #[tokio::test]
  async fn test_missing_athlete_and_plan() {
    let state = test_state(Some(Arc::new(CannedGenerator))).await;

    let result = generate_plan(&state, "ghost", options()).await;
    assert!(matches!(result, Err(CommandError::AthleteNotFound(_))));

    assert_eq!(get_plan(&state, "ghost").await.unwrap(), None);
    let result = plan_adherence(&state, "ghost").await;
    assert!(matches!(result, Err(CommandError::Plan(PlanError::PlanNotFound(_)))));

    state.shutdown().await;
  }
}
