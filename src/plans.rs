//! Training plans
//!
//! Deterministic glue around the plan generator: build the athlete profile
//! the generator reads, store its reply as the athlete's plan, and track
//! workout completion against it. What the plan says is the generator's
//! business; we only check the structure.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::{LlmError, PlanGenerator, PlanRequest};
use crate::models::{Athlete, PlanWeek, TrainingPlan, WorkoutFeedback};
use crate::pace::{zones_from_score, TrainingPace};
use crate::repository::AthleteRepository;
use crate::store::StoreError;

pub const MAX_PLAN_WEEKS: u32 = 52;
pub const MAX_DAYS_PER_WEEK: u8 = 7;
pub const RPE_MIN: u8 = 1;
pub const RPE_MAX: u8 = 10;

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PlanError {
  #[error("Invalid plan request: {0}")]
  InvalidRequest(String),

  #[error("Athlete has no fitness score yet; record an assessment first")]
  MissingScore,

  #[error("No plan for athlete {0}")]
  PlanNotFound(String),

  #[error("Week {week_number} has no workout at position {index}")]
  WorkoutNotFound { week_number: u32, index: usize },

  #[error("Invalid feedback: {0}")]
  InvalidFeedback(String),

  #[error(transparent)]
  Llm(#[from] LlmError),

  #[error(transparent)]
  Store(#[from] StoreError),
}

/// ---------------------------------------------------------------------------
/// Requests
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOptions {
  /// Falls back to the athlete's own goal when absent
  pub goal: Option<String>,
  pub weeks: u32,
  pub days_per_week: u8,
}

impl PlanOptions {
  fn validate(&self) -> Result<(), PlanError> {
    if self.weeks == 0 || self.weeks > MAX_PLAN_WEEKS {
      return Err(PlanError::InvalidRequest(format!(
        "weeks must be between 1 and {}, got {}",
        MAX_PLAN_WEEKS, self.weeks
      )));
    }
    if self.days_per_week == 0 || self.days_per_week > MAX_DAYS_PER_WEEK {
      return Err(PlanError::InvalidRequest(format!(
        "days per week must be between 1 and {}, got {}",
        MAX_DAYS_PER_WEEK, self.days_per_week
      )));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackInput {
  pub rpe: u8,
  pub comment: Option<String>,
}

/// ---------------------------------------------------------------------------
/// Athlete Profile
/// ---------------------------------------------------------------------------

/// Zone table the athlete trains by: saved custom rows first, otherwise
/// derived from the current score. `None` without a score.
pub fn effective_zones(athlete: &Athlete) -> Option<Vec<TrainingPace>> {
  if athlete.has_custom_zones() {
    return athlete.custom_zones.clone();
  }
  athlete
    .metrics
    .vdot
    .map(|vdot| zones_from_score(vdot, athlete.metrics.fc_threshold, athlete.metrics.fc_max))
}

/// Plain-text profile handed to the generator
pub fn athlete_summary(athlete: &Athlete) -> Result<String, PlanError> {
  let vdot = athlete.metrics.vdot.ok_or(PlanError::MissingScore)?;
  let zones = effective_zones(athlete).unwrap_or_default();

  let mut lines = vec![
    format!("Name: {}", athlete.name),
    format!("VDOT: {:.1}", vdot),
  ];
  if let Some(vo2) = athlete.metrics.vo2_max {
    lines.push(format!("Lab VO2max: {:.1}", vo2));
  }
  if let Some(max) = athlete.metrics.fc_max {
    lines.push(format!("Max HR: {} bpm", max));
  }
  if let Some(threshold) = athlete.metrics.fc_threshold {
    lines.push(format!("Threshold HR: {} bpm", threshold));
  }
  if let Some(latest) = athlete.most_recent_assessment() {
    lines.push(format!(
      "Latest assessment: {} on {} ({})",
      latest.kind.as_str(),
      latest.date,
      latest.result_value
    ));
  }
  if let Some(notes) = athlete.notes.as_deref().filter(|n| !n.trim().is_empty()) {
    lines.push(format!("Coach notes: {}", notes));
  }

  lines.push(String::new());
  lines.push("Training zones (pace min/km, slow - fast):".to_string());
  for zone in &zones {
    lines.push(format!(
      "- {} {}: {} - {} | {} km/h | HR {}",
      zone.zone.as_str(),
      zone.name,
      zone.min_pace,
      zone.max_pace,
      zone.speed_kmh,
      zone.heart_rate_range
    ));
  }

  Ok(lines.join("\n"))
}

/// ---------------------------------------------------------------------------
/// Generation
/// ---------------------------------------------------------------------------

/// Ask the generator for a plan and store it as the athlete's current plan
pub async fn generate_and_save(
  repo: &AthleteRepository,
  generator: &dyn PlanGenerator,
  athlete: &Athlete,
  options: &PlanOptions,
) -> Result<TrainingPlan, PlanError> {
  options.validate()?;

  let goal = options
    .goal
    .clone()
    .or_else(|| athlete.goal.clone())
    .filter(|g| !g.trim().is_empty())
    .ok_or_else(|| PlanError::InvalidRequest("a goal is required".to_string()))?;

  let request = PlanRequest {
    athlete_summary: athlete_summary(athlete)?,
    goal: goal.clone(),
    weeks: options.weeks,
    days_per_week: options.days_per_week,
  };

  let weeks = generator.generate_plan(&request).await?;
  check_week_count(&athlete.id, &weeks, options.weeks);

  let plan = TrainingPlan {
    athlete_id: athlete.id.clone(),
    goal,
    days_per_week: options.days_per_week,
    created_at: Utc::now(),
    weeks,
  };
  repo.save_plan(&plan).await?;

  tracing::info!(
    athlete_id = %athlete.id,
    weeks = plan.weeks.len(),
    "training plan saved"
  );

  Ok(plan)
}

/// A plan with a different number of weeks than requested is kept as is
fn check_week_count(athlete_id: &str, weeks: &[PlanWeek], requested: u32) {
  if weeks.len() != requested as usize {
    tracing::warn!(
      athlete_id,
      requested,
      received = weeks.len(),
      "generated plan week count differs from request"
    );
  }
}

/// ---------------------------------------------------------------------------
/// Completion & Feedback
/// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WeeksPatch<'a> {
  weeks: &'a [PlanWeek],
}

/// Mark one workout done and attach the athlete's feedback
pub async fn complete_workout(
  repo: &AthleteRepository,
  athlete_id: &str,
  week_number: u32,
  workout_index: usize,
  feedback: FeedbackInput,
) -> Result<TrainingPlan, PlanError> {
  if !(RPE_MIN..=RPE_MAX).contains(&feedback.rpe) {
    return Err(PlanError::InvalidFeedback(format!(
      "RPE must be between {} and {}, got {}",
      RPE_MIN, RPE_MAX, feedback.rpe
    )));
  }

  let mut plan = repo
    .find_plan(athlete_id)
    .await?
    .ok_or_else(|| PlanError::PlanNotFound(athlete_id.to_string()))?;

  let workout = plan
    .weeks
    .iter_mut()
    .find(|w| w.week_number == week_number)
    .and_then(|w| w.workouts.get_mut(workout_index))
    .ok_or(PlanError::WorkoutNotFound {
      week_number,
      index: workout_index,
    })?;

  workout.completed = true;
  workout.feedback = Some(WorkoutFeedback {
    rpe: feedback.rpe,
    comment: feedback.comment.filter(|c| !c.trim().is_empty()),
    completed_at: Utc::now(),
  });

  repo
    .update_plan(athlete_id, &WeeksPatch { weeks: &plan.weeks })
    .await?;

  tracing::info!(athlete_id, week_number, workout_index, rpe = feedback.rpe, "workout completed");

  Ok(plan)
}

/// ---------------------------------------------------------------------------
/// Adherence
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekAdherence {
  pub week_number: u32,
  pub planned: usize,
  pub completed: usize,
  pub planned_km: f64,
  pub completed_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanAdherence {
  pub planned_workouts: usize,
  pub completed_workouts: usize,
  /// Share of workouts completed, 0.0-1.0
  pub completion_rate: f64,
  pub average_rpe: Option<f64>,
  pub weeks: Vec<WeekAdherence>,
}

impl PlanAdherence {
  pub fn compute(plan: &TrainingPlan) -> Self {
    let weeks: Vec<WeekAdherence> = plan
      .weeks
      .iter()
      .map(|week| {
        let done = week.workouts.iter().filter(|w| w.completed);
        WeekAdherence {
          week_number: week.week_number,
          planned: week.workouts.len(),
          completed: done.clone().count(),
          planned_km: week.workouts.iter().map(|w| w.distance_km).sum(),
          completed_km: done.map(|w| w.distance_km).sum(),
        }
      })
      .collect();

    let planned_workouts: usize = weeks.iter().map(|w| w.planned).sum();
    let completed_workouts: usize = weeks.iter().map(|w| w.completed).sum();
    let completion_rate = if planned_workouts > 0 {
      completed_workouts as f64 / planned_workouts as f64
    } else {
      0.0
    };

    let rpes: Vec<f64> = plan
      .weeks
      .iter()
      .flat_map(|w| w.workouts.iter())
      .filter_map(|w| w.feedback.as_ref().map(|f| f.rpe as f64))
      .collect();
    let average_rpe = if rpes.is_empty() {
      None
    } else {
      Some(rpes.iter().sum::<f64>() / rpes.len() as f64)
    };

    Self {
      planned_workouts,
      completed_workouts,
      completion_rate,
      average_rpe,
      weeks,
    }
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
