use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Athlete's reaction to a completed session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutFeedback {
  /// Rate of perceived exertion, 1-10
  pub rpe: u8,
  pub comment: Option<String>,
  pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanWorkout {
  pub day: String,
  #[serde(rename = "type")]
  pub workout_type: String,
  pub description: String,
  #[serde(default)]
  pub distance_km: f64,
  #[serde(default)]
  pub completed: bool,
  #[serde(default)]
  pub feedback: Option<WorkoutFeedback>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanWeek {
  pub week_number: u32,
  /// Periodization tag as written by the generator (base, build, peak, taper...)
  pub phase: String,
  #[serde(default)]
  pub total_volume_km: f64,
  pub workouts: Vec<PlanWorkout>,
}

/// The athlete's current plan, stored under the athlete's id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingPlan {
  pub athlete_id: String,
  pub goal: String,
  pub days_per_week: u8,
  pub created_at: DateTime<Utc>,
  pub weeks: Vec<PlanWeek>,
}
