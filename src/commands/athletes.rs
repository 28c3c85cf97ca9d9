//! Athlete registration, profile edits and zone tables

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::{require_athlete, validate_heart_rate, CommandError};
use crate::db::AppState;
use crate::ledger::refresh_custom_zones;
use crate::models::{Athlete, AthleteProfileUpdate, AthleteStatus, Metrics, NewAthlete};
use crate::pace::{parse_pace, TrainingPace, Zone};
use crate::plans::effective_zones;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CustomZonesPatch {
  custom_zones: Option<Vec<TrainingPace>>,
}

/// Register a new athlete. Heart rates given at sign-up seed the metrics.
pub async fn register_athlete(state: &AppState, input: NewAthlete) -> Result<Athlete, CommandError> {
  let name = input.name.trim();
  if name.is_empty() {
    return Err(CommandError::InvalidInput("Name is required".to_string()));
  }
  validate_heart_rate("Max HR", input.fc_max)?;
  validate_heart_rate("Threshold HR", input.fc_threshold)?;

  let athlete = Athlete {
    id: Uuid::new_v4().to_string(),
    name: name.to_string(),
    email: input.email,
    birth_date: input.birth_date,
    goal: input.goal,
    status: AthleteStatus::Active,
    created_at: Utc::now(),
    metrics: Metrics {
      vdot: None,
      fc_max: input.fc_max,
      fc_threshold: input.fc_threshold,
      vo2_max: None,
    },
    assessment_history: Vec::new(),
    custom_zones: None,
    notes: input.notes,
  };

  state.repo.create_athlete(&athlete).await?;
  tracing::info!(athlete_id = %athlete.id, "athlete registered");

  Ok(athlete)
}

pub async fn list_athletes(state: &AppState) -> Result<Vec<Athlete>, CommandError> {
  let mut athletes = state.repo.list_athletes().await?;
  athletes.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
  Ok(athletes)
}

pub async fn get_athlete(state: &AppState, athlete_id: &str) -> Result<Athlete, CommandError> {
  require_athlete(state, athlete_id).await
}

/// Edit profile fields; anything left `None` keeps its stored value
pub async fn update_profile(
  state: &AppState,
  athlete_id: &str,
  update: AthleteProfileUpdate,
) -> Result<Athlete, CommandError> {
  if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
    return Err(CommandError::InvalidInput("Name cannot be empty".to_string()));
  }
  require_athlete(state, athlete_id).await?;

  state.repo.update_athlete(athlete_id, &update).await?;
  require_athlete(state, athlete_id).await
}

/// Remove an athlete together with their plan
pub async fn delete_athlete(state: &AppState, athlete_id: &str) -> Result<(), CommandError> {
  state.repo.delete_plan(athlete_id).await?;
  state.repo.delete_athlete(athlete_id).await?;
  tracing::info!(athlete_id, "athlete deleted");
  Ok(())
}

/// The table the athlete trains by; `None` until a score exists
pub async fn athlete_zones(
  state: &AppState,
  athlete_id: &str,
) -> Result<Option<Vec<TrainingPace>>, CommandError> {
  let athlete = require_athlete(state, athlete_id).await?;
  Ok(effective_zones(&athlete))
}

/// Save coach-edited zone paces. Heart-rate text is always derived from the
/// athlete's metrics, whatever the caller sent.
pub async fn set_custom_zones(
  state: &AppState,
  athlete_id: &str,
  zones: Vec<TrainingPace>,
) -> Result<Vec<TrainingPace>, CommandError> {
  validate_zone_table(&zones)?;
  let athlete = require_athlete(state, athlete_id).await?;

  let custom_zones = refresh_custom_zones(Some(&zones), &athlete.metrics);
  let patch = CustomZonesPatch { custom_zones };
  state.repo.update_athlete(athlete_id, &patch).await?;

  tracing::info!(athlete_id, "custom zones saved");
  Ok(patch.custom_zones.unwrap_or_default())
}

/// Drop custom zones so the table is derived from metrics again
pub async fn clear_custom_zones(state: &AppState, athlete_id: &str) -> Result<(), CommandError> {
  require_athlete(state, athlete_id).await?;
  state
    .repo
    .update_athlete(athlete_id, &CustomZonesPatch { custom_zones: None })
    .await?;
  Ok(())
}

fn validate_zone_table(zones: &[TrainingPace]) -> Result<(), CommandError> {
  let listed: Vec<Zone> = zones.iter().map(|z| z.zone).collect();
  if listed != Zone::ALL {
    return Err(CommandError::InvalidInput(
      "Custom zones must list Z1 to Z5 in order".to_string(),
    ));
  }

  for row in zones {
    let slow = parse_pace(&row.min_pace);
    let fast = parse_pace(&row.max_pace);
    match (slow, fast) {
      (Some(slow), Some(fast)) if slow >= fast => {}
      (Some(_), Some(_)) => {
        return Err(CommandError::InvalidInput(format!(
          "{}: min pace {} must be slower than max pace {}",
          row.zone.as_str(),
          row.min_pace,
          row.max_pace
        )))
      }
      _ => {
        return Err(CommandError::InvalidInput(format!(
          "{}: paces must be written as M:SS",
          row.zone.as_str()
        )))
      }
    }
  }
  Ok(())
}
