//! Assessment submission, correction and removal

use uuid::Uuid;

use super::{validate_heart_rate, CommandError};
use crate::db::AppState;
use crate::ledger::LedgerOutcome;
use crate::models::{Assessment, AssessmentType, NewAssessment};
use crate::pace::score_for_assessment;

/// Score the form and build the stored assessment under `id`
fn build_assessment(id: String, input: NewAssessment) -> Result<Assessment, CommandError> {
  validate_heart_rate("Max HR", input.fc_max)?;
  validate_heart_rate("Threshold HR", input.fc_threshold)?;

  let score = score_for_assessment(input.kind, &input.result_value, input.distance_km)?;

  let (vo2_max, distance_km) = match input.kind {
    AssessmentType::LabVo2Max => (Some(score), None),
    AssessmentType::FieldTest => (None, input.distance_km),
    AssessmentType::FixedDistance => (None, None),
  };

  Ok(Assessment {
    id,
    date: input.date,
    kind: input.kind,
    result_value: input.result_value.trim().to_string(),
    calculated_vdot: score,
    vo2_max,
    fc_max: input.fc_max,
    fc_threshold: input.fc_threshold,
    distance_km,
  })
}

/// Record a new assessment as the athlete's most recent one
pub async fn submit_assessment(
  state: &AppState,
  athlete_id: &str,
  input: NewAssessment,
) -> Result<Assessment, CommandError> {
  let assessment = build_assessment(Uuid::new_v4().to_string(), input)?;

  match state.ledger.record(athlete_id, assessment.clone()).await? {
    LedgerOutcome::AthleteNotFound => Err(CommandError::AthleteNotFound(athlete_id.to_string())),
    _ => Ok(assessment),
  }
}

/// Correct an existing assessment. `None` when the id is not in the
/// athlete's history; nothing is written then.
pub async fn edit_assessment(
  state: &AppState,
  athlete_id: &str,
  assessment_id: &str,
  input: NewAssessment,
) -> Result<Option<Assessment>, CommandError> {
  let assessment = build_assessment(assessment_id.to_string(), input)?;

  match state.ledger.amend(athlete_id, assessment.clone()).await? {
    LedgerOutcome::AthleteNotFound => Err(CommandError::AthleteNotFound(athlete_id.to_string())),
    LedgerOutcome::Unchanged => Ok(None),
    LedgerOutcome::Persisted { .. } => Ok(Some(assessment)),
  }
}

/// Remove an assessment. Returns whether anything was removed.
pub async fn delete_assessment(
  state: &AppState,
  athlete_id: &str,
  assessment_id: &str,
) -> Result<bool, CommandError> {
  match state.ledger.retract(athlete_id, assessment_id).await? {
    LedgerOutcome::AthleteNotFound => Err(CommandError::AthleteNotFound(athlete_id.to_string())),
    LedgerOutcome::Unchanged => Ok(false),
    LedgerOutcome::Persisted { .. } => Ok(true),
  }
}
