//! Application-facing operations over [`AppState`]
//!
//! Each command validates its input, delegates to the ledger, the plan
//! module or the repository, and maps failures onto [`CommandError`].

pub mod assessments;
pub mod athletes;
pub mod plans;

use serde::Serialize;
use thiserror::Error;

use crate::db::AppState;
use crate::llm::LlmError;
use crate::models::Athlete;
use crate::pace::PaceError;
use crate::plans::PlanError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum CommandError {
  #[error("Athlete {0} not found")]
  AthleteNotFound(String),

  #[error("Invalid input: {0}")]
  InvalidInput(String),

  #[error(transparent)]
  Pace(#[from] PaceError),

  #[error(transparent)]
  Store(#[from] StoreError),

  #[error(transparent)]
  Plan(#[from] PlanError),

  #[error(transparent)]
  Llm(#[from] LlmError),
}

/// Callers see errors as plain messages
impl Serialize for CommandError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

/// Load an athlete or fail with [`CommandError::AthleteNotFound`]
pub(crate) async fn require_athlete(state: &AppState, athlete_id: &str) -> Result<Athlete, CommandError> {
  state
    .repo
    .find_athlete(athlete_id)
    .await?
    .ok_or_else(|| CommandError::AthleteNotFound(athlete_id.to_string()))
}

/// Heart rates must be plausible whole bpm values
pub(crate) fn validate_heart_rate(label: &str, value: Option<i64>) -> Result<(), CommandError> {
  match value {
    Some(bpm) if !(30..=250).contains(&bpm) => Err(CommandError::InvalidInput(format!(
      "{} must be between 30 and 250 bpm, got {}",
      label, bpm
    ))),
    _ => Ok(()),
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_error_serializes_as_message() {
    let err = CommandError::AthleteNotFound("a1".to_string());
    assert_eq!(serde_json::to_string(&err).unwrap(), r#""Athlete a1 not found""#);

    let err = CommandError::from(PaceError::InvalidInput("bad time".to_string()));
    assert!(serde_json::to_string(&err).unwrap().contains("bad time"));
  }

  #[test]
  fn test_heart_rate_bounds() {
    assert!(validate_heart_rate("Max HR", None).is_ok());
    assert!(validate_heart_rate("Max HR", Some(185)).is_ok());
    assert!(matches!(
      validate_heart_rate("Max HR", Some(0)),
      Err(CommandError::InvalidInput(_))
    ));
  }
}
