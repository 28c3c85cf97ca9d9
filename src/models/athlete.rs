use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::assessment::Assessment;
use crate::pace::TrainingPace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AthleteStatus {
  #[default]
  Active,
  Inactive,
}

/// Current fitness snapshot, always derived from the newest assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
  pub vdot: Option<f64>,
  pub fc_max: Option<i64>,
  pub fc_threshold: Option<i64>,
  pub vo2_max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Athlete {
  pub id: String,
  pub name: String,
  pub email: Option<String>,
  pub birth_date: Option<NaiveDate>,
  pub goal: Option<String>,
  #[serde(default)]
  pub status: AthleteStatus,
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub metrics: Metrics,
  /// Newest first
  #[serde(default)]
  pub assessment_history: Vec<Assessment>,
  pub custom_zones: Option<Vec<TrainingPace>>,
  pub notes: Option<String>,
}

impl Athlete {
  pub fn most_recent_assessment(&self) -> Option<&Assessment> {
    self.assessment_history.first()
  }

  /// Custom zones count only when the coach actually saved some rows
  pub fn has_custom_zones(&self) -> bool {
    self.custom_zones.as_ref().is_some_and(|zones| !zones.is_empty())
  }
}

/// For registering a new athlete (without id, created_at, history)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAthlete {
  pub name: String,
  pub email: Option<String>,
  pub birth_date: Option<NaiveDate>,
  pub goal: Option<String>,
  pub fc_max: Option<i64>,
  pub fc_threshold: Option<i64>,
  pub notes: Option<String>,
}

/// Profile fields a coach can edit; `None` leaves the stored value alone
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AthleteProfileUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub birth_date: Option<NaiveDate>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub goal: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<AthleteStatus>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
}
