use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Kind of fitness test behind an assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentType {
  /// Time trial over the standard 3 km course
  FixedDistance,
  /// Time trial over whatever distance the field allowed
  FieldTest,
  /// VO2max measured directly in a lab
  LabVo2Max,
}

impl AssessmentType {
  pub fn as_str(&self) -> &'static str {
    match self {
      AssessmentType::FixedDistance => "fixed_distance",
      AssessmentType::FieldTest => "field_test",
      AssessmentType::LabVo2Max => "lab_vo2_max",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
  pub id: String,
  pub date: NaiveDate,
  #[serde(rename = "type")]
  pub kind: AssessmentType,
  /// Raw result as entered ("12:30" for trials, "55.2" for lab readings)
  pub result_value: String,
  pub calculated_vdot: f64,
  pub vo2_max: Option<f64>,
  pub fc_max: Option<i64>,
  pub fc_threshold: Option<i64>,
  pub distance_km: Option<f64>,
}

/// Assessment form input, before the score is computed and an id assigned
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssessment {
  pub date: NaiveDate,
  #[serde(rename = "type")]
  pub kind: AssessmentType,
  pub result_value: String,
  pub fc_max: Option<i64>,
  pub fc_threshold: Option<i64>,
  pub distance_km: Option<f64>,
}
