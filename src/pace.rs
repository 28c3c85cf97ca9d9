//! Deterministic pace and zone calculations
//!
//! Maps a test performance to a VDOT-style fitness score and maps that score
//! to the five-zone pace/heart-rate table coaches prescribe from.
//! Everything here is pure: no I/O, no clocks.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::AssessmentType;

/// ---------------------------------------------------------------------------
/// Constants
/// ---------------------------------------------------------------------------

/// Oxygen cost polynomial: VO2 = C + B*v + A*v^2 (v in m/min)
const VO2_A: f64 = 0.000_104;
const VO2_B: f64 = 0.182_258;
const VO2_C: f64 = -4.6;

/// Default course length for the fixed-distance time trial
pub const DEFAULT_TRIAL_DISTANCE_KM: f64 = 3.0;

/// Heart-rate text when no anchor applies (and always for Z5)
pub const NO_HEART_RATE: &str = "N/A";

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum PaceError {
  #[error("Invalid input: {0}")]
  InvalidInput(String),
}

/// ---------------------------------------------------------------------------
/// Zones
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
  Z1, // Easy / recovery
  Z2, // Marathon pace
  Z3, // Threshold
  Z4, // Interval
  Z5, // Speed
}

impl Zone {
  pub const ALL: [Zone; 5] = [Zone::Z1, Zone::Z2, Zone::Z3, Zone::Z4, Zone::Z5];

  pub fn as_str(&self) -> &'static str {
    match self {
      Zone::Z1 => "Z1",
      Zone::Z2 => "Z2",
      Zone::Z3 => "Z3",
      Zone::Z4 => "Z4",
      Zone::Z5 => "Z5",
    }
  }

  fn band(&self) -> &'static ZoneBand {
    match self {
      Zone::Z1 => &ZONE_BANDS[0],
      Zone::Z2 => &ZONE_BANDS[1],
      Zone::Z3 => &ZONE_BANDS[2],
      Zone::Z4 => &ZONE_BANDS[3],
      Zone::Z5 => &ZONE_BANDS[4],
    }
  }
}

/// Fixed definition of one zone: fractions of the fitness score, and for
/// Z1-Z4 fractions of threshold and maximum heart rate.
struct ZoneBand {
  zone: Zone,
  name: &'static str,
  description: &'static str,
  intensity: (f64, f64),
  threshold_hr: Option<(f64, f64)>,
  max_hr: Option<(f64, f64)>,
}

const ZONE_BANDS: [ZoneBand; 5] = [
  ZoneBand {
    zone: Zone::Z1,
    name: "Easy / Recovery",
    description: "Conversational aerobic running, warm-ups and recovery days",
    intensity: (0.59, 0.74),
    threshold_hr: Some((0.65, 0.80)),
    max_hr: Some((0.60, 0.74)),
  },
  ZoneBand {
    zone: Zone::Z2,
    name: "Marathon",
    description: "Steady race-specific endurance at marathon effort",
    intensity: (0.75, 0.84),
    threshold_hr: Some((0.80, 0.89)),
    max_hr: Some((0.75, 0.84)),
  },
  ZoneBand {
    zone: Zone::Z3,
    name: "Threshold",
    description: "Comfortably hard tempo efforts around lactate threshold",
    intensity: (0.83, 0.88),
    threshold_hr: Some((0.90, 0.96)),
    max_hr: Some((0.85, 0.90)),
  },
  ZoneBand {
    zone: Zone::Z4,
    name: "Interval",
    description: "Hard repeats of 3-5 minutes at VO2max effort",
    intensity: (0.95, 1.00),
    threshold_hr: Some((0.97, 1.02)),
    max_hr: Some((0.91, 0.97)),
  },
  ZoneBand {
    zone: Zone::Z5,
    name: "Speed",
    description: "Short fast repetitions for economy and leg speed",
    intensity: (1.05, 1.10),
    threshold_hr: None,
    max_hr: None,
  },
];

/// One row of the zone table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingPace {
  pub zone: Zone,
  pub name: String,
  pub description: String,
  /// Slower bound (from the zone's minimum intensity), M:SS per km
  pub min_pace: String,
  /// Faster bound (from the zone's maximum intensity), M:SS per km
  pub max_pace: String,
  pub speed_kmh: String,
  pub heart_rate_range: String,
}

/// ---------------------------------------------------------------------------
/// Fitness Score
/// ---------------------------------------------------------------------------

/// Parse `MM:SS` (or `M:SS`) into total minutes
pub fn parse_time_minutes(time: &str) -> Result<f64, PaceError> {
  let (minutes, seconds) = time
    .trim()
    .split_once(':')
    .ok_or_else(|| PaceError::InvalidInput(format!("Time '{}' is not in MM:SS format", time)))?;

  let minutes: u32 = minutes
    .trim()
    .parse()
    .map_err(|_| PaceError::InvalidInput(format!("Minutes in '{}' are not a number", time)))?;
  let seconds: u32 = seconds
    .trim()
    .parse()
    .map_err(|_| PaceError::InvalidInput(format!("Seconds in '{}' are not a number", time)))?;

  if seconds >= 60 {
    return Err(PaceError::InvalidInput(format!(
      "Seconds in '{}' must be below 60",
      time
    )));
  }

  let total = minutes as f64 + seconds as f64 / 60.0;
  if total <= 0.0 {
    return Err(PaceError::InvalidInput("Time must be positive".to_string()));
  }

  Ok(total)
}

/// Fitness score from a timed run over `distance_km` (3 km when omitted)
pub fn score_from_time_trial(time: &str, distance_km: Option<f64>) -> Result<f64, PaceError> {
  let distance_km = distance_km.unwrap_or(DEFAULT_TRIAL_DISTANCE_KM);
  if !distance_km.is_finite() || distance_km <= 0.0 {
    return Err(PaceError::InvalidInput(format!(
      "Distance must be positive, got {}",
      distance_km
    )));
  }

  let total_minutes = parse_time_minutes(time)?;
  let velocity = distance_km * 1000.0 / total_minutes;
  if !velocity.is_finite() {
    return Err(PaceError::InvalidInput(format!(
      "{} km in {} is not a plausible run",
      distance_km, time
    )));
  }

  let vo2 = VO2_C + VO2_B * velocity + VO2_A * velocity * velocity;
  let percent_max = 0.8
    + 0.189_439_3 * (-0.012_778 * total_minutes).exp()
    + 0.298_955_8 * (-0.193_260_5 * total_minutes).exp();

  let score = round1(vo2 / percent_max);
  if !score.is_finite() {
    return Err(PaceError::InvalidInput(format!(
      "{} km in {} does not give a usable score",
      distance_km, time
    )));
  }

  Ok(score)
}

/// A lab-measured VO2max is used as the score directly
pub fn score_from_lab_reading(vo2_max: f64) -> f64 {
  vo2_max
}

/// Score for an assessment form, dispatching on the test type
pub fn score_for_assessment(
  kind: AssessmentType,
  result_value: &str,
  distance_km: Option<f64>,
) -> Result<f64, PaceError> {
  match kind {
    AssessmentType::FixedDistance => score_from_time_trial(result_value, None),
    AssessmentType::FieldTest => {
      let distance = distance_km.ok_or_else(|| {
        PaceError::InvalidInput("Field test requires a distance".to_string())
      })?;
      score_from_time_trial(result_value, Some(distance))
    }
    AssessmentType::LabVo2Max => {
      let reading: f64 = result_value.trim().parse().map_err(|_| {
        PaceError::InvalidInput(format!("VO2max '{}' is not a number", result_value))
      })?;
      if !reading.is_finite() || reading <= 0.0 {
        return Err(PaceError::InvalidInput(format!(
          "VO2max must be positive, got {}",
          reading
        )));
      }
      Ok(score_from_lab_reading(reading))
    }
  }
}

/// ---------------------------------------------------------------------------
/// Zone Table
/// ---------------------------------------------------------------------------

/// Build the five-row zone table for a fitness score
pub fn zones_from_score(
  score: f64,
  fc_threshold: Option<i64>,
  fc_max: Option<i64>,
) -> Vec<TrainingPace> {
  ZONE_BANDS
    .iter()
    .map(|band| {
      let (low, high) = band.intensity;
      // Lower intensity means slower running, so it yields the larger pace value
      let slow_pace = pace_for_vo2(score * low);
      let fast_pace = pace_for_vo2(score * high);

      TrainingPace {
        zone: band.zone,
        name: band.name.to_string(),
        description: band.description.to_string(),
        min_pace: format_pace(slow_pace),
        max_pace: format_pace(fast_pace),
        speed_kmh: format!("{:.1} - {:.1}", 60.0 / slow_pace, 60.0 / fast_pace),
        heart_rate_range: heart_rate_range(band.zone, fc_threshold, fc_max),
      }
    })
    .collect()
}

/// Heart-rate text for a zone. Threshold-relative bands win over max-relative.
pub fn heart_rate_range(zone: Zone, fc_threshold: Option<i64>, fc_max: Option<i64>) -> String {
  let band = zone.band();
  let anchored = match (fc_threshold, fc_max) {
    (Some(threshold), _) => band.threshold_hr.map(|fractions| (threshold, fractions)),
    (None, Some(max)) => band.max_hr.map(|fractions| (max, fractions)),
    (None, None) => None,
  };

  match anchored {
    Some((anchor, (low, high))) => {
      let anchor = anchor as f64;
      format!(
        "{}-{} bpm",
        (anchor * low).round() as i64,
        (anchor * high).round() as i64
      )
    }
    None => NO_HEART_RATE.to_string(),
  }
}

/// Invert the oxygen cost polynomial (positive root) and convert to min/km
fn pace_for_vo2(target_vo2: f64) -> f64 {
  let c = -(target_vo2 - VO2_C);
  let discriminant = VO2_B * VO2_B - 4.0 * VO2_A * c;
  let velocity = (-VO2_B + discriminant.sqrt()) / (2.0 * VO2_A);
  1000.0 / velocity
}

/// ---------------------------------------------------------------------------
/// Formatting
/// ---------------------------------------------------------------------------

/// Format minutes-per-km as `M:SS`
pub fn format_pace(min_per_km: f64) -> String {
  let mut minutes = min_per_km.floor() as i64;
  let mut seconds = ((min_per_km - minutes as f64) * 60.0).round() as i64;
  if seconds == 60 {
    minutes += 1;
    seconds = 0;
  }
  format!("{}:{:02}", minutes, seconds)
}

/// Parse `M:SS` pace text back into minutes-per-km
pub fn parse_pace(pace: &str) -> Option<f64> {
  parse_time_minutes(pace).ok()
}

fn round1(value: f64) -> f64 {
  (value * 10.0).round() / 10.0
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
