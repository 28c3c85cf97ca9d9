//! Assessment Ledger
//!
//! Owns the consistency between an athlete's assessment history and the
//! derived state that hangs off its newest entry:
//! - `assessment_history` is newest-first; position 0 drives everything
//! - `metrics` is recomputed whenever position 0 changes (insert, edit of
//!   position 0, delete of position 0) and never otherwise
//! - `custom_zones` keep their coach-edited paces, only heart-rate text is
//!   refreshed from the recomputed metrics
//!
//! Each operation is one read of the athlete followed by one merge update
//! of `{assessmentHistory, metrics, customZones}`. Unknown athletes are a
//! no-op; store failures propagate untouched.

use serde::Serialize;

use crate::models::{Assessment, Athlete, Metrics};
use crate::pace::{heart_rate_range, TrainingPace};
use crate::repository::AthleteRepository;
use crate::store::StoreError;

/// ---------------------------------------------------------------------------
/// Outcomes
/// ---------------------------------------------------------------------------

/// Merge payload written for every ledger change
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerUpdate {
    pub assessment_history: Vec<Assessment>,
    pub metrics: Metrics,
    pub custom_zones: Option<Vec<TrainingPace>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerOutcome {
    /// Update written; `recomputed` tells whether metrics were rederived
    Persisted {
        update: LedgerUpdate,
        recomputed: bool,
    },
    /// Nothing to change (unknown assessment id, empty history)
    Unchanged,
    /// Athlete does not exist; nothing was written
    AthleteNotFound,
}

/// ---------------------------------------------------------------------------
/// Recomputation
/// ---------------------------------------------------------------------------

/// Fold the newest assessment into the current metrics.
///
/// Keep-if-absent, per field:
/// - `vdot`: the assessment's `calculated_vdot`; kept when there is no
///   assessment or the score is not a finite number
/// - `fc_max`, `fc_threshold`, `vo2_max`: taken when the assessment has
///   them, kept otherwise
///
/// A recorded value of zero is still a value and replaces the old one.
pub fn merge_metrics(current: &Metrics, newest: Option<&Assessment>) -> Metrics {
    let Some(newest) = newest else {
        return current.clone();
    };

    Metrics {
        vdot: Some(newest.calculated_vdot)
            .filter(|v| v.is_finite())
            .or(current.vdot),
        fc_max: newest.fc_max.or(current.fc_max),
        fc_threshold: newest.fc_threshold.or(current.fc_threshold),
        vo2_max: newest.vo2_max.or(current.vo2_max),
    }
}

/// Rewrite heart-rate text on custom zone rows; paces are left exactly as
/// the coach saved them. No custom table means nothing to do.
pub fn refresh_custom_zones(
    custom_zones: Option<&[TrainingPace]>,
    metrics: &Metrics,
) -> Option<Vec<TrainingPace>> {
    custom_zones.map(|zones| {
        zones
            .iter()
            .map(|row| TrainingPace {
                heart_rate_range: heart_rate_range(row.zone, metrics.fc_threshold, metrics.fc_max),
                ..row.clone()
            })
            .collect()
    })
}

/// Shared by record, amend and retract: derive metrics from the newest
/// history entry and bring custom zone heart rates in line with them.
pub fn recompute_metrics_and_zones(
    history: &[Assessment],
    current: &Metrics,
    custom_zones: Option<&[TrainingPace]>,
) -> (Metrics, Option<Vec<TrainingPace>>) {
    let metrics = merge_metrics(current, history.first());
    let zones = refresh_custom_zones(custom_zones, &metrics);
    (metrics, zones)
}

/// ---------------------------------------------------------------------------
/// State Transitions (pure)
/// ---------------------------------------------------------------------------

fn unchanged_update(athlete: &Athlete, history: Vec<Assessment>) -> LedgerUpdate {
    LedgerUpdate {
        assessment_history: history,
        metrics: athlete.metrics.clone(),
        custom_zones: athlete.custom_zones.clone(),
    }
}

fn recomputed_update(athlete: &Athlete, history: Vec<Assessment>) -> LedgerUpdate {
    let (metrics, custom_zones) =
        recompute_metrics_and_zones(&history, &athlete.metrics, athlete.custom_zones.as_deref());
    LedgerUpdate {
        assessment_history: history,
        metrics,
        custom_zones,
    }
}

/// New assessment always becomes position 0, whatever its date
pub fn apply_record(athlete: &Athlete, assessment: Assessment) -> LedgerUpdate {
    let mut history = Vec::with_capacity(athlete.assessment_history.len() + 1);
    history.push(assessment);
    history.extend(athlete.assessment_history.iter().cloned());
    recomputed_update(athlete, history)
}

/// Replace by id in place. Returns `None` when the id is not in the history.
pub fn apply_amend(athlete: &Athlete, assessment: Assessment) -> Option<(LedgerUpdate, bool)> {
    let position = athlete
        .assessment_history
        .iter()
        .position(|a| a.id == assessment.id)?;

    let mut history = athlete.assessment_history.clone();
    history[position] = assessment;

    if position == 0 {
        Some((recomputed_update(athlete, history), true))
    } else {
        Some((unchanged_update(athlete, history), false))
    }
}

/// Remove by id. Returns `None` when there is nothing to remove.
pub fn apply_retract(athlete: &Athlete, assessment_id: &str) -> Option<(LedgerUpdate, bool)> {
    let was_most_recent = athlete
        .most_recent_assessment()
        .is_some_and(|a| a.id == assessment_id);

    let position = athlete
        .assessment_history
        .iter()
        .position(|a| a.id == assessment_id)?;

    let mut history = athlete.assessment_history.clone();
    history.remove(position);

    if was_most_recent {
        // An emptied history leaves every metric, vdot included, where it was
        Some((recomputed_update(athlete, history), true))
    } else {
        Some((unchanged_update(athlete, history), false))
    }
}

/// ---------------------------------------------------------------------------
/// Ledger
/// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AssessmentLedger {
    repo: AthleteRepository,
}

impl AssessmentLedger {
    pub fn new(repo: AthleteRepository) -> Self {
        Self { repo }
    }

    /// Insert a new assessment as the athlete's most recent one
    pub async fn record(
        &self,
        athlete_id: &str,
        assessment: Assessment,
    ) -> Result<LedgerOutcome, StoreError> {
        let Some(athlete) = self.load(athlete_id, "record").await? else {
            return Ok(LedgerOutcome::AthleteNotFound);
        };

        let assessment_id = assessment.id.clone();
        let update = apply_record(&athlete, assessment);
        self.persist(athlete_id, &update).await?;

        tracing::info!(
            athlete_id,
            assessment_id = %assessment_id,
            vdot = ?update.metrics.vdot,
            history_len = update.assessment_history.len(),
            "assessment recorded"
        );

        Ok(LedgerOutcome::Persisted {
            update,
            recomputed: true,
        })
    }

    /// Replace an existing assessment (matched by id) in place
    pub async fn amend(
        &self,
        athlete_id: &str,
        assessment: Assessment,
    ) -> Result<LedgerOutcome, StoreError> {
        let Some(athlete) = self.load(athlete_id, "amend").await? else {
            return Ok(LedgerOutcome::AthleteNotFound);
        };

        let assessment_id = assessment.id.clone();
        let Some((update, recomputed)) = apply_amend(&athlete, assessment) else {
            tracing::warn!(athlete_id, assessment_id = %assessment_id, "amend: assessment not in history");
            return Ok(LedgerOutcome::Unchanged);
        };

        self.persist(athlete_id, &update).await?;

        tracing::info!(
            athlete_id,
            assessment_id = %assessment_id,
            recomputed,
            "assessment amended"
        );

        Ok(LedgerOutcome::Persisted { update, recomputed })
    }

    /// Delete an assessment; metrics follow the new most recent entry
    pub async fn retract(
        &self,
        athlete_id: &str,
        assessment_id: &str,
    ) -> Result<LedgerOutcome, StoreError> {
        let Some(athlete) = self.load(athlete_id, "retract").await? else {
            return Ok(LedgerOutcome::AthleteNotFound);
        };

        let Some((update, was_most_recent)) = apply_retract(&athlete, assessment_id) else {
            tracing::debug!(athlete_id, assessment_id, "retract: nothing to remove");
            return Ok(LedgerOutcome::Unchanged);
        };

        self.persist(athlete_id, &update).await?;

        tracing::info!(
            athlete_id,
            assessment_id,
            was_most_recent,
            remaining = update.assessment_history.len(),
            "assessment retracted"
        );

        Ok(LedgerOutcome::Persisted {
            update,
            recomputed: was_most_recent,
        })
    }

    async fn load(&self, athlete_id: &str, operation: &str) -> Result<Option<Athlete>, StoreError> {
        let athlete = self.repo.find_athlete(athlete_id).await?;
        if athlete.is_none() {
            tracing::warn!(athlete_id, operation, "athlete not found, skipping");
        }
        Ok(athlete)
    }

    async fn persist(&self, athlete_id: &str, update: &LedgerUpdate) -> Result<(), StoreError> {
        self.repo.update_athlete(athlete_id, update).await
    }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
