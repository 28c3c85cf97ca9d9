//! Test utilities and helpers for unit testing
//!
//! This module provides common test infrastructure including:
//! - Database and store setup/teardown
//! - Mock data factories
//! - A deliberately slow in-memory store for timeout tests
//! - Helper assertions

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::models::{
  Assessment, AssessmentType, Athlete, AthleteStatus, Metrics, PlanWeek, PlanWorkout, TrainingPlan,
};
use crate::repository::AthleteRepository;
use crate::store::{
  sanitize, Document, DocumentStore, Snapshot, SqliteDocumentStore, StoreError, Subscription,
  SubscriptionHub, ATHLETES,
};

/// ---------------------------------------------------------------------------
/// Database Test Utilities
/// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations and returns a ready-to-use pool
///
/// Uses max_connections(1) to prevent multiple pool connections from creating
/// isolated in-memory databases, which would cause intermittent test failures
pub async fn setup_test_db() -> SqlitePool {
  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .expect("Failed to create in-memory database");

  sqlx::migrate!("./migrations")
    .run(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

pub async fn setup_test_store() -> Arc<SqliteDocumentStore> {
  Arc::new(SqliteDocumentStore::new(setup_test_db().await))
}

pub async fn teardown_test_store(store: Arc<SqliteDocumentStore>) {
  store.close().await;
}

/// Repository over a fresh in-memory store. The store is returned too so
/// tests can close it.
pub async fn setup_test_repository() -> (AthleteRepository, Arc<SqliteDocumentStore>) {
  let store = setup_test_store().await;
  let repo = AthleteRepository::new(store.clone(), Duration::from_secs(5));
  (repo, store)
}

/// ---------------------------------------------------------------------------
/// Mock Data Factories
/// ---------------------------------------------------------------------------

pub fn mock_athlete(id: &str) -> Athlete {
  Athlete {
    id: id.to_string(),
    name: format!("Athlete {}", id),
    email: Some(format!("{}@example.com", id)),
    birth_date: NaiveDate::from_ymd_opt(1990, 5, 17),
    goal: Some("Sub-45 10K".to_string()),
    status: AthleteStatus::Active,
    created_at: Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap(),
    metrics: Metrics::default(),
    assessment_history: Vec::new(),
    custom_zones: None,
    notes: None,
  }
}

/// Fixed-distance assessment with a preset score
pub fn mock_assessment(
  id: &str,
  vdot: f64,
  fc_max: Option<i64>,
  fc_threshold: Option<i64>,
) -> Assessment {
  Assessment {
    id: id.to_string(),
    date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
    kind: AssessmentType::FixedDistance,
    result_value: "12:30".to_string(),
    calculated_vdot: vdot,
    vo2_max: None,
    fc_max,
    fc_threshold,
    distance_km: None,
  }
}

pub fn mock_week(week_number: u32) -> PlanWeek {
  PlanWeek {
    week_number,
    phase: if week_number <= 2 { "base" } else { "build" }.to_string(),
    total_volume_km: 30.0 + week_number as f64,
    workouts: vec![
      PlanWorkout {
        day: "Tuesday".to_string(),
        workout_type: "easy".to_string(),
        description: "45 min Z1".to_string(),
        distance_km: 8.0,
        completed: false,
        feedback: None,
      },
      PlanWorkout {
        day: "Thursday".to_string(),
        workout_type: "threshold".to_string(),
        description: "3x10 min Z3".to_string(),
        distance_km: 10.0,
        completed: false,
        feedback: None,
      },
      PlanWorkout {
        day: "Sunday".to_string(),
        workout_type: "long".to_string(),
        description: "90 min Z1-Z2".to_string(),
        distance_km: 16.0,
        completed: false,
        feedback: None,
      },
    ],
  }
}

pub fn mock_plan(athlete_id: &str, weeks: u32) -> TrainingPlan {
  TrainingPlan {
    athlete_id: athlete_id.to_string(),
    goal: "Sub-45 10K".to_string(),
    days_per_week: 3,
    created_at: Utc.with_ymd_and_hms(2025, 3, 2, 8, 0, 0).unwrap(),
    weeks: (1..=weeks).map(mock_week).collect(),
  }
}

/// ---------------------------------------------------------------------------
/// Slow Store
/// ---------------------------------------------------------------------------

/// In-memory store with stalling writes or snapshots; reads answer at once
pub struct SlowStore {
  documents: Mutex<HashMap<(String, String), Document>>,
  write_delay: Duration,
  publish_delay: Duration,
  hub: SubscriptionHub,
}

impl SlowStore {
  /// Writes stall for `delay`
  pub fn new(delay: Duration) -> Self {
    Self {
      documents: Mutex::new(HashMap::new()),
      write_delay: delay,
      publish_delay: Duration::ZERO,
      hub: SubscriptionHub::default(),
    }
  }

  /// Writes land at once but publishing a snapshot stalls for `delay`
  pub fn with_slow_snapshots(delay: Duration) -> Self {
    Self {
      write_delay: Duration::ZERO,
      publish_delay: delay,
      ..Self::new(Duration::ZERO)
    }
  }

  pub async fn insert_athlete(&self, athlete: &Athlete) {
    let document = sanitize(athlete).expect("athlete serializes");
    self
      .documents
      .lock()
      .await
      .insert((ATHLETES.to_string(), athlete.id.clone()), document);
  }
}

#[async_trait]
impl DocumentStore for SlowStore {
  async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
    let documents = self.documents.lock().await;
    Ok(documents.get(&(collection.to_string(), id.to_string())).cloned())
  }

  async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
    let documents = self.documents.lock().await;
    let mut listed: Vec<_> = documents
      .iter()
      .filter(|((c, _), _)| c == collection)
      .map(|((_, id), doc)| (id.clone(), doc.clone()))
      .collect();
    listed.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(listed)
  }

  async fn create(&self, collection: &str, id: &str, document: Document) -> Result<(), StoreError> {
    tokio::time::sleep(self.write_delay).await;
    self
      .documents
      .lock()
      .await
      .insert((collection.to_string(), id.to_string()), document);
    Ok(())
  }

  async fn update(&self, collection: &str, id: &str, partial: Document) -> Result<(), StoreError> {
    tokio::time::sleep(self.write_delay).await;
    let mut documents = self.documents.lock().await;
    let stored = documents
      .get_mut(&(collection.to_string(), id.to_string()))
      .ok_or_else(|| StoreError::NotFound {
        collection: collection.to_string(),
        id: id.to_string(),
      })?;
    stored.extend(partial);
    Ok(())
  }

  async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
    tokio::time::sleep(self.write_delay).await;
    self
      .documents
      .lock()
      .await
      .remove(&(collection.to_string(), id.to_string()));
    Ok(())
  }

  async fn publish(&self, collection: &str) -> Result<(), StoreError> {
    tokio::time::sleep(self.publish_delay).await;
    let documents = self.list(collection).await?;
    self.hub.publish(Snapshot {
      collection: collection.to_string(),
      documents,
    });
    Ok(())
  }

  fn subscribe(&self, collection: &str) -> Subscription {
    self.hub.subscribe(collection)
  }
}

/// ---------------------------------------------------------------------------
/// Test Macros
/// ---------------------------------------------------------------------------

/// Assert two floats are approximately equal within a tolerance
#[macro_export]
macro_rules! assert_approx_eq {
  ($left:expr, $right:expr, $tolerance:expr) => {
    let diff = ($left - $right).abs();
    assert!(
      diff < $tolerance,
      "Values not approximately equal: {} vs {} (diff: {}, tolerance: {})",
      $left,
      $right,
      diff,
      $tolerance
    );
  };
}

/// ---------------------------------------------------------------------------
/// Tests for Test Utilities
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_setup_db_creates_schema() {
    let pool = setup_test_db().await;

    let result: (i64,) =
      sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='documents'")
        .fetch_one(&pool)
        .await
        .expect("Failed to query schema");

    assert_eq!(result.0, 1, "documents table should exist");
    pool.close().await;
  }

  #[test]
  fn test_mock_plan_numbers_weeks_from_one() {
    let plan = mock_plan("a1", 3);
    let numbers: Vec<u32> = plan.weeks.iter().map(|w| w.week_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
  }

  #[tokio::test]
  async fn test_slow_store_reads_are_fast() {
    let store = SlowStore::new(Duration::from_secs(5));
    store.insert_athlete(&mock_athlete("a1")).await;

    let found = tokio::time::timeout(Duration::from_millis(200), store.get(ATHLETES, "a1"))
      .await
      .expect("read should not stall")
      .unwrap();
    assert!(found.is_some());
  }
}
