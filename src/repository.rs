//! Typed access to athlete and plan documents
//!
//! Every call goes through [`guarded`] with the configured ceiling, so no
//! caller waits on the store indefinitely. After a write lands, subscribers
//! get a snapshot under a deadline of its own; a snapshot that fails or runs
//! late is logged and never turns the committed write into an error.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::models::{Athlete, TrainingPlan};
use crate::store::{
  from_document, guarded, sanitize, DocumentStore, Snapshot, StoreError, Subscription, ATHLETES,
  PLANS,
};

#[derive(Clone)]
pub struct AthleteRepository {
  store: Arc<dyn DocumentStore>,
  timeout: Duration,
}

impl AthleteRepository {
  pub fn new(store: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
    Self { store, timeout }
  }

  pub fn timeout(&self) -> Duration {
    self.timeout
  }

  async fn write<F>(&self, operation: &str, collection: &str, call: F) -> Result<(), StoreError>
  where
    F: Future<Output = Result<(), StoreError>>,
  {
    guarded(self.timeout, operation, call).await?;
    self.publish(collection).await;
    Ok(())
  }

  async fn publish(&self, collection: &str) {
    let result = guarded(self.timeout, "publish snapshot", self.store.publish(collection)).await;
    if let Err(e) = result {
      tracing::warn!(collection, error = %e, "snapshot not published");
    }
  }

  /// ---------------------------------------------------------------------------
  /// Athletes
  /// ---------------------------------------------------------------------------

  pub async fn find_athlete(&self, id: &str) -> Result<Option<Athlete>, StoreError> {
    let document = guarded(self.timeout, "load athlete", self.store.get(ATHLETES, id)).await?;
    document.map(from_document).transpose()
  }

  pub async fn list_athletes(&self) -> Result<Vec<Athlete>, StoreError> {
    let documents = guarded(self.timeout, "list athletes", self.store.list(ATHLETES)).await?;
    documents
      .into_iter()
      .map(|(_, document)| from_document(document))
      .collect()
  }

  pub async fn create_athlete(&self, athlete: &Athlete) -> Result<(), StoreError> {
    let document = sanitize(athlete)?;
    self
      .write(
        "create athlete",
        ATHLETES,
        self.store.create(ATHLETES, &athlete.id, document),
      )
      .await
  }

  /// Merge-style update; `patch` decides which keys are touched
  pub async fn update_athlete<T: Serialize>(&self, id: &str, patch: &T) -> Result<(), StoreError> {
    let document = sanitize(patch)?;
    self
      .write("update athlete", ATHLETES, self.store.update(ATHLETES, id, document))
      .await
  }

  pub async fn delete_athlete(&self, id: &str) -> Result<(), StoreError> {
    self
      .write("delete athlete", ATHLETES, self.store.delete(ATHLETES, id))
      .await
  }

  pub fn subscribe_athletes(&self) -> Subscription {
    self.store.subscribe(ATHLETES)
  }

  /// ---------------------------------------------------------------------------
  /// Plans (one document per athlete, keyed by athlete id)
  /// ---------------------------------------------------------------------------

  pub async fn find_plan(&self, athlete_id: &str) -> Result<Option<TrainingPlan>, StoreError> {
    let document = guarded(self.timeout, "load plan", self.store.get(PLANS, athlete_id)).await?;
    document.map(from_document).transpose()
  }

  /// Store a plan, replacing whatever plan the athlete had
  pub async fn save_plan(&self, plan: &TrainingPlan) -> Result<(), StoreError> {
    let document = sanitize(plan)?;
    let exists = guarded(
      self.timeout,
      "load plan",
      self.store.get(PLANS, &plan.athlete_id),
    )
    .await?
    .is_some();

    if exists {
      self
        .write(
          "update plan",
          PLANS,
          self.store.update(PLANS, &plan.athlete_id, document),
        )
        .await
    } else {
      self
        .write(
          "create plan",
          PLANS,
          self.store.create(PLANS, &plan.athlete_id, document),
        )
        .await
    }
  }

  pub async fn update_plan<T: Serialize>(&self, athlete_id: &str, patch: &T) -> Result<(), StoreError> {
    let document = sanitize(patch)?;
    self
      .write("update plan", PLANS, self.store.update(PLANS, athlete_id, document))
      .await
  }

  pub async fn delete_plan(&self, athlete_id: &str) -> Result<(), StoreError> {
    self
      .write("delete plan", PLANS, self.store.delete(PLANS, athlete_id))
      .await
  }

  pub fn subscribe_plan(&self, athlete_id: &str) -> Subscription {
    self.store.subscribe(PLANS).only(athlete_id)
  }
}

/// Decode an athletes snapshot; documents that fail to decode are skipped
pub fn athletes_from_snapshot(snapshot: &Snapshot) -> Vec<Athlete> {
  snapshot
    .documents
    .iter()
    .filter_map(|(id, document)| match from_document(document.clone()) {
      Ok(athlete) => Some(athlete),
      Err(e) => {
        tracing::warn!(id = %id, error = %e, "skipping undecodable athlete document");
        None
      }
    })
    .collect()
}

/// Decode the plan for `athlete_id` out of a plans snapshot
pub fn plan_from_snapshot(snapshot: &Snapshot, athlete_id: &str) -> Option<TrainingPlan> {
  snapshot
    .document(athlete_id)
    .and_then(|document| from_document(document.clone()).ok())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::{mock_athlete, mock_plan, setup_test_repository, SlowStore};

  #[tokio::test]
  async fn test_athlete_roundtrip() {
    let (repo, store) = setup_test_repository().await;
    let athlete = mock_athlete("a1");

    repo.create_athlete(&athlete).await.expect("create");
    let loaded = repo.find_athlete("a1").await.unwrap().expect("athlete");

    assert_eq!(loaded, athlete);
    assert!(repo.find_athlete("nobody").await.unwrap().is_none());

    store.close().await;
  }

  #[tokio::test]
  async fn test_save_plan_replaces_existing() {
    let (repo, store) = setup_test_repository().await;

    let mut plan = mock_plan("a1", 2);
    repo.save_plan(&plan).await.expect("first save");

    plan.goal = "Marathon".to_string();
    plan.weeks.truncate(1);
    repo.save_plan(&plan).await.expect("second save");

    let loaded = repo.find_plan("a1").await.unwrap().expect("plan");
    assert_eq!(loaded.goal, "Marathon");
    assert_eq!(loaded.weeks.len(), 1);

    store.close().await;
  }

  #[tokio::test]
  async fn test_athlete_subscription_decodes_snapshot() {
    let (repo, store) = setup_test_repository().await;
    let mut subscription = repo.subscribe_athletes();

    repo.create_athlete(&mock_athlete("a1")).await.unwrap();

    let snapshot = subscription.next().await.expect("snapshot");
    let athletes = athletes_from_snapshot(&snapshot);
    assert_eq!(athletes.len(), 1);
    assert_eq!(athletes[0].id, "a1");

    store.close().await;
  }

  #[tokio::test]
  async fn test_plan_subscription_sees_only_its_athlete() {
    let (repo, store) = setup_test_repository().await;
    let mut subscription = repo.subscribe_plan("a2");

    repo.save_plan(&mock_plan("a1", 1)).await.unwrap();
    repo.save_plan(&mock_plan("a2", 3)).await.unwrap();

    // First snapshot comes from the a1 write and has nothing for a2
    let first = subscription.next().await.expect("snapshot");
    assert!(plan_from_snapshot(&first, "a2").is_none());

    let second = subscription.next().await.expect("snapshot");
    let plan = plan_from_snapshot(&second, "a2").expect("a2 plan");
    assert_eq!(plan.weeks.len(), 3);

    store.close().await;
  }

  #[tokio::test]
  async fn test_slow_snapshot_does_not_fail_committed_write() {
    let slow = Arc::new(SlowStore::with_slow_snapshots(Duration::from_secs(5)));
    slow.insert_athlete(&mock_athlete("a1")).await;
    let repo = AthleteRepository::new(slow.clone(), Duration::from_millis(50));
    let _subscription = repo.subscribe_athletes();

    repo
      .update_athlete("a1", &serde_json::json!({"goal": "Marathon"}))
      .await
      .expect("committed write reports success");

    let stored = repo.find_athlete("a1").await.unwrap().unwrap();
    assert_eq!(stored.goal.as_deref(), Some("Marathon"));
  }

  #[tokio::test]
  async fn test_slow_write_still_times_out() {
    let slow = Arc::new(SlowStore::new(Duration::from_secs(5)));
    slow.insert_athlete(&mock_athlete("a1")).await;
    let repo = AthleteRepository::new(slow, Duration::from_millis(50));

    let result = repo
      .update_athlete("a1", &serde_json::json!({"goal": "Marathon"}))
      .await;
    assert!(matches!(result, Err(StoreError::Timeout { .. })));
  }
}
