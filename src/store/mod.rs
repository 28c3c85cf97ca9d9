//! Document store boundary
//!
//! Persistence is an injected capability: anything implementing
//! [`DocumentStore`] can back the application. Documents are JSON objects
//! addressed by `(collection, id)`; `update` merges top-level fields.
//! Whole-collection snapshots reach subscribers through a [`SubscriptionHub`]
//! when [`DocumentStore::publish`] is called, which is a separate step from
//! the write itself.

pub mod sqlite;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::broadcast;

pub use sqlite::SqliteDocumentStore;

pub type Document = Map<String, Value>;

pub const ATHLETES: &str = "athletes";
pub const PLANS: &str = "plans";

/// Snapshot buffer per hub; slow subscribers skip to the latest snapshot
const SNAPSHOT_CHANNEL_CAPACITY: usize = 32;

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("{operation} timed out after {after:?}")]
  Timeout { operation: String, after: Duration },

  #[error("Store error: {0}")]
  Backend(String),

  #[error("Serialization error: {0}")]
  Serialization(String),

  #[error("{collection}/{id} not found")]
  NotFound { collection: String, id: String },

  #[error("{collection}/{id} already exists")]
  AlreadyExists { collection: String, id: String },
}

impl From<sqlx::Error> for StoreError {
  fn from(err: sqlx::Error) -> Self {
    StoreError::Backend(err.to_string())
  }
}

impl From<serde_json::Error> for StoreError {
  fn from(err: serde_json::Error) -> Self {
    StoreError::Serialization(err.to_string())
  }
}

/// ---------------------------------------------------------------------------
/// Store Trait
/// ---------------------------------------------------------------------------

#[async_trait]
pub trait DocumentStore: Send + Sync {
  async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

  /// All documents in a collection as `(id, document)` pairs, ordered by id
  async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError>;

  async fn create(&self, collection: &str, id: &str, document: Document) -> Result<(), StoreError>;

  /// Merge `partial` into the stored document: keys present overwrite
  /// (explicit `null` included), keys absent are left alone.
  async fn update(&self, collection: &str, id: &str, partial: Document) -> Result<(), StoreError>;

  async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

  /// Send the collection's current contents to its subscribers. A no-op
  /// when nobody is listening.
  async fn publish(&self, collection: &str) -> Result<(), StoreError>;

  fn subscribe(&self, collection: &str) -> Subscription;
}

/// Run a store call under a deadline. No retries: expiry is reported as
/// [`StoreError::Timeout`] and the caller decides what to do.
pub async fn guarded<T, F>(limit: Duration, operation: &str, call: F) -> Result<T, StoreError>
where
  F: Future<Output = Result<T, StoreError>>,
{
  match tokio::time::timeout(limit, call).await {
    Ok(result) => result,
    Err(_) => {
      tracing::warn!(operation, ?limit, "store call timed out");
      Err(StoreError::Timeout {
        operation: operation.to_string(),
        after: limit,
      })
    }
  }
}

/// ---------------------------------------------------------------------------
/// Write Sanitization
/// ---------------------------------------------------------------------------

/// Turn a write payload into a storable document.
///
/// Every `None` field ends up as an explicit `null` so the merge clears it
/// instead of silently keeping the stale value, and non-finite floats are
/// normalized to `null`. Payload types that want "leave untouched" semantics
/// must skip the key entirely (`skip_serializing_if`).
pub fn sanitize<T: Serialize>(payload: &T) -> Result<Document, StoreError> {
  match serde_json::to_value(payload)? {
    Value::Object(map) => Ok(map),
    other => Err(StoreError::Serialization(format!(
      "Expected an object payload, got {}",
      json_kind(&other)
    ))),
  }
}

/// Decode a stored document into its typed form
pub fn from_document<T: DeserializeOwned>(document: Document) -> Result<T, StoreError> {
  Ok(serde_json::from_value(Value::Object(document))?)
}

fn json_kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}

/// ---------------------------------------------------------------------------
/// Subscriptions
/// ---------------------------------------------------------------------------

/// Full contents of one collection after a write
#[derive(Debug, Clone)]
pub struct Snapshot {
  pub collection: String,
  pub documents: Vec<(String, Document)>,
}

impl Snapshot {
  pub fn document(&self, id: &str) -> Option<&Document> {
    self
      .documents
      .iter()
      .find(|(doc_id, _)| doc_id == id)
      .map(|(_, doc)| doc)
  }
}

/// Fan-out point for snapshots; owned by a store, handed out as subscriptions
#[derive(Debug, Clone)]
pub struct SubscriptionHub {
  sender: broadcast::Sender<Snapshot>,
}

impl Default for SubscriptionHub {
  fn default() -> Self {
    let (sender, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
    Self { sender }
  }
}

impl SubscriptionHub {
  pub fn has_subscribers(&self) -> bool {
    self.sender.receiver_count() > 0
  }

  pub fn publish(&self, snapshot: Snapshot) {
    // Sending only fails when nobody is listening
    let _ = self.sender.send(snapshot);
  }

  pub fn subscribe(&self, collection: &str) -> Subscription {
    Subscription {
      collection: collection.to_string(),
      document_id: None,
      receiver: self.sender.subscribe(),
    }
  }
}

/// Live view of a collection (or of one document in it)
#[derive(Debug)]
pub struct Subscription {
  collection: String,
  document_id: Option<String>,
  receiver: broadcast::Receiver<Snapshot>,
}

impl Subscription {
  /// Narrow the subscription to a single document
  pub fn only(mut self, id: &str) -> Self {
    self.document_id = Some(id.to_string());
    self
  }

  /// Wait for the next snapshot of this collection. `None` once the store
  /// is gone.
  pub async fn next(&mut self) -> Option<Snapshot> {
    loop {
      match self.receiver.recv().await {
        Ok(snapshot) if snapshot.collection == self.collection => {
          return Some(self.narrow(snapshot));
        }
        Ok(_) => continue,
        Err(broadcast::error::RecvError::Lagged(skipped)) => {
          tracing::debug!(skipped, collection = %self.collection, "subscriber lagged");
          continue;
        }
        Err(broadcast::error::RecvError::Closed) => return None,
      }
    }
  }

  pub fn close(self) {
    drop(self);
  }

  fn narrow(&self, mut snapshot: Snapshot) -> Snapshot {
    if let Some(id) = &self.document_id {
      snapshot.documents.retain(|(doc_id, _)| doc_id == id);
    }
    snapshot
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::Metrics;
  use serde_json::json;

  #[test]
  fn test_sanitize_writes_explicit_nulls() {
    let metrics = Metrics {
      vdot: Some(48.2),
      fc_max: None,
      fc_threshold: Some(168),
      vo2_max: None,
    };
    let doc = sanitize(&metrics).unwrap();

    assert_eq!(doc.get("fcMax"), Some(&Value::Null));
    assert_eq!(doc.get("vo2Max"), Some(&Value::Null));
    assert_eq!(doc.get("fcThreshold"), Some(&json!(168)));
  }

  #[test]
  fn test_sanitize_nulls_non_finite_numbers() {
    let metrics = Metrics {
      vdot: Some(f64::NAN),
      ..Metrics::default()
    };
    let doc = sanitize(&metrics).unwrap();
    assert_eq!(doc.get("vdot"), Some(&Value::Null));
  }

  #[test]
  fn test_sanitize_rejects_non_object() {
    let result = sanitize(&vec![1, 2, 3]);
    assert!(matches!(result, Err(StoreError::Serialization(_))));
  }

  #[tokio::test]
  async fn test_guarded_times_out() {
    let result: Result<(), StoreError> = guarded(Duration::from_millis(20), "slow call", async {
      tokio::time::sleep(Duration::from_secs(5)).await;
      Ok(())
    })
    .await;

    match result {
      Err(StoreError::Timeout { operation, .. }) => assert_eq!(operation, "slow call"),
      other => panic!("expected timeout, got {:?}", other),
    }
  }

  #[tokio::test]
  async fn test_subscription_filters_collection_and_document() {
    let hub = SubscriptionHub::default();
    let mut plans = hub.subscribe(PLANS).only("a1");

    hub.publish(Snapshot {
      collection: ATHLETES.to_string(),
      documents: vec![],
    });
    hub.publish(Snapshot {
      collection: PLANS.to_string(),
      documents: vec![
        ("a1".to_string(), Document::new()),
        ("a2".to_string(), Document::new()),
      ],
    });

    let snapshot = plans.next().await.expect("snapshot");
    assert_eq!(snapshot.collection, PLANS);
    assert_eq!(snapshot.documents.len(), 1);
    assert!(snapshot.document("a1").is_some());
  }
}
