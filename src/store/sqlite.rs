use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use super::{Document, DocumentStore, Snapshot, StoreError, Subscription, SubscriptionHub};

/// Document store over a single SQLite table (see migrations/)
#[derive(Debug, Clone)]
pub struct SqliteDocumentStore {
  pool: SqlitePool,
  hub: SubscriptionHub,
}

impl SqliteDocumentStore {
  pub fn new(pool: SqlitePool) -> Self {
    Self {
      pool,
      hub: SubscriptionHub::default(),
    }
  }

  pub fn pool(&self) -> &SqlitePool {
    &self.pool
  }

  /// Close the pool; open subscriptions end once the store is dropped
  pub async fn close(&self) {
    self.pool.close().await;
  }
}

fn parse_body(body: &str) -> Result<Document, StoreError> {
  Ok(serde_json::from_str(body)?)
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
  async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
    let row: Option<(String,)> =
      sqlx::query_as("SELECT body FROM documents WHERE collection = ?1 AND id = ?2")
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

    row.map(|(body,)| parse_body(&body)).transpose()
  }

  async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
    let rows: Vec<(String, String)> =
      sqlx::query_as("SELECT id, body FROM documents WHERE collection = ?1 ORDER BY id")
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

    rows
      .into_iter()
      .map(|(id, body)| Ok((id, parse_body(&body)?)))
      .collect()
  }

  async fn create(&self, collection: &str, id: &str, document: Document) -> Result<(), StoreError> {
    let body = serde_json::to_string(&document)?;
    let now = Utc::now();

    let result = sqlx::query(
      r#"
      INSERT INTO documents (collection, id, body, created_at, updated_at)
      VALUES (?1, ?2, ?3, ?4, ?4)
      "#,
    )
    .bind(collection)
    .bind(id)
    .bind(&body)
    .bind(now)
    .execute(&self.pool)
    .await;

    match result {
      Ok(_) => {}
      Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
        return Err(StoreError::AlreadyExists {
          collection: collection.to_string(),
          id: id.to_string(),
        });
      }
      Err(e) => return Err(e.into()),
    }

    Ok(())
  }

  async fn update(&self, collection: &str, id: &str, partial: Document) -> Result<(), StoreError> {
    let mut tx = self.pool.begin().await?;

    let row: Option<(String,)> =
      sqlx::query_as("SELECT body FROM documents WHERE collection = ?1 AND id = ?2")
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

    let mut document = match row {
      Some((body,)) => parse_body(&body)?,
      None => {
        return Err(StoreError::NotFound {
          collection: collection.to_string(),
          id: id.to_string(),
        })
      }
    };

    // Top-level merge: present keys win, absent keys keep their stored value
    for (key, value) in partial {
      document.insert(key, value);
    }

    sqlx::query("UPDATE documents SET body = ?1, updated_at = ?2 WHERE collection = ?3 AND id = ?4")
      .bind(serde_json::to_string(&document)?)
      .bind(Utc::now())
      .bind(collection)
      .bind(id)
      .execute(&mut *tx)
      .await?;

    tx.commit().await?;
    Ok(())
  }

  async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM documents WHERE collection = ?1 AND id = ?2")
      .bind(collection)
      .bind(id)
      .execute(&self.pool)
      .await?;

    if result.rows_affected() == 0 {
      tracing::debug!(collection, id, "delete of missing document");
    }
    Ok(())
  }

  async fn publish(&self, collection: &str) -> Result<(), StoreError> {
    if !self.hub.has_subscribers() {
      return Ok(());
    }
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
/// Tests
/// ---------------------------------------------------------------------------
