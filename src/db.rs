use std::sync::Arc;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use thiserror::Error;

use crate::config::{AppConfig, ConfigError};
use crate::ledger::AssessmentLedger;
use crate::llm::{ClaudeClient, LlmError, PlanGenerator};
use crate::repository::AthleteRepository;
use crate::store::SqliteDocumentStore;

pub type DbPool = SqlitePool;

#[derive(Debug, Error)]
pub enum InitError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error("Database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("Migration failed: {0}")]
  Migration(#[from] sqlx::migrate::MigrateError),

  #[error("Plan generator setup failed: {0}")]
  Llm(LlmError),
}

/// Application state shared by every command
pub struct AppState {
  pub config: AppConfig,
  pub store: Arc<SqliteDocumentStore>,
  pub repo: AthleteRepository,
  pub ledger: AssessmentLedger,
  /// Absent when no API key is configured
  pub planner: Option<Arc<dyn PlanGenerator>>,
}

impl AppState {
  pub fn new(
    config: AppConfig,
    store: Arc<SqliteDocumentStore>,
    planner: Option<Arc<dyn PlanGenerator>>,
  ) -> Self {
    let repo = AthleteRepository::new(store.clone(), config.store_timeout);
    let ledger = AssessmentLedger::new(repo.clone());
    Self {
      config,
      store,
      repo,
      ledger,
      planner,
    }
  }

  /// Open the database, run migrations and wire up the plan generator
  pub async fn initialize(config: AppConfig) -> Result<Self, InitError> {
    let pool = initialize_db(&config).await?;

    let planner: Option<Arc<dyn PlanGenerator>> = match ClaudeClient::from_config(&config) {
      Ok(client) => Some(Arc::new(client)),
      Err(LlmError::MissingApiKey) => {
        tracing::warn!("ANTHROPIC_API_KEY not set, plan generation disabled");
        None
      }
      Err(e) => return Err(InitError::Llm(e)),
    };

    let store = Arc::new(SqliteDocumentStore::new(pool));
    Ok(Self::new(config, store, planner))
  }

  pub async fn shutdown(&self) {
    self.store.close().await;
  }
}

/// Initialize the database connection pool and run migrations
pub async fn initialize_db(config: &AppConfig) -> Result<DbPool, InitError> {
  tracing::info!(url = %config.database_url, "initializing database");

  // Every connection to an in-memory database would see its own copy
  let max_connections = if config.database_url.contains(":memory:") { 1 } else { 5 };

  let pool = SqlitePoolOptions::new()
    .max_connections(max_connections)
    .connect(&config.database_url)
    .await?;

  sqlx::migrate!("./migrations").run(&pool).await?;

  tracing::info!("database ready");

  Ok(pool)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;
  use url::Url;

  fn config(api_key: Option<&str>) -> AppConfig {
    AppConfig {
      database_url: "sqlite::memory:".to_string(),
      store_timeout: Duration::from_secs(5),
      llm_api_key: api_key.map(str::to_string),
      llm_api_url: Url::parse("http://127.0.0.1:9/").unwrap(),
      llm_model: "test-model".to_string(),
    }
  }

  #[tokio::test]
  async fn test_initialize_without_key_disables_planner() {
    let state = AppState::initialize(config(None)).await.expect("state");
    assert!(state.planner.is_none());
    assert!(state.repo.list_athletes().await.unwrap().is_empty());
    state.shutdown().await;
  }

  #[tokio::test]
  async fn test_initialize_with_key_enables_planner() {
    let state = AppState::initialize(config(Some("sk-test"))).await.expect("state");
    assert!(state.planner.is_some());
    assert_eq!(state.repo.timeout(), Duration::from_secs(5));
    state.shutdown().await;
  }
}
