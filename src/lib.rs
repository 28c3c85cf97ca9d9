//! Running coach toolkit: athletes, fitness assessments, VDOT training
//! zones and generated training plans over a document store.

pub mod commands;
pub mod config;
pub mod db;
pub mod ledger;
pub mod llm;
pub mod models;
pub mod pace;
pub mod plans;
pub mod repository;
pub mod store;
pub mod telemetry;

#[cfg(test)]
pub mod test_utils;

pub use config::AppConfig;
pub use db::{AppState, InitError};

/// Install logging, read configuration from the environment and open the
/// store. The returned state is what every command runs against.
pub async fn start() -> Result<AppState, InitError> {
  telemetry::init();

  let config = AppConfig::from_env()?;
  let state = AppState::initialize(config).await?;

  tracing::info!(
    planner = state.planner.is_some(),
    timeout = ?state.config.store_timeout,
    "coach-log ready"
  );

  Ok(state)
}
