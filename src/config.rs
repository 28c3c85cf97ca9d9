use std::env;
use std::time::Duration;

use thiserror::Error;
use url::Url;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://coach-log.db?mode=rwc";
pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LLM_API_URL: &str = "https://api.anthropic.com/";
pub const DEFAULT_LLM_MODEL: &str = "claude-sonnet-4-20250514";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
  #[error("Missing configuration: {0}")]
  Missing(String),

  #[error("Invalid value for {name}: {reason}")]
  Invalid { name: String, reason: String },
}

/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
  pub database_url: String,
  /// Ceiling for every document store round trip
  pub store_timeout: Duration,
  /// Plan generation is unavailable without a key
  pub llm_api_key: Option<String>,
  pub llm_api_url: Url,
  pub llm_model: String,
}

impl AppConfig {
  /// Read configuration, loading a `.env` file first when one exists
  pub fn from_env() -> Result<Self, ConfigError> {
    dotenvy::dotenv().ok();

    let store_timeout_secs = match env::var("STORE_TIMEOUT_SECS") {
      Ok(raw) => raw.trim().parse::<u64>().ok().filter(|s| *s > 0).ok_or_else(|| {
        ConfigError::Invalid {
          name: "STORE_TIMEOUT_SECS".into(),
          reason: format!("expected a positive number of seconds, got '{}'", raw),
        }
      })?,
      Err(_) => DEFAULT_STORE_TIMEOUT_SECS,
    };

    let raw_url = env::var("LLM_API_URL").unwrap_or_else(|_| DEFAULT_LLM_API_URL.to_string());
    let llm_api_url = Url::parse(&raw_url).map_err(|e| ConfigError::Invalid {
      name: "LLM_API_URL".into(),
      reason: e.to_string(),
    })?;

    Ok(Self {
      database_url: env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
      store_timeout: Duration::from_secs(store_timeout_secs),
      llm_api_key: env::var("ANTHROPIC_API_KEY").ok().filter(|k| !k.trim().is_empty()),
      llm_api_url,
      llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string()),
    })
  }

  /// The API key, or an error naming the variable to set
  pub fn require_llm_api_key(&self) -> Result<&str, ConfigError> {
    self
      .llm_api_key
      .as_deref()
      .ok_or_else(|| ConfigError::Missing("ANTHROPIC_API_KEY".into()))
  }
}
