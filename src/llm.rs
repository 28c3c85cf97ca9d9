//! LLM integration for training plan generation
//!
//! This module handles communication with the Claude API. The plan content
//! is opaque to us: we only check that the reply has the expected shape.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::AppConfig;
use crate::models::PlanWeek;

/// ---------------------------------------------------------------------------
/// Configuration
/// ---------------------------------------------------------------------------

const MESSAGES_PATH: &str = "v1/messages";
const API_VERSION: &str = "2023-06-01";
const PLAN_MAX_TOKENS: u32 = 8000;
/// Plans for long blocks take a while to write
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Error, Debug, Serialize)]
pub enum LlmError {
  #[error("API key not configured")]
  MissingApiKey,

  #[error("Request failed: {0}")]
  Request(String),

  #[error("API error: {0}")]
  Api(String),

  #[error("Parse error: {0}")]
  Parse(String),
}

/// ---------------------------------------------------------------------------
/// Claude API Types
/// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ClaudeRequest {
  model: String,
  max_tokens: u32,
  system: String,
  messages: Vec<ClaudeMessage>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
  role: String,
  content: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
  content: Vec<ContentBlock>,
  usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
  #[serde(rename = "type")]
  content_type: String,
  text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
  pub input_tokens: u32,
  pub output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ClaudeErrorResponse {
  error: ClaudeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ClaudeErrorDetail {
  message: String,
}

/// ---------------------------------------------------------------------------
/// Plan Generation Types
/// ---------------------------------------------------------------------------

/// What the generator needs to write a plan
#[derive(Debug, Clone, Serialize)]
pub struct PlanRequest {
  /// Human-readable athlete profile (score, heart rate, zones)
  pub athlete_summary: String,
  pub goal: String,
  pub weeks: u32,
  pub days_per_week: u8,
}

#[derive(Debug, Deserialize)]
struct GeneratedPlan {
  weeks: Vec<PlanWeek>,
}

/// Anything that can turn a plan request into weeks of workouts
#[async_trait]
pub trait PlanGenerator: Send + Sync {
  async fn generate_plan(&self, request: &PlanRequest) -> Result<Vec<PlanWeek>, LlmError>;
}

/// ---------------------------------------------------------------------------
/// Claude Client
/// ---------------------------------------------------------------------------

pub struct ClaudeClient {
  client: Client,
  api_key: String,
  endpoint: Url,
  model: String,
}

impl ClaudeClient {
  /// Create a client from application config; fails without an API key
  pub fn from_config(config: &AppConfig) -> Result<Self, LlmError> {
    let api_key = config
      .require_llm_api_key()
      .map_err(|_| LlmError::MissingApiKey)?;
    Self::new(&config.llm_api_url, api_key.to_string(), config.llm_model.clone())
  }

  pub fn new(base_url: &Url, api_key: String, model: String) -> Result<Self, LlmError> {
    let endpoint = base_url
      .join(MESSAGES_PATH)
      .map_err(|e| LlmError::Request(format!("Invalid API URL: {}", e)))?;
    let client = Client::builder()
      .timeout(REQUEST_TIMEOUT)
      .build()
      .map_err(|e| LlmError::Request(e.to_string()))?;

    Ok(Self {
      client,
      api_key,
      endpoint,
      model,
    })
  }

  /// Call Claude with a system prompt and user message
  pub async fn complete(
    &self,
    system_prompt: &str,
    user_message: &str,
    max_tokens: u32,
  ) -> Result<(String, Usage), LlmError> {
    let request = ClaudeRequest {
      model: self.model.clone(),
      max_tokens,
      system: system_prompt.to_string(),
      messages: vec![ClaudeMessage {
        role: "user".to_string(),
        content: user_message.to_string(),
      }],
    };

    let response = self
      .client
      .post(self.endpoint.clone())
      .header("x-api-key", &self.api_key)
      .header("anthropic-version", API_VERSION)
      .header("content-type", "application/json")
      .json(&request)
      .send()
      .await
      .map_err(|e| LlmError::Request(e.to_string()))?;

    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|e| LlmError::Request(e.to_string()))?;

    if !status.is_success() {
      if let Ok(error_resp) = serde_json::from_str::<ClaudeErrorResponse>(&body) {
        return Err(LlmError::Api(error_resp.error.message));
      }
      return Err(LlmError::Api(format!("HTTP {}: {}", status, body)));
    }

    let claude_response: ClaudeResponse =
      serde_json::from_str(&body).map_err(|e| LlmError::Parse(e.to_string()))?;

    let text = claude_response
      .content
      .iter()
      .find(|c| c.content_type == "text")
      .and_then(|c| c.text.clone())
      .ok_or_else(|| LlmError::Parse("No text content in response".to_string()))?;

    Ok((text, claude_response.usage))
  }
}

#[async_trait]
impl PlanGenerator for ClaudeClient {
  async fn generate_plan(&self, request: &PlanRequest) -> Result<Vec<PlanWeek>, LlmError> {
    let system_prompt = include_str!("prompts/plan_system.txt");

    let user_message = format!(
      r#"Write a training plan.

ATHLETE PROFILE:
{}

GOAL: {}
WEEKS: {}
TRAINING DAYS PER WEEK: {}

Respond with valid JSON matching the OUTPUT FORMAT specified in your instructions."#,
      request.athlete_summary, request.goal, request.weeks, request.days_per_week
    );

    let (response_text, usage) = self
      .complete(system_prompt, &user_message, PLAN_MAX_TOKENS)
      .await?;

    tracing::info!(
      input_tokens = usage.input_tokens,
      output_tokens = usage.output_tokens,
      weeks = request.weeks,
      "plan generated"
    );

    parse_plan(&response_text)
  }
}

/// Pull the weeks out of the model's reply and check the structure
pub fn parse_plan(response_text: &str) -> Result<Vec<PlanWeek>, LlmError> {
  let json_str = extract_json(response_text)?;

  let plan: GeneratedPlan =
    serde_json::from_str(&json_str).map_err(|e| LlmError::Parse(format!("{}: {}", e, json_str)))?;

  if plan.weeks.is_empty() {
    return Err(LlmError::Parse("Plan has no weeks".to_string()));
  }
  if let Some(week) = plan.weeks.iter().find(|w| w.workouts.is_empty()) {
    return Err(LlmError::Parse(format!(
      "Week {} has no workouts",
      week.week_number
    )));
  }

  Ok(plan.weeks)
}

/// Extract JSON from Claude's response (handles markdown code blocks)
fn extract_json(text: &str) -> Result<String, LlmError> {
  if text.trim().starts_with('{') {
    return Ok(text.trim().to_string());
  }

  if let Some(start) = text.find("```json") {
    let start = start + 7;
    if let Some(end) = text[start..].find("```") {
      return Ok(text[start..start + end].trim().to_string());
    }
  }

  if let Some(start) = text.find("```") {
    let start = start + 3;
    // Skip language identifier if present
    let content_start = text[start..]
      .find('\n')
      .map(|i| start + i + 1)
      .unwrap_or(start);
    if let Some(end) = text[content_start..].find("```") {
      return Ok(text[content_start..content_start + end].trim().to_string());
    }
  }

  // Last resort: first { to last }
  if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
    if start < end {
      return Ok(text[start..=end].to_string());
    }
  }

  Err(LlmError::Parse("Could not extract JSON from response".to_string()))
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
