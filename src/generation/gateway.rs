//! Chat-completion client for the recipe model, with bounded linear backoff.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::extract::extract_text;
use crate::config::AiConfig;

pub const SYSTEM_PROMPT: &str = "You are a professional chef and recipe creator. Generate a complete, \
detailed recipe based on the user's request. Return ONLY a valid JSON object with exactly the \
following keys: title (string), description (string), cuisine (string), prep_time (number), \
cook_time (number), servings (number), difficulty (string), ingredients (array of strings), \
instructions (array of strings). Do NOT include any extra commentary or markdown.";

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_STEP: Duration = Duration::from_millis(500);
const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 1500;

/// `Create a recipe for: {prompt}`, plus a cuisine hint when one is given.
pub fn user_message(prompt: &str, cuisine: Option<&str>) -> String {
    match cuisine.map(str::trim).filter(|c| !c.is_empty()) {
        Some(c) => format!("Create a recipe for: {prompt} ({c} cuisine style)"),
        None => format!("Create a recipe for: {prompt}"),
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("AI API key not configured")]
    MissingApiKey,
    #[error("AI API failed after retries")]
    Exhausted { attempts: u32 },
}

/// Why a single attempt produced no text.
#[derive(Debug, Error)]
enum AttemptError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("http {status}: {body}")]
    Status { status: u16, body: String },
    #[error("response body is not JSON: {0}")]
    Decode(String),
    #[error("response carried no text content")]
    EmptyContent,
}

/// Text-generation backend the orchestrator talks to.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, GatewayError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct ChatGateway {
    http: Client,
    url: String,
    api_key: Option<String>,
    model: String,
    max_attempts: u32,
    backoff_step: Duration,
}

impl ChatGateway {
    pub fn new(cfg: &AiConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(concat!("recipebox/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            url: cfg.api_url.clone(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            max_attempts: MAX_ATTEMPTS,
            backoff_step: BACKOFF_STEP,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_timeout(mut self, timeout: Duration) -> anyhow::Result<Self> {
        self.http = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    async fn attempt(&self, api_key: &str, request: &ChatRequest<'_>) -> Result<String, AttemptError> {
        let res = self
            .http
            .post(&self.url)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AttemptError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = res.bytes().await?;
        let body: Value =
            serde_json::from_slice(&bytes).map_err(|e| AttemptError::Decode(e.to_string()))?;
        extract_text(&body)
            .map(str::to_owned)
            .ok_or(AttemptError::EmptyContent)
    }
}

#[async_trait]
impl ModelGateway for ChatGateway {
    async fn complete(&self, system: &str, user: &str) -> Result<String, GatewayError> {
        let api_key = self.api_key.as_deref().ok_or(GatewayError::MissingApiKey)?;
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        for attempt in 1..=self.max_attempts {
            match self.attempt(api_key, &request).await {
                Ok(text) => {
                    info!(attempt, chars = text.len(), "model gateway returned text");
                    return Ok(text);
                }
                Err(e) => warn!(attempt, error = %e, "model gateway attempt failed"),
            }
            if attempt < self.max_attempts {
                let delay = self.backoff_step * attempt;
                debug!(?delay, "backing off before next attempt");
                tokio::time::sleep(delay).await;
            }
        }
        Err(GatewayError::Exhausted {
            attempts: self.max_attempts,
        })
    }
}
