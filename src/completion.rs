//! Completion client
//!
//! One non-streaming POST to an OpenAI-compatible `chat/completions` endpoint
//! (OpenRouter by default). The fixed system prompt is prepended to the history
//! on every call.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{is_usable_api_key, Config};
use crate::conversation::{ChatTurn, Role};

/// Instruction sent ahead of the history. Its markup matches what
/// [`crate::format::format`] understands.
pub const SYSTEM_PROMPT: &str = "You are a helpful medical assistant. Recommend drugs based on user symptoms, but always remind users to consult a healthcare professional before taking any medication.

Format your responses using:
1. Headings starting with ### for main sections (e.g., \"### **Recommended Medication**\", \"### **Dosage Instructions**\", \"### **Warnings**\")
2. **bold text** for important information like drug names, dosages, and warnings
3. Clear paragraphs and bullet points for better readability

Always include these sections:
### **Recommended Medication**
[Details about the medication]

### **Dosage Instructions**
[Specific dosage information]

### **Warnings**
[Important warnings and precautions]

### **Additional Information**
[Any other relevant information]";

const INVALID_RESPONSE: &str = "Invalid response format from API";

#[derive(Debug, Error)]
pub enum CompletionError {
    /// No usable API key
    #[error("API key is missing. Please contact the administrator.")]
    Configuration,
    /// The request never produced a response
    #[error("Could not reach the completion service: {0}")]
    Transport(#[from] reqwest::Error),
    /// Non-success status or a body without a reply
    #[error("{0}")]
    Protocol(String),
}

/// Request settings, usually taken from [`Config`]
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
    pub app_url: String,
    pub app_title: String,
}

impl From<&Config> for CompletionSettings {
    fn from(config: &Config) -> Self {
        Self {
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: config.request_timeout(),
            app_url: config.app_url.clone(),
            app_title: config.app_title.clone(),
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Clone)]
pub struct CompletionClient {
    client: Client,
    api_key: Option<String>,
    settings: CompletionSettings,
}

impl CompletionClient {
    pub fn new(api_key: Option<String>, settings: CompletionSettings) -> Result<Self, CompletionError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            api_key,
            settings,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, CompletionError> {
        Self::new(config.api_key(), CompletionSettings::from(config))
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(is_usable_api_key)
    }

    /// Send `history` (without system prompt) and return the assistant reply
    pub async fn complete(&self, history: &[ChatTurn]) -> Result<String, CompletionError> {
        let api_key = match self.api_key.as_deref() {
            Some(key) if is_usable_api_key(key) => key,
            _ => {
                warn!("completion requested without a usable API key");
                return Err(CompletionError::Configuration);
            }
        };

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatTurn::new(Role::System, SYSTEM_PROMPT));
        messages.extend_from_slice(history);

        let request = CompletionRequest {
            model: &self.settings.model,
            messages: &messages,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            stream: false,
        };

        let url = format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'));
        info!(model = %self.settings.model, turns = history.len(), "sending completion request");

        let response = self.client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", &self.settings.app_url)
            .header("X-Title", &self.settings.app_title)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(%status, bytes = body.len(), "completion response received");

        if !status.is_success() {
            warn!(%status, "completion request rejected");
            return Err(CompletionError::Protocol(format!(
                "API request failed with status {}: {}",
                status.as_u16(),
                body
            )));
        }

        extract_reply(&body)
    }
}

/// Pull `choices[0].message.content` out of a response body
fn extract_reply(body: &str) -> Result<String, CompletionError> {
    let value: Value = serde_json::from_str(body).map_err(|err| {
        warn!(%err, "completion response is not JSON");
        CompletionError::Protocol(INVALID_RESPONSE.to_string())
    })?;

    value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .filter(|content| !content.is_empty())
        .map(str::to_string)
        .ok_or_else(|| CompletionError::Protocol(INVALID_RESPONSE.to_string()))
}
