use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use boutiq_core::config::LlmConfig;
use boutiq_core::domain::session::MessageRole;

#[derive(Clone, Debug, PartialEq)]
pub struct ChatTurn {
    pub role: MessageRole,
    pub content: String,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// One completion over the full conversation. No retries: the caller
    /// owns the failure policy.
    async fn complete(&self, system: &str, turns: &[ChatTurn]) -> Result<String>;
}

/// Anthropic Messages API transport.
pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
    timeout: Duration,
}

impl AnthropicClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key =
            config.api_key.clone().ok_or_else(|| anyhow!("llm.api_key is not configured"))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, system: &str, turns: &[ChatTurn]) -> Result<String> {
        let messages: Vec<Value> = turns
            .iter()
            .map(|turn| json!({ "role": turn.role.as_str(), "content": turn.content }))
            .collect();

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .timeout(self.timeout)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", "2023-06-01")
            .json(&json!({
                "model": self.model,
                "max_tokens": self.max_tokens,
                "system": system,
                "messages": messages,
            }))
            .send()
            .await
            .context("llm request failed")?;

        let status = response.status();
        let body: Value = response.json().await.context("llm response was not json")?;
        if !status.is_success() {
            return Err(anyhow!("llm returned status {status}: {body}"));
        }

        body.get("content")
            .and_then(Value::as_array)
            .and_then(|blocks| blocks.first())
            .and_then(|block| block.get("text"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("llm response had no text content"))
    }
}
