//! OpenAI-compatible chat-completions client.
//!
//! Implements [`ChatModel`] for any endpoint that speaks
//! `POST {base_url}/chat/completions`. Exactly one request per call; no
//! retries.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use arcana_core::interpret::ChatModel;

use crate::config::LlmConfig;

pub struct OpenAiChat {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiChat {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ChatModel for OpenAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("chat completion error {}: {}", status, text);
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("chat completion returned no content"))
    }
}

/// Build the configured chat model.
///
/// A missing API key is not an error: interpretations then come from the
/// template, as with `provider = "disabled"`.
pub fn create_chat_model(config: &LlmConfig) -> Result<Option<Arc<dyn ChatModel>>> {
    match config.provider.as_str() {
        "disabled" => Ok(None),
        "openai" => match &config.api_key {
            Some(key) => Ok(Some(Arc::new(OpenAiChat::new(config, key.clone())?))),
            None => {
                tracing::warn!(
                    env = %config.api_key_env,
                    "no llm API key configured, interpretations will use the template"
                );
                Ok(None)
            }
        },
        other => bail!("Unknown llm provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_disables_model() {
        let config = LlmConfig::default();
        assert!(create_chat_model(&config).unwrap().is_none());
    }

    #[test]
    fn test_key_builds_model() {
        let config = LlmConfig {
            api_key: Some("sk-test".to_string()),
            ..LlmConfig::default()
        };
        let model = create_chat_model(&config).unwrap().unwrap();
        assert_eq!(model.model_name(), "gpt-4o-mini");
    }
}
