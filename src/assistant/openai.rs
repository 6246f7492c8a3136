//! OpenAI-compatible chat completion provider

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::fmt;

use crate::assistant::AssistantProvider;

/// `POST {api_base}/chat/completions` with a JSON-object response format
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_base: String,
    model: String,
    api_key: String,
}

impl OpenAiProvider {
    /// Provider for `{api_base}/chat/completions` using `model`
    pub fn new(api_base: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl AssistantProvider for OpenAiProvider {
    async fn complete(&self, system_prompt: &str, user_prompt: &str, temperature: f32) -> anyhow::Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_prompt },
            ],
            "response_format": { "type": "json_object" },
            "temperature": temperature,
        });

        let completion: ChatCompletion = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("chat completion request failed")?
            .error_for_status()
            .context("chat completion rejected")?
            .json()
            .await
            .context("chat completion body unreadable")?;

        // A missing body is treated as an empty object
        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_else(|| "{}".to_string()))
    }
}

/// Provider used when no API key is configured; every call fails
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableProvider;

#[async_trait]
impl AssistantProvider for UnavailableProvider {
    async fn complete(&self, _system_prompt: &str, _user_prompt: &str, _temperature: f32) -> anyhow::Result<String> {
        bail!("no assistant API key configured")
    }
}
