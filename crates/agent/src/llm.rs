use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chatterbox_core::config::LlmConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationParams {
    pub const fn new(temperature: f32, max_tokens: u32) -> Self {
        Self { temperature, max_tokens }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(config.temperature, config.max_tokens)
    }
}

/// Opaque text-completion capability. Implementations return the raw model
/// text; trimming and emptiness checks happen in [`Generator`].
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String>;
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm api key is not configured")]
    MissingApiKey,
    #[error("could not build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("llm request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("llm api returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("llm response contained no choices")]
    NoChoices,
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint (Groq by
/// default).
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: SecretString,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatibleClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.expose_secret().trim().is_empty())
            .ok_or(LlmError::MissingApiKey)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(LlmError::Client)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn chat_request<'a>(
        &'a self,
        system_prompt: Option<&'a str>,
        prompt: &'a str,
        params: &GenerationParams,
    ) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_prompt {
            messages.push(ChatMessage { role: "system", content: system });
        }
        messages.push(ChatMessage { role: "user", content: prompt });

        ChatRequest {
            model: &self.model,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            stream: false,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String> {
        let request = self.chat_request(system_prompt, prompt, params);

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(LlmError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body }.into());
        }

        let payload: ChatResponse = response.json().await.map_err(LlmError::Request)?;
        let choice = payload.choices.into_iter().next().ok_or(LlmError::NoChoices)?;
        Ok(choice.message.content.unwrap_or_default())
    }
}

/// Outcome of one best-effort generation. All three collapse to "no reply"
/// at the responder boundary except `Success`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Generation {
    Success(String),
    Empty,
    Failure(String),
}

impl Generation {
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Success(text) => Some(text),
            Self::Empty | Self::Failure(_) => None,
        }
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Empty => "empty",
            Self::Failure(_) => "failure",
        }
    }
}

/// Wraps an [`LlmClient`] with a hard deadline and folds errors into
/// [`Generation`].
#[derive(Clone)]
pub struct Generator {
    client: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl Generator {
    pub fn new(client: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub async fn generate(
        &self,
        system_prompt: Option<&str>,
        prompt: &str,
        params: &GenerationParams,
    ) -> Generation {
        let call = self.client.complete(system_prompt, prompt, params);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(text)) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    Generation::Empty
                } else {
                    Generation::Success(trimmed.to_string())
                }
            }
            Ok(Err(error)) => {
                warn!(
                    event_name = "llm.generation.failed",
                    error = %error,
                    "generative call failed"
                );
                Generation::Failure(error.to_string())
            }
            Err(_) => {
                warn!(
                    event_name = "llm.generation.timeout",
                    timeout_ms = self.timeout.as_millis() as u64,
                    "generative call timed out"
                );
                Generation::Failure(format!("timed out after {}ms", self.timeout.as_millis()))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::time::Duration;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::{GenerationParams, LlmClient};

    pub enum Scripted {
        Text(&'static str),
        Fail(&'static str),
        Hang,
    }

    /// Replays scripted outcomes and records every prompt it receives.
    #[derive(Default)]
    pub struct ScriptedLlm {
        script: Mutex<VecDeque<Scripted>>,
        pub prompts: Mutex<Vec<(Option<String>, String, GenerationParams)>>,
    }

    impl ScriptedLlm {
        pub fn new(script: Vec<Scripted>) -> Self {
            Self { script: Mutex::new(script.into()), prompts: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(
            &self,
            system_prompt: Option<&str>,
            prompt: &str,
            params: &GenerationParams,
        ) -> Result<String> {
            self.prompts.lock().await.push((
                system_prompt.map(str::to_string),
                prompt.to_string(),
                *params,
            ));
            let next = self.script.lock().await.pop_front();
            match next {
                Some(Scripted::Text(text)) => Ok(text.to_string()),
                Some(Scripted::Fail(reason)) => Err(anyhow!(reason)),
                Some(Scripted::Hang) => {
                    tokio::time::sleep(Duration::from_secs(3_600)).await;
                    Ok(String::new())
                }
                None => Err(anyhow!("script exhausted")),
            }
        }
    }
}
