use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::{ExtractionRequest, ServiceReply, TextService, TokenUsage};
use super::ExtractionError;
use crate::config::{ConfigError, ServiceConfig};

/// Client for an OpenAI-compatible chat completions endpoint.
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout_secs: u64,
    client: reqwest::blocking::Client,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout_secs: u64,
    ) -> Result<Self, ConfigError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature: 0.0,
            max_tokens: crate::config::DEFAULT_MAX_TOKENS,
            timeout_secs,
            client,
        })
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or(ConfigError::MissingCredential(config.backend))?;
        let mut client = Self::new(&config.base_url, api_key, &config.model, config.timeout_secs)?;
        client.temperature = config.temperature;
        client.max_tokens = config.max_tokens;
        Ok(client)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    presence_penalty: f32,
    frequency_penalty: f32,
    n: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

impl From<ChatUsage> for TokenUsage {
    fn from(u: ChatUsage) -> Self {
        Self {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

impl TextService for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    fn complete(&self, request: &ExtractionRequest) -> Result<ServiceReply, ExtractionError> {
        let url = self.endpoint();
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            temperature: self.temperature,
            top_p: 1.0,
            max_tokens: self.max_tokens,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            n: 1,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| ExtractionError::from_transport(&e, &self.base_url, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ExtractionError::from_status(status.as_u16(), &body));
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| ExtractionError::from_transport(&e, &self.base_url, self.timeout_secs))?;

        Ok(reply_from_chat(parsed))
    }
}

/// An empty reply is passed on with its usage; the parser rejects it.
fn reply_from_chat(parsed: ChatResponse) -> ServiceReply {
    let usage = parsed.usage.map(TokenUsage::from);
    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|t| t.trim().to_string())
        .unwrap_or_default();

    ServiceReply { text, usage }
}
