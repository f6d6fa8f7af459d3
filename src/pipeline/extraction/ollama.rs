use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::{ExtractionRequest, ServiceReply, TextService, TokenUsage};
use super::ExtractionError;
use crate::config::{ConfigError, ServiceConfig};

/// Ollama HTTP client for local inference.
pub struct OllamaClient {
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, ConfigError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature: 0.0,
            max_tokens: crate::config::DEFAULT_MAX_TOKENS,
            client,
            timeout_secs,
        })
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, ConfigError> {
        let mut client = Self::new(&config.base_url, &config.model, config.timeout_secs)?;
        client.temperature = config.temperature;
        client.max_tokens = config.max_tokens;
        Ok(client)
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    format: &'a str,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

impl From<&OllamaGenerateResponse> for TokenUsage {
    fn from(r: &OllamaGenerateResponse) -> Self {
        Self {
            prompt_tokens: r.prompt_eval_count,
            completion_tokens: r.eval_count,
            total_tokens: r.prompt_eval_count + r.eval_count,
        }
    }
}

impl TextService for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    fn complete(&self, request: &ExtractionRequest) -> Result<ServiceReply, ExtractionError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model: &self.model,
            prompt: &request.user_prompt,
            system: &request.system_prompt,
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: self.temperature,
                top_p: 1.0,
                num_predict: self.max_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| ExtractionError::from_transport(&e, &self.base_url, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ExtractionError::from_status(status.as_u16(), &body));
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .map_err(|e| ExtractionError::from_transport(&e, &self.base_url, self.timeout_secs))?;

        Ok(reply_from_generate(parsed))
    }
}

fn reply_from_generate(parsed: OllamaGenerateResponse) -> ServiceReply {
    let usage = TokenUsage::from(&parsed);
    ServiceReply {
        text: parsed.response,
        usage: Some(usage),
    }
}
