//! HTTP gateway to the configured LLM providers.
//!
//! One `reqwest::Client` serves every provider; the request shape is picked
//! from `LlmConfig::provider`:
//!
//! - `open_ai` / `custom`: `POST {endpoint}/chat/completions` (Bearer auth)
//! - `anthropic`: `POST {endpoint}/messages` (`x-api-key`)
//! - `google`: `POST {endpoint}/models/{model}:generateContent?key=...`

use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domains::analysis::models::{LlmConfig, LlmProvider};
use crate::kernel::{BaseLlmGateway, LlmCompletion};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 2000;
const DEFAULT_TEMPERATURE: f32 = 0.3;

#[derive(Debug, Error)]
pub enum LlmGatewayError {
    /// Config has no decrypted API key
    #[error("LLM config {0} has no usable API key")]
    MissingCredential(String),

    /// Connection failed or timed out
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response
    #[error("{provider} API error ({status}): {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },

    /// Response did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),
}

#[derive(Clone)]
pub struct HttpLlmGateway {
    http_client: Client,
}

impl HttpLlmGateway {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self { http_client })
    }

    fn build_request(&self, prompt: &str, config: &LlmConfig, api_key: &str) -> RequestBuilder {
        let settings = config.settings();
        let max_tokens = settings.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        let temperature = settings.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        let endpoint = config.endpoint();

        match config.provider {
            LlmProvider::OpenAi | LlmProvider::Custom => self
                .http_client
                .post(format!("{}/chat/completions", endpoint))
                .header("Authorization", format!("Bearer {}", api_key))
                .json(&json!({
                    "model": config.model_name,
                    "messages": [{ "role": "user", "content": prompt }],
                    "max_tokens": max_tokens,
                    "temperature": temperature,
                })),
            LlmProvider::Anthropic => self
                .http_client
                .post(format!("{}/messages", endpoint))
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&json!({
                    "model": config.model_name,
                    "max_tokens": max_tokens,
                    "temperature": temperature,
                    "messages": [{ "role": "user", "content": prompt }],
                })),
            LlmProvider::Google => self
                .http_client
                .post(format!(
                    "{}/models/{}:generateContent",
                    endpoint, config.model_name
                ))
                .query(&[("key", api_key)])
                .json(&json!({
                    "contents": [{ "parts": [{ "text": prompt }] }],
                    "generationConfig": {
                        "temperature": temperature,
                        "maxOutputTokens": max_tokens,
                    },
                })),
        }
    }
}

#[async_trait]
impl BaseLlmGateway for HttpLlmGateway {
    async fn complete(&self, prompt: &str, config: &LlmConfig) -> Result<LlmCompletion> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LlmGatewayError::MissingCredential(config.name.clone()))?;

        let start = Instant::now();
        let response = self
            .build_request(prompt, config, api_key)
            .send()
            .await
            .map_err(|e| {
                warn!(provider = config.provider.as_str(), error = %e, "LLM request failed");
                LlmGatewayError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(provider = config.provider.as_str(), status = %status, error = %body, "LLM API error");
            return Err(LlmGatewayError::Api {
                provider: config.provider.as_str(),
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| LlmGatewayError::Parse(e.to_string()))?;

        let completion = parse_completion(config.provider, &body)?;

        debug!(
            provider = config.provider.as_str(),
            model = %config.model_name,
            tokens = completion.tokens_used,
            duration_ms = start.elapsed().as_millis() as u64,
            "LLM completion"
        );

        Ok(completion)
    }
}

/// Extracts the text and token usage from a provider's response body.
pub fn parse_completion(
    provider: LlmProvider,
    body: &Value,
) -> std::result::Result<LlmCompletion, LlmGatewayError> {
    let (text, tokens) = match provider {
        LlmProvider::OpenAi | LlmProvider::Custom => (
            body["choices"][0]["message"]["content"].as_str(),
            body["usage"]["total_tokens"].as_u64().unwrap_or(0),
        ),
        LlmProvider::Anthropic => {
            let usage = &body["usage"];
            let tokens = usage["input_tokens"].as_u64().unwrap_or(0)
                + usage["output_tokens"].as_u64().unwrap_or(0);
            (body["content"][0]["text"].as_str(), tokens)
        }
        LlmProvider::Google => (
            body["candidates"][0]["content"]["parts"][0]["text"].as_str(),
            body["usageMetadata"]["totalTokenCount"].as_u64().unwrap_or(0),
        ),
    };

    let text = text.ok_or_else(|| {
        LlmGatewayError::Parse(format!("no completion text in {} response", provider.as_str()))
    })?;

    Ok(LlmCompletion {
        text: text.to_string(),
        tokens_used: u32::try_from(tokens).unwrap_or(u32::MAX),
        cost: None,
    })
}
