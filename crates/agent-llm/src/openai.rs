use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::compat::{build_request_body, parse_sse_data, SamplingOptions};
use crate::provider::{LLMError, LLMProvider, LLMStream, Result};
use crate::sse::llm_stream_from_sse;
use agent_core::{tools::ToolSchema, Message};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "openai/gpt-4o";

/// Streaming client for any OpenAI-compatible chat completions endpoint.
/// Defaults target OpenRouter.
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    options: SamplingOptions,
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            options: SamplingOptions {
                temperature: 0.7,
                max_tokens: 2000,
            },
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.options.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn chat_stream(&self, messages: &[Message], tools: &[ToolSchema]) -> Result<LLMStream> {
        let body = build_request_body(&self.model, messages, tools, self.options);
        log::debug!(
            "Requesting completion from {} ({} messages, {} tools)",
            self.model,
            messages.len(),
            tools.len()
        );

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
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    LLMError::Auth(format!("HTTP {status}: {text}"))
                }
                _ => LLMError::Api(format!("HTTP {status}: {text}")),
            });
        }

        Ok(llm_stream_from_sse(response, |_event, data| parse_sse_data(data)))
    }
}
