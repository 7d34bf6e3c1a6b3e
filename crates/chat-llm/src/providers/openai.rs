use async_trait::async_trait;
use futures_util::stream;
use reqwest::Client;

use crate::provider::{LLMError, LLMProvider, LLMStream, Result};
use crate::types::LLMChunk;
use chat_state::Turn;

use super::common::openai_compat::{build_openai_compat_body, parse_openai_compat_response};
use super::common::sse::chat_completion_stream;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    stream: bool,
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            stream: true,
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

    /// Request a single complete response instead of server-sent events.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn chat_stream(
        &self,
        turns: &[Turn],
        max_output_tokens: Option<u32>,
        model: Option<&str>,
    ) -> Result<LLMStream> {
        if self.api_key.trim().is_empty() {
            return Err(LLMError::Auth(
                "No API key configured (set OPENAI_API_KEY or pass --api-key)".to_string(),
            ));
        }

        // Use provided model or fall back to default
        let model_to_use = model.unwrap_or(&self.model);

        if model.is_some() {
            log::debug!(
                "OpenAI provider using override model '{}' (default: '{}')",
                model_to_use,
                self.model
            );
        }

        let body = build_openai_compat_body(model_to_use, turns, max_output_tokens, self.stream);
        log::debug!(
            "Sending {} turn(s) to {} (stream: {})",
            turns.len(),
            self.completions_url(),
            self.stream
        );

        let response = self
            .client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            log::error!("Chat completion failed with HTTP {}", status);
            return Err(LLMError::Api(format!("HTTP {}: {}", status, text)));
        }

        if !self.stream {
            let text = response.text().await?;
            let content = parse_openai_compat_response(&text)?;
            return Ok(Box::pin(stream::iter(vec![
                Ok(LLMChunk::Token(content)),
                Ok(LLMChunk::Done),
            ])));
        }

        Ok(chat_completion_stream(response.bytes_stream()))
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}
