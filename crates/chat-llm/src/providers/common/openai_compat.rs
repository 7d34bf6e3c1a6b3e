//! OpenAI-compatible request serialization helpers.
//!
//! Builds a chat completions body from [`Turn`] values without leaking
//! internal fields (`id`, `created_at`, `token_count`). Image attachments are
//! inlined as base64 `data:` URLs.

use base64::{engine::general_purpose, Engine as _};
use chat_state::{ImageAttachment, Turn, TurnContent};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::provider::{LLMError, Result};
use crate::types::LLMChunk;

/// `data:image/<subtype>;base64,<payload>` URL for an attachment.
pub fn image_data_url(image: &ImageAttachment) -> String {
    format!(
        "data:image/{};base64,{}",
        image.format().subtype(),
        general_purpose::STANDARD.encode(image.data())
    )
}

fn content_to_openai_compat_json(content: &TurnContent) -> Value {
    match content {
        TurnContent::Text(text) => json!(text),
        TurnContent::Images(_) | TurnContent::Mixed { .. } => {
            let mut parts = Vec::with_capacity(content.images().len() + 1);
            if let Some(text) = content.text() {
                parts.push(json!({ "type": "text", "text": text }));
            }
            for image in content.images() {
                parts.push(json!({
                    "type": "image_url",
                    "image_url": { "url": image_data_url(image) },
                }));
            }
            Value::Array(parts)
        }
    }
}

/// Convert turns to an OpenAI-compatible `messages` array.
pub fn turns_to_openai_compat_json(turns: &[Turn]) -> Vec<Value> {
    turns
        .iter()
        .map(|t| {
            json!({
                "role": t.role().as_str(),
                "content": content_to_openai_compat_json(t.content()),
            })
        })
        .collect()
}

/// Build an OpenAI-compatible chat request body.
pub fn build_openai_compat_body(
    model: &str,
    turns: &[Turn],
    max_output_tokens: Option<u32>,
    stream: bool,
) -> Value {
    let mut body = json!({
        "model": model,
        "messages": turns_to_openai_compat_json(turns),
        "stream": stream,
    });

    if let Some(max_tokens) = max_output_tokens {
        body["max_tokens"] = json!(max_tokens);
    }

    body
}

// --- Streaming chunk parsing ---

#[derive(Debug, Deserialize)]
pub struct OpenAICompatStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAICompatChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatChoice {
    #[serde(default)]
    delta: OpenAICompatDelta,
}

#[derive(Debug, Deserialize, Default)]
struct OpenAICompatDelta {
    content: Option<String>,
}

/// Convert a single stream chunk into an [`LLMChunk`].
pub fn parse_openai_compat_chunk(chunk: OpenAICompatStreamChunk) -> LLMChunk {
    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .unwrap_or_default();
    LLMChunk::Token(content)
}

/// Parse an SSE `data:` payload.
///
/// - `"[DONE]"` -> `LLMChunk::Done`
/// - Invalid JSON -> error
pub fn parse_openai_compat_sse_data_strict(data: &str) -> Result<LLMChunk> {
    if data.trim() == "[DONE]" {
        return Ok(LLMChunk::Done);
    }

    let chunk: OpenAICompatStreamChunk = serde_json::from_str(data)?;
    Ok(parse_openai_compat_chunk(chunk))
}

// --- Non-streaming response parsing ---

#[derive(Debug, Deserialize)]
struct OpenAICompatResponse {
    #[serde(default)]
    choices: Vec<OpenAICompatResponseChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatResponseChoice {
    message: OpenAICompatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatResponseMessage {
    content: Option<String>,
}

/// Extract the assistant text from a complete (non-streamed) response body.
pub fn parse_openai_compat_response(body: &str) -> Result<String> {
    let response: OpenAICompatResponse = serde_json::from_str(body)?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LLMError::Api("Response contained no choices".to_string()))?;
    Ok(choice.message.content.unwrap_or_default())
}
