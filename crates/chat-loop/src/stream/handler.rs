use futures::StreamExt;
use tokio::sync::mpsc;

use chat_llm::{LLMChunk, LLMError, LLMStream};

use crate::error::{ChatError, Result};
use crate::events::ChatEvent;

pub struct StreamHandlingOutput {
    pub content: String,
    pub chunk_count: usize,
}

/// Drain a provider stream, forwarding each token as a [`ChatEvent::Token`].
///
/// The first stream error aborts consumption; text received so far is
/// discarded by returning the error. A stream that ends without
/// [`LLMChunk::Done`] was cut off and is an error too.
pub async fn consume_llm_stream(
    mut stream: LLMStream,
    event_tx: &mpsc::Sender<ChatEvent>,
    session_id: &str,
) -> Result<StreamHandlingOutput> {
    let mut content = String::new();
    let mut chunk_count = 0usize;
    let mut completed = false;

    while let Some(chunk_result) = stream.next().await {
        match chunk_result {
            Ok(LLMChunk::Token(token)) => {
                if token.is_empty() {
                    continue;
                }
                chunk_count += 1;
                content.push_str(&token);

                let _ = event_tx.send(ChatEvent::Token { content: token }).await;
            }
            Ok(LLMChunk::Done) => {
                tracing::debug!("[{}] LLM stream completed", session_id);
                completed = true;
                break;
            }
            Err(error) => {
                tracing::warn!(
                    "[{}] LLM stream failed after {} chunk(s): {}",
                    session_id,
                    chunk_count,
                    error
                );
                return Err(ChatError::Upstream(error));
            }
        }
    }

    if !completed {
        tracing::warn!(
            "[{}] LLM stream ended after {} chunk(s) without completing",
            session_id,
            chunk_count
        );
        return Err(ChatError::Upstream(LLMError::Stream(
            "stream ended before completion".to_string(),
        )));
    }

    Ok(StreamHandlingOutput {
        content,
        chunk_count,
    })
}
