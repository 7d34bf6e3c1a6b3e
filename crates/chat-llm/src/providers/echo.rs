use async_trait::async_trait;
use futures_util::stream;

use chat_state::{Role, Turn};

use crate::provider::{LLMProvider, LLMStream, Result};
use crate::types::LLMChunk;

/// Offline provider that streams the latest user text back word by word.
#[derive(Debug, Clone, Default)]
pub struct EchoProvider;

impl EchoProvider {
    pub fn new() -> Self {
        Self
    }

    fn reply_for(turns: &[Turn]) -> String {
        let Some(last_user) = turns.iter().rev().find(|t| t.role() == Role::User) else {
            return String::new();
        };
        let images = last_user.content().images();
        match (last_user.text(), images.len()) {
            (Some(text), 0) => text.to_string(),
            (Some(text), n) => format!("{text} [{n} image(s)]"),
            (None, n) => format!("[{n} image(s)]"),
        }
    }
}

#[async_trait]
impl LLMProvider for EchoProvider {
    async fn chat_stream(
        &self,
        turns: &[Turn],
        _max_output_tokens: Option<u32>,
        _model: Option<&str>,
    ) -> Result<LLMStream> {
        let reply = Self::reply_for(turns);
        log::debug!("Echo provider replying with {} chars", reply.len());

        let mut chunks: Vec<Result<LLMChunk>> = reply
            .split_inclusive(' ')
            .map(|piece| Ok(LLMChunk::Token(piece.to_string())))
            .collect();
        chunks.push(Ok(LLMChunk::Done));

        Ok(Box::pin(stream::iter(chunks)))
    }

    fn default_model(&self) -> &str {
        "echo"
    }
}
