use async_trait::async_trait;

use chat_state::{Role, Turn};

use crate::provider::{LLMProvider, LLMStream, Result};
use crate::sanitizer::PromptSanitizer;

/// Decorates an [`LLMProvider`] by filtering prompt-injection phrases out of
/// outgoing user turns.
///
/// Only the copy sent upstream is rewritten; the caller's history keeps the
/// text as typed.
pub struct SanitizingProviderDecorator<P: LLMProvider> {
    inner: P,
    sanitizer: PromptSanitizer,
}

impl<P: LLMProvider> SanitizingProviderDecorator<P> {
    pub fn new(inner: P, sanitizer: PromptSanitizer) -> Self {
        Self { inner, sanitizer }
    }

    pub fn with_default_patterns(inner: P) -> Self {
        Self::new(inner, PromptSanitizer::default())
    }

    fn sanitize_turn(&self, turn: &Turn) -> Option<Turn> {
        if turn.role() != Role::User {
            return None;
        }
        let text = turn.text()?;
        let (sanitized, detections) = self.sanitizer.sanitize(text);
        if detections == 0 {
            return None;
        }
        Some(turn.with_content(turn.content().with_text(sanitized)))
    }
}

#[async_trait]
impl<P: LLMProvider> LLMProvider for SanitizingProviderDecorator<P> {
    async fn chat_stream(
        &self,
        turns: &[Turn],
        max_output_tokens: Option<u32>,
        model: Option<&str>,
    ) -> Result<LLMStream> {
        if self.sanitizer.is_empty() {
            return self.inner.chat_stream(turns, max_output_tokens, model).await;
        }

        let mut rewritten = 0;
        let sanitized: Vec<Turn> = turns
            .iter()
            .map(|t| match self.sanitize_turn(t) {
                Some(clean) => {
                    rewritten += 1;
                    clean
                }
                None => t.clone(),
            })
            .collect();

        if rewritten > 0 {
            log::debug!("Sanitized {} outgoing user turn(s)", rewritten);
        }

        self.inner
            .chat_stream(&sanitized, max_output_tokens, model)
            .await
    }

    fn default_model(&self) -> &str {
        self.inner.default_model()
    }
}
