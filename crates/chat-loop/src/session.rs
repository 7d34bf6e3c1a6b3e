use std::path::Path;
use std::sync::Arc;

use chat_state::{
    AttachmentPolicy, BudgetError, ChatConfig, Checkpoint, Conversation, ImageAttachment,
    SelectedContext, SharedTokenCounter, TiktokenCounter, TokenBudget, Turn, ValidationError,
};

use crate::config::ChatLoopConfig;

/// One user submission: optional text plus already validated images.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInput {
    pub text: Option<String>,
    pub images: Vec<ImageAttachment>,
}

impl UserInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            images: Vec::new(),
        }
    }

    pub fn with_image(mut self, image: ImageAttachment) -> Self {
        self.images.push(image);
        self
    }
}

/// State of one chat session, owned by whoever drives it.
pub struct ChatSession {
    id: String,
    conversation: Conversation,
    counter: SharedTokenCounter,
    budget: TokenBudget,
    attachment_policy: AttachmentPolicy,
}

impl ChatSession {
    /// Start a session, seeding the system turn from `config.system_prompt`.
    pub fn new(
        config: &ChatLoopConfig,
        counter: SharedTokenCounter,
        budget: TokenBudget,
        attachment_policy: AttachmentPolicy,
    ) -> Self {
        let conversation = match config
            .system_prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
        {
            Some(prompt) => Conversation::with_system_turn(Turn::system(prompt, counter.as_ref())),
            None => Conversation::new(),
        };

        let id = uuid::Uuid::new_v4().to_string();
        tracing::debug!(
            "[{}] Session started (input budget {} tokens, system turn: {})",
            id,
            budget.available_input_tokens(),
            conversation.system_turn().is_some()
        );

        Self {
            id,
            conversation,
            counter,
            budget,
            attachment_policy,
        }
    }

    /// Session configured from application settings, counting tokens with
    /// the model's own tokenizer.
    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new(
            &ChatLoopConfig::from(config),
            Arc::new(TiktokenCounter::for_model(&config.model)),
            config.token_budget(),
            config.attachment_policy(),
        )
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn budget(&self) -> &TokenBudget {
        &self.budget
    }

    pub fn attachment_policy(&self) -> &AttachmentPolicy {
        &self.attachment_policy
    }

    /// Load an image from disk under this session's attachment policy.
    pub fn load_attachment(&self, path: &Path) -> Result<ImageAttachment, ValidationError> {
        ImageAttachment::from_path(path, &self.attachment_policy)
    }

    /// Validate `input` into a user turn and append it.
    pub fn submit(&mut self, input: UserInput) -> Result<Turn, ValidationError> {
        let turn = Turn::user(input.text.as_deref(), input.images, self.counter.as_ref())?;
        self.conversation.append_turn(turn.clone());
        Ok(turn)
    }

    pub fn append_assistant(&mut self, text: impl Into<String>) -> Turn {
        let turn = Turn::assistant(text, self.counter.as_ref());
        self.conversation.append_turn(turn.clone());
        turn
    }

    /// Context for the next call, within the budget's input allowance.
    pub fn select_context(&self) -> Result<SelectedContext, BudgetError> {
        self.conversation
            .select_context(self.budget.available_input_tokens())
    }

    pub fn checkpoint(&self) -> Checkpoint {
        self.conversation.checkpoint()
    }

    pub fn rollback_to(&mut self, checkpoint: Checkpoint) -> usize {
        self.conversation.rollback_to(checkpoint)
    }
}
