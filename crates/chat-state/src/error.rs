use thiserror::Error;

/// Raised while constructing a turn or an attachment, before anything is
/// appended to a conversation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Attachment '{name}' is {size} bytes, exceeding the {max} byte limit")]
    AttachmentTooLarge { name: String, size: usize, max: usize },

    #[error("Attachment '{name}' has unsupported format '{format}' (allowed: {allowed})")]
    UnsupportedFormat {
        name: String,
        format: String,
        allowed: String,
    },

    #[error("Attachment '{name}' could not be read: {reason}")]
    Unreadable { name: String, reason: String },

    #[error("Message has neither text nor attachments")]
    EmptyContent,
}

/// Errors that can occur while selecting context within a token budget.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BudgetError {
    /// The leading system turn alone does not fit. Unsatisfiable configuration.
    #[error("System turn ({system_tokens} tokens) exceeds available budget ({budget} tokens)")]
    BudgetExhausted { system_tokens: u32, budget: u32 },

    /// The newest turn does not fit next to the system turn, so it cannot be
    /// sent at all.
    #[error("Message ({turn_tokens} tokens) exceeds the budget left for history ({budget} tokens)")]
    TurnTooLarge { turn_tokens: u32, budget: u32 },

    #[error("Token budget must be greater than zero")]
    ZeroBudget,
}
