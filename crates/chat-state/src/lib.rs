//! Conversation state for a multimodal chat: validated turns, an append-only
//! history, and budget-aware selection of the context sent to the model.

pub mod budget;
pub mod config;
pub mod conversation;
pub mod error;
pub mod turn;

pub use budget::{
    count_tokens, create_budget_for_model, select_context, HeuristicTokenCounter,
    ModelLimitsRegistry, SelectedContext, SharedTokenCounter, TiktokenCounter, TokenBudget,
    TokenCounter, TokenUsageBreakdown,
};
pub use config::ChatConfig;
pub use conversation::{Checkpoint, Conversation};
pub use error::{BudgetError, ValidationError};
pub use turn::{AttachmentPolicy, ImageAttachment, ImageFormat, Role, Turn, TurnContent};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
