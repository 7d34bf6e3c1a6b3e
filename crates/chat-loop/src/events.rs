use chat_state::TokenUsageBreakdown;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Token {
        content: String,
    },

    /// Emitted once the context for the call has been selected
    ContextPrepared {
        usage: ContextUsage,
    },

    Complete {
        usage: TokenUsage,
    },

    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// What was sent for one call, relative to the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextUsage {
    pub system_tokens: u32,
    pub window_tokens: u32,
    pub total_tokens: u32,
    pub budget_limit: u32,
    pub turns_sent: usize,
    pub turns_dropped: usize,
}

impl ContextUsage {
    pub fn new(breakdown: &TokenUsageBreakdown, turns_sent: usize, turns_dropped: usize) -> Self {
        Self {
            system_tokens: breakdown.system_tokens,
            window_tokens: breakdown.window_tokens,
            total_tokens: breakdown.total_tokens,
            budget_limit: breakdown.budget_limit,
            turns_sent,
            turns_dropped,
        }
    }

    pub fn truncation_occurred(&self) -> bool {
        self.turns_dropped > 0
    }
}
