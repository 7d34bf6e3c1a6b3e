//! Core types for token budget management.

use serde::{Deserialize, Serialize};

use crate::budget::limits::{create_budget_for_model, DEFAULT_SAFETY_MARGIN};
use crate::turn::Turn;

/// Token budget configuration for a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBudget {
    /// Maximum context window size for the model (input + output)
    pub max_context_tokens: u32,
    /// Maximum tokens reserved for model output
    pub max_output_tokens: u32,
    /// Safety margin for tokenizer estimation errors
    #[serde(default = "default_safety_margin")]
    pub safety_margin: u32,
}

fn default_safety_margin() -> u32 {
    DEFAULT_SAFETY_MARGIN
}

impl TokenBudget {
    /// Create a new token budget with explicit safety margin.
    pub fn with_safety_margin(
        max_context_tokens: u32,
        max_output_tokens: u32,
        safety_margin: u32,
    ) -> Self {
        Self {
            max_context_tokens,
            max_output_tokens,
            safety_margin,
        }
    }

    /// Tokens left for the conversation once the response reserve and the
    /// safety margin are taken out of the context window.
    pub fn available_input_tokens(&self) -> u32 {
        self.max_context_tokens
            .saturating_sub(self.max_output_tokens)
            .saturating_sub(self.safety_margin)
    }
}

impl Default for TokenBudget {
    /// Budget of the registry's fallback window.
    fn default() -> Self {
        create_budget_for_model("default")
    }
}

/// Detailed token usage of a selected context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsageBreakdown {
    /// Tokens used by the leading system turn
    pub system_tokens: u32,
    /// Tokens used by the recent window
    pub window_tokens: u32,
    /// Total tokens in the selected context
    pub total_tokens: u32,
    /// Budget the selection was made against
    pub budget_limit: u32,
}

impl TokenUsageBreakdown {
    /// Calculate percentage of budget used.
    pub fn usage_percentage(&self) -> f64 {
        if self.budget_limit == 0 {
            return 0.0;
        }
        (self.total_tokens as f64 / self.budget_limit as f64) * 100.0
    }
}

/// Turns chosen for one model call.
///
/// Always the leading system turn (if any) followed by a contiguous suffix of
/// the remaining history, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedContext {
    /// Turns to send, in conversation order
    pub turns: Vec<Turn>,
    /// Token usage breakdown
    pub token_usage: TokenUsageBreakdown,
    /// Number of older turns left out
    pub turns_dropped: usize,
}

impl SelectedContext {
    /// Whether any history was left out to fit the budget.
    pub fn truncation_occurred(&self) -> bool {
        self.turns_dropped > 0
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }
}
