//! Token budget management for conversations.
//!
//! Keeps every model call inside the context window while preserving the
//! most recent exchanges.
//!
//! # Key Components
//!
//! - [`types`]: `TokenBudget`, `TokenUsageBreakdown`, `SelectedContext`
//! - [`counter`]: token counting via `tiktoken-rs` with a heuristic fallback
//! - [`limits`]: model context window limits registry
//! - [`selection`]: context selection with budget enforcement

pub mod counter;
pub mod limits;
pub mod selection;
pub mod types;

pub use counter::{
    count_tokens, Encoding, HeuristicTokenCounter, SharedTokenCounter, TiktokenCounter,
    TokenCounter, IMAGE_TOKEN_ESTIMATE, TOKENS_PER_TURN,
};
pub use limits::{create_budget_for_model, ModelLimit, ModelLimitsRegistry};
pub use selection::select_context;
pub use types::{SelectedContext, TokenBudget, TokenUsageBreakdown};
