//! Model context window limits registry.
//!
//! Provides known context window sizes for common models, with user overrides
//! taking priority.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::budget::types::TokenBudget;

/// Known model context window sizes.
pub const KNOWN_MODEL_LIMITS: &[(&str, u32)] = &[
    ("gpt-4o", 128_000),
    ("gpt-4o-mini", 128_000),
    ("gpt-4.1", 1_047_576),
    ("gpt-4.1-mini", 1_047_576),
    ("gpt-4-turbo", 128_000),
    ("gpt-4", 8_192),
    ("gpt-3.5-turbo", 16_385),
    ("o1", 200_000),
    ("o3-mini", 200_000),
    // Default fallback
    ("default", 128_000),
];

/// Default maximum output tokens.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4096;

/// Default safety margin for token counting errors.
pub const DEFAULT_SAFETY_MARGIN: u32 = 1000;

/// Model limit configuration (user-overridable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelLimit {
    /// Model identifier (partial match supported, e.g. "gpt-4o" matches "gpt-4o-2024-08-06")
    pub model_pattern: String,
    /// Maximum context window size in tokens
    pub max_context_tokens: u32,
    /// Maximum output tokens (defaults to min(4096, max_context / 4), never
    /// more than the window)
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    /// Safety margin for token counting (defaults to 1000)
    #[serde(default)]
    pub safety_margin: Option<u32>,
}

impl ModelLimit {
    pub fn new(model_pattern: impl Into<String>, max_context_tokens: u32) -> Self {
        Self {
            model_pattern: model_pattern.into(),
            max_context_tokens,
            max_output_tokens: None,
            safety_margin: None,
        }
    }

    pub fn get_max_output_tokens(&self) -> u32 {
        self.max_output_tokens
            .unwrap_or_else(|| (self.max_context_tokens / 4).min(DEFAULT_MAX_OUTPUT_TOKENS))
            .min(self.max_context_tokens)
    }

    /// Safety margin, never more than a tenth of the window so small models
    /// keep room for history.
    pub fn get_safety_margin(&self) -> u32 {
        self.safety_margin
            .unwrap_or_else(|| DEFAULT_SAFETY_MARGIN.min(self.max_context_tokens / 10))
    }

    pub fn to_budget(&self) -> TokenBudget {
        TokenBudget::with_safety_margin(
            self.max_context_tokens,
            self.get_max_output_tokens(),
            self.get_safety_margin(),
        )
    }
}

/// Registry for model limits with built-in defaults and user overrides.
#[derive(Debug, Clone, Default)]
pub struct ModelLimitsRegistry {
    user_limits: HashMap<String, ModelLimit>,
}

impl ModelLimitsRegistry {
    /// Create a new registry with built-in defaults only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user limit override.
    pub fn add_limit(&mut self, limit: ModelLimit) {
        self.user_limits.insert(limit.model_pattern.clone(), limit);
    }

    /// Get limit for a model, with user overrides taking priority.
    ///
    /// # Matching Strategy
    /// 1. Exact match (user, then built-in)
    /// 2. Model contains pattern or pattern contains model
    ///
    /// For partial matches, the longest (most specific) pattern wins.
    pub fn get(&self, model: &str) -> Option<ModelLimit> {
        if let Some(limit) = self.user_limits.get(model) {
            return Some(limit.clone());
        }

        if let Some((_, tokens)) = KNOWN_MODEL_LIMITS.iter().find(|(p, _)| *p == model) {
            return Some(ModelLimit::new(model, *tokens));
        }

        let best_user_match = self
            .user_limits
            .iter()
            .filter(|(pattern, _)| matches_partially(model, pattern))
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(_, limit)| limit.clone());

        if best_user_match.is_some() {
            return best_user_match;
        }

        KNOWN_MODEL_LIMITS
            .iter()
            .filter(|(pattern, _)| *pattern != "default" && matches_partially(model, pattern))
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(pattern, tokens)| ModelLimit::new(*pattern, *tokens))
    }

    /// Get limit for a model with fallback to default.
    pub fn get_or_default(&self, model: &str) -> ModelLimit {
        self.get(model).unwrap_or_else(|| {
            let default = KNOWN_MODEL_LIMITS
                .iter()
                .find(|(k, _)| *k == "default")
                .map(|(_, v)| *v)
                .unwrap_or(128_000);
            tracing::debug!("No known context limit for {}, using default {}", model, default);
            ModelLimit::new("default", default)
        })
    }

    pub fn list_user_limits(&self) -> Vec<&ModelLimit> {
        self.user_limits.values().collect()
    }
}

fn matches_partially(model: &str, pattern: &str) -> bool {
    !model.is_empty() && (model.contains(pattern) || pattern.contains(model))
}

/// Create a token budget for a specific model from the built-in registry.
pub fn create_budget_for_model(model: &str) -> TokenBudget {
    ModelLimitsRegistry::default().get_or_default(model).to_budget()
}
