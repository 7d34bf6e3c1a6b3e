use chat_state::ChatConfig;

/// Configuration for one chat session's round-trips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLoopConfig {
    /// Model override passed to the provider; `None` uses the provider's default
    pub model_name: Option<String>,
    /// Response length requested from the model; must match the reserve the
    /// session's budget subtracts
    pub max_output_tokens: Option<u32>,
    /// Seeded as the leading system turn
    pub system_prompt: Option<String>,
    /// Ask the provider for server-sent events rather than one response
    pub stream: bool,
}

impl Default for ChatLoopConfig {
    fn default() -> Self {
        Self {
            model_name: None,
            max_output_tokens: None,
            system_prompt: None,
            stream: true,
        }
    }
}

impl From<&ChatConfig> for ChatLoopConfig {
    fn from(config: &ChatConfig) -> Self {
        Self {
            model_name: Some(config.model.clone()),
            max_output_tokens: Some(config.token_budget().max_output_tokens),
            system_prompt: config.system_prompt.clone(),
            stream: config.stream,
        }
    }
}
