use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::budget::limits::{ModelLimit, ModelLimitsRegistry};
use crate::budget::types::TokenBudget;
use crate::turn::{AttachmentPolicy, DEFAULT_ALLOWED_IMAGE_TYPES, DEFAULT_MAX_ATTACHMENT_BYTES};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

const CONFIG_FILE_PATH: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub api_base: String,
    pub system_prompt: Option<String>,
    /// Overrides the registry's context window for `model`.
    pub max_context_tokens: Option<u32>,
    /// Overrides the response reserve derived from the context window.
    pub max_output_tokens: Option<u32>,
    pub max_attachment_bytes: usize,
    pub allowed_image_types: Vec<String>,
    pub stream: bool,
    pub sanitize_prompts: bool,
    /// Context windows for models the built-in table does not know, or
    /// corrections to it.
    pub model_limits: Vec<ModelLimit>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            max_context_tokens: None,
            max_output_tokens: None,
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            allowed_image_types: DEFAULT_ALLOWED_IMAGE_TYPES
                .iter()
                .map(|t| t.to_string())
                .collect(),
            stream: true,
            sanitize_prompts: true,
            model_limits: Vec::new(),
        }
    }
}

fn app_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".multimodal-chat")
}

pub fn config_json_path() -> PathBuf {
    app_dir().join("config.json")
}

pub fn parse_bool_env(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

impl ChatConfig {
    /// Defaults, then `~/.multimodal-chat/config.json` or `./config.toml`,
    /// then the process environment.
    pub fn new() -> Self {
        let mut config = Self::from_files(&config_json_path(), Path::new(CONFIG_FILE_PATH));
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Load from the JSON file if it parses, otherwise the TOML file,
    /// otherwise defaults. Unreadable or malformed files are skipped.
    pub fn from_files(json_path: &Path, toml_path: &Path) -> Self {
        if let Some(config) = read_config(json_path, |s| {
            serde_json::from_str::<ChatConfig>(s).map_err(|e| e.to_string())
        }) {
            return config;
        }
        read_config(toml_path, |s| {
            toml::from_str::<ChatConfig>(s).map_err(|e| e.to_string())
        })
        .unwrap_or_default()
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| keys.iter().find_map(|&key| lookup(key));

        if let Some(api_key) = first(&["OPENAI_API_KEY", "API_KEY"]) {
            self.api_key = Some(api_key);
        }
        if let Some(api_base) = first(&["OPENAI_BASE_URL", "API_BASE"]) {
            self.api_base = api_base;
        }
        if let Some(model) = first(&["CHAT_MODEL", "MODEL"]) {
            self.model = model;
        }
        if let Some(prompt) = lookup("CHAT_SYSTEM_PROMPT") {
            self.system_prompt = Some(prompt).filter(|p| !p.trim().is_empty());
        }
        if let Some(tokens) = lookup("CHAT_MAX_CONTEXT_TOKENS") {
            self.max_context_tokens = parse_u32_env("CHAT_MAX_CONTEXT_TOKENS", &tokens)
                .or(self.max_context_tokens);
        }
        if let Some(tokens) = lookup("CHAT_MAX_OUTPUT_TOKENS") {
            self.max_output_tokens =
                parse_u32_env("CHAT_MAX_OUTPUT_TOKENS", &tokens).or(self.max_output_tokens);
        }
        if let Some(stream) = lookup("CHAT_STREAM") {
            self.stream = parse_bool_env(&stream);
        }
    }

    pub fn attachment_policy(&self) -> AttachmentPolicy {
        AttachmentPolicy::new(self.max_attachment_bytes, self.allowed_image_types.clone())
    }

    /// Budget for `model`, with the context window and output reserve
    /// overridden where configured. Its `max_output_tokens` is also the
    /// response length requested from the model.
    pub fn token_budget(&self) -> TokenBudget {
        let mut registry = ModelLimitsRegistry::new();
        for limit in &self.model_limits {
            registry.add_limit(limit.clone());
        }

        let mut limit = registry.get_or_default(&self.model);
        if let Some(max_context_tokens) = self.max_context_tokens {
            limit.max_context_tokens = max_context_tokens;
        }
        if let Some(max_output_tokens) = self.max_output_tokens {
            limit.max_output_tokens = Some(max_output_tokens);
        }
        limit.to_budget()
    }
}

fn read_config<F>(path: &Path, parse: F) -> Option<ChatConfig>
where
    F: FnOnce(&str) -> Result<ChatConfig, String>,
{
    if !path.exists() {
        return None;
    }
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("Failed to read config {}: {}", path.display(), e);
            return None;
        }
    };
    match parse(&content) {
        Ok(config) => {
            tracing::debug!("Loaded config from {}", path.display());
            Some(config)
        }
        Err(e) => {
            tracing::warn!("Ignoring malformed config {}: {}", path.display(), e);
            None
        }
    }
}

fn parse_u32_env(key: &str, value: &str) -> Option<u32> {
    match value.trim().parse::<u32>() {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("Ignoring {}={:?}: {}", key, value, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn parse_bool_env_true_values() {
        for value in ["1", "true", "TRUE", " yes ", "Y", "on"] {
            assert!(parse_bool_env(value), "value {value:?} should be true");
        }
    }

    #[test]
    fn parse_bool_env_false_values() {
        for value in ["0", "false", "no", "off", "", "  "] {
            assert!(!parse_bool_env(value), "value {value:?} should be false");
        }
    }

    #[test]
    fn defaults_match_hosted_model() {
        let config = ChatConfig::default();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.max_attachment_bytes, 5 * 1024 * 1024);
        assert_eq!(config.allowed_image_types, vec!["jpg", "jpeg", "png"]);
        assert!(config.stream);
        assert!(config.sanitize_prompts);
    }

    #[test]
    fn json_file_wins_over_toml() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("config.json");
        let toml_path = dir.path().join("config.toml");
        std::fs::write(&json, r#"{"model": "gpt-4o", "stream": false}"#).unwrap();
        std::fs::write(&toml_path, "model = \"gpt-4\"\n").unwrap();

        let config = ChatConfig::from_files(&json, &toml_path);

        assert_eq!(config.model, "gpt-4o");
        assert!(!config.stream);
        // Missing fields fall back to defaults.
        assert_eq!(config.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn malformed_json_falls_back_to_toml() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("config.json");
        let toml_path = dir.path().join("config.toml");
        std::fs::write(&json, "{ not json").unwrap();
        std::fs::write(
            &toml_path,
            "model = \"gpt-4\"\nmax_attachment_bytes = 1024\nallowed_image_types = [\"png\"]\n",
        )
        .unwrap();

        let config = ChatConfig::from_files(&json, &toml_path);

        assert_eq!(config.model, "gpt-4");
        assert_eq!(config.attachment_policy().max_bytes, 1024);
        assert_eq!(config.attachment_policy().allowed_types, vec!["png"]);
    }

    #[test]
    fn missing_files_yield_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ChatConfig::from_files(
            &dir.path().join("absent.json"),
            &dir.path().join("absent.toml"),
        );
        assert_eq!(config, ChatConfig::default());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = ChatConfig::default();
        config.apply_env(env(&[
            ("API_KEY", "fallback-key"),
            ("OPENAI_API_KEY", "sk-test"),
            ("API_BASE", "http://localhost:8080/v1"),
            ("MODEL", "gpt-4"),
            ("CHAT_MAX_CONTEXT_TOKENS", "4000"),
            ("CHAT_MAX_OUTPUT_TOKENS", "not-a-number"),
            ("CHAT_STREAM", "off"),
        ]));

        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.api_base, "http://localhost:8080/v1");
        assert_eq!(config.model, "gpt-4");
        assert_eq!(config.max_context_tokens, Some(4000));
        assert_eq!(config.max_output_tokens, None);
        assert!(!config.stream);
    }

    #[test]
    fn blank_system_prompt_env_clears_prompt() {
        let mut config = ChatConfig::default();
        config.apply_env(env(&[("CHAT_SYSTEM_PROMPT", "  ")]));
        assert_eq!(config.system_prompt, None);
    }

    #[test]
    fn token_budget_applies_overrides() {
        let config = ChatConfig::default();
        let budget = config.token_budget();
        assert_eq!(budget.max_context_tokens, 128_000);
        assert_eq!(budget.max_output_tokens, 4096);

        let config = ChatConfig {
            max_context_tokens: Some(2_000),
            max_output_tokens: Some(500),
            ..ChatConfig::default()
        };
        let budget = config.token_budget();
        assert_eq!(budget.max_context_tokens, 2_000);
        assert_eq!(budget.max_output_tokens, 500);
        assert_eq!(budget.available_input_tokens(), 2_000 - 500 - 200);
    }

    fn assert_reserve_fits_window(config: &ChatConfig) {
        let budget = config.token_budget();
        assert!(
            budget.available_input_tokens() + budget.max_output_tokens <= budget.max_context_tokens,
            "model {}: input {} + output {} exceeds window {}",
            config.model,
            budget.available_input_tokens(),
            budget.max_output_tokens,
            budget.max_context_tokens
        );
    }

    #[test]
    fn input_and_response_fit_window_for_known_models() {
        for (model, _) in crate::budget::limits::KNOWN_MODEL_LIMITS {
            assert_reserve_fits_window(&ChatConfig {
                model: model.to_string(),
                ..ChatConfig::default()
            });
        }
    }

    #[test]
    fn input_and_response_fit_window_with_overrides() {
        let overrides = [
            (Some(2_000), None),
            (Some(2_000), Some(500)),
            (Some(2_000), Some(5_000)),
            (None, Some(200_000)),
            (Some(1), None),
        ];
        for (max_context_tokens, max_output_tokens) in overrides {
            for model in ["gpt-4", "gpt-4o-mini", "local-llama"] {
                assert_reserve_fits_window(&ChatConfig {
                    model: model.to_string(),
                    max_context_tokens,
                    max_output_tokens,
                    ..ChatConfig::default()
                });
            }
        }
    }

    #[test]
    fn gpt_4_reserves_quarter_window_for_response() {
        let config = ChatConfig {
            model: "gpt-4".to_string(),
            ..ChatConfig::default()
        };
        let budget = config.token_budget();
        assert_eq!(budget.max_output_tokens, 2_048);
        assert_eq!(budget.available_input_tokens(), 8_192 - 2_048 - 819);
    }

    #[test]
    fn configured_model_limits_extend_registry() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("config.toml");
        std::fs::write(
            &toml_path,
            concat!(
                "model = \"local-llama-3\"\n",
                "\n",
                "[[model_limits]]\n",
                "model_pattern = \"local-llama\"\n",
                "max_context_tokens = 8000\n",
                "max_output_tokens = 1000\n",
            ),
        )
        .unwrap();

        let config = ChatConfig::from_files(&dir.path().join("absent.json"), &toml_path);
        let budget = config.token_budget();

        assert_eq!(config.model_limits.len(), 1);
        assert_eq!(budget.max_context_tokens, 8_000);
        assert_eq!(budget.max_output_tokens, 1_000);
        assert_eq!(budget.available_input_tokens(), 8_000 - 1_000 - 800);
    }
}
