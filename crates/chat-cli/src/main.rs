mod logging;
mod repl;

use std::sync::Arc;

use clap::{Parser, ValueEnum};
use colored::Colorize;

use chat_llm::{EchoProvider, LLMProvider, OpenAIProvider, SanitizingProviderDecorator};
use chat_loop::{ChatLoopConfig, ChatSession};
use chat_state::ChatConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProviderKind {
    /// OpenAI-compatible chat completions API
    Openai,
    /// Offline provider that echoes your message back
    Echo,
}

#[derive(Parser, Debug)]
#[command(name = "multimodal-chat")]
#[command(about = "Interactive multimodal chat with token budget management")]
#[command(version)]
struct Cli {
    /// Model identifier
    #[arg(long)]
    model: Option<String>,

    /// API key (defaults to OPENAI_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long)]
    base_url: Option<String>,

    #[arg(long, value_enum, env = "CHAT_PROVIDER", default_value_t = ProviderKind::Openai)]
    provider: ProviderKind,

    /// System prompt seeded at session start
    #[arg(long)]
    system_prompt: Option<String>,

    /// Override the model's context window size
    #[arg(long)]
    max_context_tokens: Option<u32>,

    /// Request whole responses instead of streaming
    #[arg(long)]
    no_stream: bool,

    /// Enable debug logging
    #[arg(long, short)]
    debug: bool,

    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply_to(&self, config: &mut ChatConfig) {
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(api_key) = &self.api_key {
            config.api_key = Some(api_key.clone());
        }
        if let Some(base_url) = &self.base_url {
            config.api_base = base_url.clone();
        }
        if let Some(prompt) = &self.system_prompt {
            config.system_prompt = Some(prompt.clone()).filter(|p| !p.trim().is_empty());
        }
        if let Some(tokens) = self.max_context_tokens {
            config.max_context_tokens = Some(tokens);
        }
        if self.no_stream {
            config.stream = false;
        }
    }
}

fn with_sanitizer<P: LLMProvider + 'static>(provider: P, sanitize: bool) -> Arc<dyn LLMProvider> {
    if sanitize {
        Arc::new(SanitizingProviderDecorator::with_default_patterns(provider))
    } else {
        Arc::new(provider)
    }
}

fn build_provider(kind: ProviderKind, config: &ChatConfig) -> Arc<dyn LLMProvider> {
    match kind {
        ProviderKind::Echo => with_sanitizer(EchoProvider::new(), config.sanitize_prompts),
        ProviderKind::Openai => {
            if config.api_key.is_none() {
                tracing::warn!("No API key configured; requests will fail until one is set");
            }
            let provider = OpenAIProvider::new(config.api_key.clone().unwrap_or_default())
                .with_base_url(config.api_base.clone())
                .with_model(config.model.clone())
                .with_stream(config.stream);
            with_sanitizer(provider, config.sanitize_prompts)
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&logging::default_level(cli.debug, cli.log_level.as_deref()));

    let mut config = ChatConfig::new();
    cli.apply_to(&mut config);

    let budget = config.token_budget();
    if budget.available_input_tokens() == 0 {
        anyhow::bail!(
            "Context window of {} tokens leaves no room for input after reserving {} output and {} margin tokens",
            budget.max_context_tokens,
            budget.max_output_tokens,
            budget.safety_margin
        );
    }

    tracing::info!(
        "Starting chat with model {} via {:?} (input budget {} tokens)",
        config.model,
        cli.provider,
        budget.available_input_tokens()
    );
    if cli.debug {
        eprintln!(
            "{}",
            format!("[DEBUG] API base: {}", config.api_base).dimmed()
        );
    }

    let llm = build_provider(cli.provider, &config);
    let mut loop_config = ChatLoopConfig::from(&config);
    if cli.provider == ProviderKind::Echo {
        loop_config.model_name = None;
    }
    let session = ChatSession::from_config(&config);

    repl::Repl::new(session, llm, loop_config).run().await
}
