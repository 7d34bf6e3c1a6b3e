pub mod provider;
pub mod providers;
pub mod sanitizer;
pub mod types;

pub use provider::{LLMError, LLMProvider, LLMStream, Result};
pub use providers::{EchoProvider, OpenAIProvider, SanitizingProviderDecorator};
pub use sanitizer::PromptSanitizer;
pub use types::LLMChunk;
