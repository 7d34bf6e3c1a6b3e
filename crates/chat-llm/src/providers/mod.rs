pub mod common;
pub mod echo;
pub mod openai;

pub use common::SanitizingProviderDecorator;
pub use echo::EchoProvider;
pub use openai::OpenAIProvider;
