//! Shared helpers for provider implementations.

pub mod openai_compat;
pub mod sanitizing_decorator;
pub mod sse;

pub use sanitizing_decorator::SanitizingProviderDecorator;
