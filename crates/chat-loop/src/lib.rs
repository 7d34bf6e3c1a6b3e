pub mod config;
pub mod error;
pub mod events;
pub mod runner;
pub mod session;
pub mod stream;

pub use config::ChatLoopConfig;
pub use error::{ChatError, Result};
pub use events::{ChatEvent, ContextUsage, TokenUsage};
pub use runner::run_round_trip;
pub use session::{ChatSession, UserInput};
