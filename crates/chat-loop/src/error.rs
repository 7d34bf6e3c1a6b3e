use chat_llm::LLMError;
use chat_state::{BudgetError, ValidationError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Budget error: {0}")]
    Budget(#[from] BudgetError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] LLMError),
}

pub type Result<T> = std::result::Result<T, ChatError>;
