use thiserror::Error;

use crate::llm::CompletionError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Completion(#[from] CompletionError),
}

pub type Result<T> = std::result::Result<T, Error>;
