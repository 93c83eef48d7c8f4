//! Bot-side error type.

use thiserror::Error;

/// A type alias for `Result<T, BotError>`.
pub type Result<T> = std::result::Result<T, BotError>;

/// Errors surfaced by the bot binary.
#[derive(Debug, Error)]
pub enum BotError {
    /// Configuration could not be read.
    #[error(transparent)]
    Config(#[from] autoapply::error::ConfigError),

    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] autoapply::error::StoreError),

    /// LLM client construction failed.
    #[error(transparent)]
    Llm(#[from] autoapply::error::LlmError),

    /// Browser launch or navigation failed outside a run.
    #[error(transparent)]
    Browser(#[from] autoapply::error::BrowserError),

    /// HTTP failure talking to the chat platform.
    #[error("telegram http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The chat platform rejected a request.
    #[error("telegram api error: {0}")]
    Api(String),

    /// Syntactic configuration validation failed.
    #[error("configuration invalid:\n{}", .0.join("\n"))]
    Validation(Vec<String>),
}
