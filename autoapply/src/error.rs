//! Error types for the autoapply library.
//!
//! Each subsystem has its own error enum so callers can match on the
//! failure class that matters at their boundary. The orchestrator is the
//! single place where agent-side errors are converted into terminal
//! application records; everything below it just propagates.

use thiserror::Error;

/// Infrastructure-level browser failure (driver gone, page dead).
///
/// Recoverable misses (element not found, selector ambiguous) are *not*
/// errors: the tool executor reports them to the model as benign result
/// strings instead.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// The underlying driver rejected or failed an operation.
    #[error("browser driver error: {0}")]
    Driver(String),

    /// An operation was issued before the browser was launched.
    #[error("browser not launched")]
    NotLaunched,
}

/// Failure while talking to the human channel.
#[derive(Debug, Error)]
pub enum InteractionError {
    /// The reply channel closed while a question was pending.
    #[error("user reply channel closed")]
    ChannelClosed,

    /// The chat transport failed to deliver a message.
    #[error("chat transport error: {0}")]
    Transport(String),
}

/// Infrastructure failure during tool execution.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The browser died underneath a tool.
    #[error(transparent)]
    Browser(#[from] BrowserError),

    /// The human channel died underneath `ask_user` / `report_status`.
    #[error(transparent)]
    Interaction(#[from] InteractionError),
}

/// Failure while talking to the LLM endpoint.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Network-level failure (timeout, DNS, connection).
    #[error("llm http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response from the API.
    #[error("llm api error ({status}): {body}")]
    Api {
        /// HTTP status code returned by the endpoint.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },

    /// The response violated the wire contract (no choices, malformed
    /// tool-call arguments). Terminates the run as failed.
    #[error("llm protocol error: {0}")]
    Protocol(String),
}

/// Any error that can abort an agent run.
///
/// The agent loop catches nothing: these bubble up to the orchestrator,
/// which maps them onto a `failed` record.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The LLM round-trip failed.
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// A tool hit an infrastructure failure.
    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Persistence failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// `add` was called with an id that already exists.
    #[error("duplicate record id: {0}")]
    DuplicateId(String),

    /// A persisted timestamp could not be parsed.
    #[error("invalid stored timestamp: {0}")]
    Timestamp(String),
}

/// Debug artifact store failure.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Filesystem failure while writing an artifact.
    #[error("artifact io error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata could not be serialized.
    #[error("artifact serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration read failure.
///
/// Validation problems are reported as aggregated string lists by the
/// validator, not as errors; this type covers reads that cannot proceed
/// at all.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required file is missing or unreadable.
    #[error("cannot read {path}: {source}")]
    Io {
        /// Path of the offending file.
        path: String,
        /// Underlying io error.
        #[source]
        source: std::io::Error,
    },

    /// A config file is not valid JSON.
    #[error("cannot parse {path}: {source}")]
    Json {
        /// Path of the offending file.
        path: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// A required key is absent.
    #[error("{file} missing key: {key}")]
    MissingKey {
        /// File the key was expected in.
        file: String,
        /// The absent key.
        key: String,
    },
}
