//! Convenience re-exports for downstream crates.

pub use crate::agent::{
    AgentOutcome, AgentResult, AgentStep, AgentTask, BrowserAgent, TaskAgent,
};
pub use crate::artifacts::DebugArtifactStore;
pub use crate::browser::cdp::{CdpBrowser, CdpPage};
pub use crate::browser::{BrowserPage, Locator};
pub use crate::config::{ConnectivityReport, FsConfigProvider};
pub use crate::error::{
    AgentError, ArtifactError, BrowserError, ConfigError, InteractionError, LlmError, StoreError,
    ToolError,
};
pub use crate::interaction::{ChoiceReply, FreeTextReply, UserInteraction};
pub use crate::llm::openai::OpenAiClient;
pub use crate::llm::{CompletionOptions, ToolCallingClient};
pub use crate::message::{ChatMessage, LlmToolResponse, MessageRole, ToolCall};
pub use crate::model::{
    AccountCredential, AppConfig, JobApplicationRecord, JobApplicationStatus, JobPostingRef,
    ResumeData, RunContext, UserProfile,
};
pub use crate::orchestrator::ApplicationOrchestrator;
pub use crate::runtime::{
    Clock, FixedClock, IdGenerator, SequentialIdGenerator, SystemClock, UuidIdGenerator,
};
pub use crate::store::memory::{InMemoryCredentialStore, InMemoryJobApplicationStore};
pub use crate::store::sqlite::{SqliteCredentialStore, SqliteJobApplicationStore};
pub use crate::store::{CredentialStore, JobApplicationStore};
pub use crate::tool::browser::BrowserToolExecutor;
pub use crate::tool::{AgentTools, ParamSpec, ToolDefinition};
