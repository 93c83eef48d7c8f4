//! The LLM-driven browser agent.
//!
//! [`BrowserAgent`] runs one task to completion: it seeds a conversation
//! with the policy prompt, then alternates model turns with tool
//! executions until the model calls `done`, the step budget runs out, or
//! an infrastructure error aborts the run.

mod prompts;
mod runner;
mod task;

pub use prompts::{build_apply_task_prompt, SYSTEM_PROMPT};
pub use runner::BrowserAgent;
pub use task::{AgentOutcome, AgentResult, AgentStep, AgentTask};

use async_trait::async_trait;

use crate::error::AgentError;

/// Anything that can run an [`AgentTask`] to a single [`AgentResult`].
///
/// The orchestrator depends on this seam so tests can script outcomes
/// without a model or a browser.
#[async_trait]
pub trait TaskAgent: Send + Sync {
    /// Run the task to completion.
    async fn execute_task(&self, task: &AgentTask) -> Result<AgentResult, AgentError>;
}

#[async_trait]
impl TaskAgent for BrowserAgent {
    async fn execute_task(&self, task: &AgentTask) -> Result<AgentResult, AgentError> {
        Self::execute_task(self, task).await
    }
}
