//! Task, step and result types for one agent run.

use serde_json::{Map, Value};

/// Default step budget per run.
pub const DEFAULT_MAX_STEPS: usize = 50;

/// Immutable description of what the agent should do.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentTask {
    /// One-line objective; used verbatim as the task prompt when no
    /// structured context is provided.
    pub objective: String,
    /// Schemaless context bag (job fields, profile, document flags).
    /// Converted to a typed prompt by the initial-prompt builder.
    pub context: Map<String, Value>,
    /// Maximum number of model turns before the run fails.
    pub max_steps: usize,
    /// Debug mode: the model must skip the final submit.
    pub debug: bool,
}

impl AgentTask {
    /// A task with the default step budget.
    #[must_use]
    pub fn new(objective: impl Into<String>) -> Self {
        Self {
            objective: objective.into(),
            context: Map::new(),
            max_steps: DEFAULT_MAX_STEPS,
            debug: false,
        }
    }

    /// Attach a context value.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Override the step budget.
    #[must_use]
    pub const fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Set debug mode.
    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// One executed tool call, appended to the run's step log.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentStep {
    /// Execution index: 0, 1, 2, … without gaps.
    pub step: usize,
    /// Name of the executed tool.
    pub tool_name: String,
    /// Arguments the model supplied.
    pub arguments: Map<String, Value>,
    /// Result string fed back to the model.
    pub result: String,
    /// Post-step screenshot, captured in debug runs.
    pub screenshot: Option<Vec<u8>>,
}

/// Outcome of a run, as reported by the model's `done` call.
///
/// Parsed leniently at the LLM boundary only: a missing status means
/// success, an unknown string means failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentOutcome {
    /// The application was submitted.
    Success,
    /// The attempt failed.
    Failed,
    /// The attempt stopped deliberately (e.g. debug mode).
    Skipped,
}

impl AgentOutcome {
    /// Parse the `done.status` argument.
    #[must_use]
    pub fn from_done_status(status: Option<&str>) -> Self {
        match status {
            None | Some("success") => Self::Success,
            Some("skipped") => Self::Skipped,
            _ => Self::Failed,
        }
    }

    /// String form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// What one agent run produced. Exactly one per invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentResult {
    /// Terminal status.
    pub status: AgentOutcome,
    /// Reason supplied by the model or the loop.
    pub reason: Option<String>,
    /// The full `done` argument map (may carry account credentials).
    pub data: Map<String, Value>,
    /// Ordered step log.
    pub steps_taken: Vec<AgentStep>,
}
