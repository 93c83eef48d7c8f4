//! The agent loop.
//!
//! One `execute_task` call drives one conversation:
//!
//! 1. Seed the history with the policy prompt and the task prompt.
//! 2. Ask the model for the next action(s) given the declared tools.
//! 3. Execute tool calls in emission order, feeding results back.
//! 4. Stop on `done`, on step-budget exhaustion, or on the first
//!    infrastructure error.
//!
//! The loop catches nothing except `done`: protocol and infrastructure
//! errors bubble to the orchestrator, the single place that converts
//! them into terminal records.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::prompts::{build_apply_task_prompt, SYSTEM_PROMPT};
use super::task::{AgentOutcome, AgentResult, AgentStep, AgentTask};
use crate::error::AgentError;
use crate::llm::{CompletionOptions, ToolCallingClient};
use crate::message::{ChatMessage, ToolCallRecord};
use crate::tool::{AgentTools, DONE_TOOL};

/// Single-conversation controller for one browser task.
pub struct BrowserAgent {
    llm: Arc<dyn ToolCallingClient>,
    tools: Arc<dyn AgentTools>,
    options: CompletionOptions,
}

impl std::fmt::Debug for BrowserAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserAgent")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl BrowserAgent {
    /// Build an agent over the given model and tool suite.
    #[must_use]
    pub fn new(llm: Arc<dyn ToolCallingClient>, tools: Arc<dyn AgentTools>) -> Self {
        Self {
            llm,
            tools,
            options: CompletionOptions::default(),
        }
    }

    /// Override sampling options for every turn of this agent.
    #[must_use]
    pub const fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the task to completion. Produces exactly one result.
    pub async fn execute_task(&self, task: &AgentTask) -> Result<AgentResult, AgentError> {
        let mut messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_initial_message(task)),
        ];
        let mut steps: Vec<AgentStep> = Vec::new();
        let tool_defs = self.tools.definitions();

        for turn in 0..task.max_steps {
            let response = self
                .llm
                .complete_with_tools(&messages, &tool_defs, self.options)
                .await?;

            if response.tool_calls.is_empty() {
                if let Some(text) = response.text {
                    messages.push(ChatMessage::assistant(text));
                }
                continue;
            }

            for call in &response.tool_calls {
                if call.name == DONE_TOOL {
                    let status = AgentOutcome::from_done_status(call.str_arg("status"));
                    let reason = call.str_arg("reason").map(str::to_owned);
                    info!(
                        status = status.as_str(),
                        reason = reason.as_deref().unwrap_or(""),
                        steps = steps.len(),
                        "Agent run completed"
                    );
                    return Ok(AgentResult {
                        status,
                        reason,
                        data: call.arguments.clone(),
                        steps_taken: steps,
                    });
                }

                let result = self.tools.execute(call).await?;
                debug!(
                    step = steps.len(),
                    tool = %call.name,
                    result_preview = preview(&result),
                    "Agent step"
                );

                let screenshot = if task.debug {
                    self.tools.capture_screenshot().await
                } else {
                    None
                };

                steps.push(AgentStep {
                    step: steps.len(),
                    tool_name: call.name.clone(),
                    arguments: call.arguments.clone(),
                    result: result.clone(),
                    screenshot,
                });

                let call_id = format!("call_{turn}_{}", call.name);
                messages.push(ChatMessage::assistant_tool_calls(vec![
                    ToolCallRecord::new(&call_id, call),
                ]));
                messages.push(ChatMessage::tool_result(call_id, result));
            }
        }

        warn!(max_steps = task.max_steps, "Agent exceeded maximum steps");
        Ok(AgentResult {
            status: AgentOutcome::Failed,
            reason: Some(format!(
                "Agent exceeded maximum steps ({})",
                task.max_steps
            )),
            data: serde_json::Map::new(),
            steps_taken: steps,
        })
    }
}

/// First 120 characters of a tool result, for log lines.
fn preview(result: &str) -> &str {
    let mut cut = result.len().min(120);
    while cut > 0 && !result.is_char_boundary(cut) {
        cut -= 1;
    }
    &result[..cut]
}

/// Derive the first user message from the task.
///
/// A task carrying a `profile` context object gets the full structured
/// apply prompt; anything else falls back to the bare objective.
fn build_initial_message(task: &AgentTask) -> String {
    let Some(Value::Object(profile)) = task.context.get("profile") else {
        return task.objective.clone();
    };
    let ctx_str = |key: &str| {
        task.context
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
    };
    let ctx_bool = |key: &str| {
        task.context
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    };
    let job_url = task
        .context
        .get("job_url")
        .and_then(Value::as_str)
        .unwrap_or(&task.objective);
    build_apply_task_prompt(
        job_url,
        task.context
            .get("company")
            .and_then(Value::as_str)
            .unwrap_or("Unknown"),
        ctx_str("job_title"),
        profile,
        ctx_bool("resume_available"),
        ctx_bool("cover_letter_available"),
        task.context
            .get("generated_password")
            .and_then(Value::as_str),
        task.debug,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use crate::llm::CompletionOptions;
    use crate::message::{LlmToolResponse, MessageRole, ToolCall};
    use crate::tool::{definitions, ToolDefinition};
    use async_trait::async_trait;
    use serde_json::{json, Map};
    use std::sync::Mutex;

    /// Returns pre-programmed responses one turn at a time; emits a
    /// failing `done` when the script runs dry.
    struct ScriptedLlm {
        script: Mutex<Vec<LlmToolResponse>>,
        seen_histories: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<LlmToolResponse>) -> Self {
            let mut script = responses;
            script.reverse();
            Self {
                script: Mutex::new(script),
                seen_histories: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ToolCallingClient for ScriptedLlm {
        async fn complete_with_tools(
            &self,
            messages: &[ChatMessage],
            _tools: &[ToolDefinition],
            _options: CompletionOptions,
        ) -> Result<LlmToolResponse, crate::error::LlmError> {
            self.seen_histories.lock().unwrap().push(messages.to_vec());
            Ok(self.script.lock().unwrap().pop().unwrap_or_else(|| {
                LlmToolResponse::calls(vec![done_call("failed", "Script exhausted")])
            }))
        }
    }

    /// Records executions, answers with `ok:<tool>`.
    #[derive(Default)]
    struct RecordingTools {
        executed: Mutex<Vec<ToolCall>>,
    }

    #[async_trait]
    impl AgentTools for RecordingTools {
        fn definitions(&self) -> Vec<ToolDefinition> {
            definitions()
        }

        async fn execute(&self, call: &ToolCall) -> Result<String, ToolError> {
            self.executed.lock().unwrap().push(call.clone());
            Ok(format!("ok:{}", call.name))
        }

        async fn capture_screenshot(&self) -> Option<Vec<u8>> {
            Some(vec![1, 2, 3])
        }
    }

    fn tool_call(name: &str, args: &[(&str, Value)]) -> ToolCall {
        let mut map = Map::new();
        for (k, v) in args {
            map.insert((*k).into(), v.clone());
        }
        ToolCall::with_args(name, map)
    }

    fn done_call(status: &str, reason: &str) -> ToolCall {
        tool_call(
            "done",
            &[("status", json!(status)), ("reason", json!(reason))],
        )
    }

    fn agent(script: Vec<LlmToolResponse>) -> (BrowserAgent, Arc<RecordingTools>) {
        let tools = Arc::new(RecordingTools::default());
        let agent = BrowserAgent::new(Arc::new(ScriptedLlm::new(script)), tools.clone());
        (agent, tools)
    }

    #[tokio::test]
    async fn done_returns_result_without_executing_it() {
        let (agent, tools) = agent(vec![
            LlmToolResponse::calls(vec![tool_call("goto", &[("url", json!("https://x.test"))])]),
            LlmToolResponse::calls(vec![done_call("success", "Applied")]),
        ]);
        let result = agent.execute_task(&AgentTask::new("Apply")).await.unwrap();
        assert_eq!(result.status, AgentOutcome::Success);
        assert_eq!(result.reason.as_deref(), Some("Applied"));
        let executed = tools.executed.lock().unwrap();
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].name, "goto");
    }

    #[tokio::test]
    async fn steps_are_numbered_without_gaps() {
        let (agent, _) = agent(vec![
            LlmToolResponse::calls(vec![
                tool_call("goto", &[("url", json!("https://x.test"))]),
                tool_call("page_snapshot", &[]),
            ]),
            LlmToolResponse::calls(vec![tool_call("click", &[("target", json!("Apply"))])]),
            LlmToolResponse::calls(vec![done_call("success", "")]),
        ]);
        let result = agent.execute_task(&AgentTask::new("Apply")).await.unwrap();
        let numbers: Vec<usize> = result.steps_taken.iter().map(|s| s.step).collect();
        assert_eq!(numbers, vec![0, 1, 2]);
        assert_eq!(result.steps_taken[0].result, "ok:goto");
    }

    #[tokio::test]
    async fn history_gets_synthetic_call_and_result_records() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            LlmToolResponse::calls(vec![tool_call("goto", &[("url", json!("https://x.test"))])]),
            LlmToolResponse::calls(vec![done_call("success", "")]),
        ]));
        let agent = BrowserAgent::new(llm.clone(), Arc::new(RecordingTools::default()));
        agent.execute_task(&AgentTask::new("Apply")).await.unwrap();

        let histories = llm.seen_histories.lock().unwrap();
        // Second turn sees: system, user, assistant tool-call, tool result.
        let second = &histories[1];
        assert_eq!(second.len(), 4);
        assert_eq!(second[2].role, MessageRole::Assistant);
        let record = &second[2].tool_calls.as_ref().unwrap()[0];
        assert_eq!(record.id, "call_0_goto");
        assert_eq!(second[3].role, MessageRole::Tool);
        assert_eq!(second[3].tool_call_id.as_deref(), Some("call_0_goto"));
        assert_eq!(second[3].content.as_deref(), Some("ok:goto"));
    }

    #[tokio::test]
    async fn text_only_turns_are_appended_and_skipped() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            LlmToolResponse::text_only("Thinking..."),
            LlmToolResponse::calls(vec![done_call("success", "")]),
        ]));
        let agent = BrowserAgent::new(llm.clone(), Arc::new(RecordingTools::default()));
        let result = agent.execute_task(&AgentTask::new("Apply")).await.unwrap();
        assert_eq!(result.status, AgentOutcome::Success);
        let histories = llm.seen_histories.lock().unwrap();
        assert_eq!(histories[1][2].content.as_deref(), Some("Thinking..."));
    }

    #[tokio::test]
    async fn step_budget_exhaustion_fails() {
        let script = (0..10)
            .map(|_| {
                LlmToolResponse::calls(vec![tool_call("goto", &[("url", json!("https://x"))])])
            })
            .collect();
        let (agent, tools) = agent(script);
        let task = AgentTask::new("Loop").with_max_steps(3);
        let result = agent.execute_task(&task).await.unwrap();
        assert_eq!(result.status, AgentOutcome::Failed);
        assert!(result
            .reason
            .as_deref()
            .unwrap()
            .contains("maximum steps (3)"));
        assert_eq!(tools.executed.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn skipped_status_is_preserved() {
        let (agent, _) = agent(vec![LlmToolResponse::calls(vec![done_call(
            "skipped",
            "Debug mode: final submit skipped",
        )])]);
        let result = agent
            .execute_task(&AgentTask::new("Debug").with_debug(true))
            .await
            .unwrap();
        assert_eq!(result.status, AgentOutcome::Skipped);
        assert!(result.reason.as_deref().unwrap().contains("Debug mode"));
    }

    #[tokio::test]
    async fn done_data_is_surfaced() {
        let (agent, _) = agent(vec![LlmToolResponse::calls(vec![tool_call(
            "done",
            &[
                ("status", json!("success")),
                ("account_email", json!("ada@x.test")),
                ("account_password", json!("pw-1")),
            ],
        )])]);
        let result = agent.execute_task(&AgentTask::new("Apply")).await.unwrap();
        assert_eq!(
            result.data.get("account_email"),
            Some(&json!("ada@x.test"))
        );
    }

    #[tokio::test]
    async fn debug_runs_capture_step_screenshots() {
        let (agent, _) = agent(vec![
            LlmToolResponse::calls(vec![tool_call("page_snapshot", &[])]),
            LlmToolResponse::calls(vec![done_call("skipped", "Debug mode: final submit skipped")]),
        ]);
        let result = agent
            .execute_task(&AgentTask::new("Debug").with_debug(true))
            .await
            .unwrap();
        assert_eq!(result.steps_taken[0].screenshot.as_deref(), Some(&[1, 2, 3][..]));
    }

    #[tokio::test]
    async fn non_debug_runs_do_not_capture_screenshots() {
        let (agent, _) = agent(vec![
            LlmToolResponse::calls(vec![tool_call("page_snapshot", &[])]),
            LlmToolResponse::calls(vec![done_call("success", "")]),
        ]);
        let result = agent.execute_task(&AgentTask::new("Apply")).await.unwrap();
        assert!(result.steps_taken[0].screenshot.is_none());
    }

    #[tokio::test]
    async fn structured_context_builds_the_apply_prompt() {
        let llm = Arc::new(ScriptedLlm::new(vec![LlmToolResponse::calls(vec![
            done_call("success", ""),
        ])]));
        let agent = BrowserAgent::new(llm.clone(), Arc::new(RecordingTools::default()));
        let task = AgentTask::new("Apply")
            .with_context("profile", json!({"full_name": "Jane", "email": "jane@t.test"}))
            .with_context("job_url", json!("https://example.com/jobs/1"))
            .with_context("company", json!("Example"))
            .with_context("job_title", json!("SWE"))
            .with_context("resume_available", json!(true));
        agent.execute_task(&task).await.unwrap();

        let histories = llm.seen_histories.lock().unwrap();
        let first_user = histories[0][1].content.as_ref().unwrap();
        assert!(first_user.contains("https://example.com/jobs/1"));
        assert!(first_user.contains("Jane"));
        assert!(first_user.contains("resume:       yes"));
    }
}
