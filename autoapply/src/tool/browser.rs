//! Executes agent tool calls against a live page and a human channel.
//!
//! Matching failures come back as benign strings so the model can observe
//! and retry; only infrastructure failures (driver or chat transport
//! gone) propagate as errors and abort the run.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::{definitions, AgentTools, ToolDefinition};
use crate::browser::{BrowserPage, Locator};
use crate::error::ToolError;
use crate::interaction::UserInteraction;
use crate::message::ToolCall;

/// Accessibility snapshots are truncated to this many characters.
const SNAPSHOT_LIMIT: usize = 8_000;
/// Body-text fallback truncation.
const BODY_TEXT_LIMIT: usize = 4_000;
/// Viewport scroll step in pixels.
const SCROLL_STEP: i64 = 600;

/// Translates tool calls into [`BrowserPage`] operations.
pub struct BrowserToolExecutor {
    page: Arc<dyn BrowserPage>,
    ui: Arc<dyn UserInteraction>,
    resume_path: PathBuf,
    cover_letter_path: PathBuf,
}

impl std::fmt::Debug for BrowserToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserToolExecutor")
            .field("resume_path", &self.resume_path)
            .field("cover_letter_path", &self.cover_letter_path)
            .finish_non_exhaustive()
    }
}

impl BrowserToolExecutor {
    /// Build an executor over the given page and human channel.
    ///
    /// Empty document paths mean "not configured"; the corresponding
    /// upload requests are answered with a benign message.
    #[must_use]
    pub fn new(
        page: Arc<dyn BrowserPage>,
        ui: Arc<dyn UserInteraction>,
        resume_path: impl Into<PathBuf>,
        cover_letter_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            page,
            ui,
            resume_path: resume_path.into(),
            cover_letter_path: cover_letter_path.into(),
        }
    }

    async fn page_snapshot(&self) -> Result<String, ToolError> {
        if let Some(tree) = self.page.accessibility_snapshot().await? {
            return Ok(truncate(tree, SNAPSHOT_LIMIT));
        }
        let body = self.page.body_text().await?;
        Ok(truncate(body, BODY_TEXT_LIMIT))
    }

    async fn screenshot(&self) -> Result<String, ToolError> {
        let bytes = self.page.screenshot().await?;
        Ok(BASE64.encode(bytes))
    }

    async fn goto(&self, call: &ToolCall) -> Result<String, ToolError> {
        let url = call.str_arg("url").unwrap_or_default();
        self.page.goto(url).await?;
        Ok(format!("Navigated to {url}"))
    }

    async fn click(&self, call: &ToolCall) -> Result<String, ToolError> {
        let target = call.str_arg("target").unwrap_or_default();
        let chain = [
            Locator::ButtonRole(target.to_owned()),
            Locator::LinkRole(target.to_owned()),
            Locator::VisibleText(target.to_owned()),
            Locator::Css(target.to_owned()),
        ];
        for locator in &chain {
            if self.page.click_first(locator).await? {
                return Ok(format!("Clicked: {target}"));
            }
        }
        Ok(format!("Element not found: {target}"))
    }

    async fn fill(&self, call: &ToolCall) -> Result<String, ToolError> {
        let field = call.str_arg("field").unwrap_or_default();
        let value = call.str_arg("value").unwrap_or_default();
        for locator in field_chain(field) {
            if self.page.fill_first(&locator, value).await? {
                return Ok(format!("Filled {field}"));
            }
        }
        Ok(format!("Field not found: {field}"))
    }

    async fn select_option(&self, call: &ToolCall) -> Result<String, ToolError> {
        let field = call.str_arg("field").unwrap_or_default();
        let value = call.str_arg("value").unwrap_or_default();
        let chain = [
            Locator::Label(field.to_owned()),
            Locator::NameAttr(field.to_owned()),
            Locator::Css(field.to_owned()),
        ];
        for locator in &chain {
            if self.page.select_first(locator, value).await? {
                return Ok(format!("Selected {value} in {field}"));
            }
        }
        Ok(format!("Dropdown not found: {field}"))
    }

    async fn upload_file(&self, call: &ToolCall) -> Result<String, ToolError> {
        let field = call.str_arg("field").unwrap_or_default();
        let file_type = call.str_arg("file_type").unwrap_or("resume");
        let path = if file_type == "resume" {
            &self.resume_path
        } else {
            &self.cover_letter_path
        };
        if path.as_os_str().is_empty() {
            return Ok(format!("No {file_type} file configured"));
        }
        let chain = [
            Locator::Label(field.to_owned()),
            Locator::NameAttr(field.to_owned()),
            Locator::Css(field.to_owned()),
        ];
        for locator in &chain {
            if self.page.set_files_first(locator, path).await? {
                return Ok(format!("Uploaded {file_type} to {field}"));
            }
        }
        Ok(format!("File input not found: {field}"))
    }

    async fn scroll(&self, call: &ToolCall) -> Result<String, ToolError> {
        let direction = call.str_arg("direction").unwrap_or("down");
        let dy = if direction == "up" {
            -SCROLL_STEP
        } else {
            SCROLL_STEP
        };
        self.page.scroll_by(dy).await?;
        Ok(format!("Scrolled {direction}"))
    }

    async fn wait(&self, call: &ToolCall) -> Result<String, ToolError> {
        let seconds = call.int_arg("seconds").unwrap_or(2).max(0) as u64;
        // A timed-out idle wait falls back to a plain sleep; a driver
        // failure is not a timeout and propagates like any other tool.
        let idle = self
            .page
            .wait_network_idle(Duration::from_secs(seconds))
            .await?;
        if !idle {
            tokio::time::sleep(Duration::from_secs(seconds)).await;
        }
        Ok(format!("Waited {seconds}s"))
    }

    async fn ask_user(&self, call: &ToolCall) -> Result<String, ToolError> {
        let question = call.str_arg("question").unwrap_or_default();
        let reply = self.ui.ask_free_text("agent_question", question).await?;
        Ok(reply.text)
    }

    async fn report_status(&self, call: &ToolCall) -> Result<String, ToolError> {
        let message = call.str_arg("message").unwrap_or_default();
        self.ui.send_info(message).await?;
        Ok("Status sent".to_owned())
    }
}

/// Fill/upload locator priority: label, placeholder, name, id, CSS.
fn field_chain(field: &str) -> Vec<Locator> {
    vec![
        Locator::Label(field.to_owned()),
        Locator::Placeholder(field.to_owned()),
        Locator::NameAttr(field.to_owned()),
        Locator::Id(field.to_owned()),
        Locator::Css(field.to_owned()),
    ]
}

fn truncate(mut s: String, limit: usize) -> String {
    if s.len() > limit {
        let mut cut = limit;
        while cut > 0 && !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
    }
    s
}

#[async_trait]
impl AgentTools for BrowserToolExecutor {
    fn definitions(&self) -> Vec<ToolDefinition> {
        definitions()
    }

    async fn execute(&self, call: &ToolCall) -> Result<String, ToolError> {
        match call.name.as_str() {
            "page_snapshot" => self.page_snapshot().await,
            "screenshot" => self.screenshot().await,
            "goto" => self.goto(call).await,
            "click" => self.click(call).await,
            "fill" => self.fill(call).await,
            "select_option" => self.select_option(call).await,
            "upload_file" => self.upload_file(call).await,
            "scroll" => self.scroll(call).await,
            "get_current_url" => Ok(self.page.current_url().await?),
            "wait" => self.wait(call).await,
            "ask_user" => self.ask_user(call).await,
            "report_status" => self.report_status(call).await,
            // The loop intercepts `done`; answering it here keeps an
            // out-of-contract call benign instead of fatal.
            "done" => Ok(json!({"done": true}).to_string()),
            other => Ok(format!("Unknown tool: {other}")),
        }
    }

    async fn capture_screenshot(&self) -> Option<Vec<u8>> {
        match self.page.screenshot().await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(error = %e, "Debug screenshot capture failed");
                None
            }
        }
    }
}
