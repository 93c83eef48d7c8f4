//! LLM tool-calling client abstraction.
//!
//! One trait, one production implementation ([`openai::OpenAiClient`]).
//! Tests script the trait directly.

pub mod openai;

use async_trait::async_trait;

use crate::error::LlmError;
use crate::message::{ChatMessage, LlmToolResponse};
use crate::tool::ToolDefinition;

/// Per-call overrides for sampling parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompletionOptions {
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
}

/// A chat model that can emit zero or more tool calls per turn.
#[async_trait]
pub trait ToolCallingClient: Send + Sync {
    /// One turn: the full ordered history plus the declared tools in,
    /// an ordered list of tool calls and/or text out.
    async fn complete_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        options: CompletionOptions,
    ) -> Result<LlmToolResponse, LlmError>;
}
