//! Conversation log types for agent–model communication.
//!
//! The message history of a run is an append-only vector of
//! [`ChatMessage`]s following chat-completions conventions. Serialization
//! matches the wire format directly, so the history can be posted to the
//! API without a second mapping layer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System message carrying the policy contract.
    System,
    /// Human-side message (task prompt).
    User,
    /// Model output, possibly carrying tool calls.
    Assistant,
    /// Result of a tool execution, keyed by `tool_call_id`.
    Tool,
}

impl MessageRole {
    /// Wire string for the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// An assistant tool-call record as it appears in the message history.
///
/// `arguments` is the JSON-encoded string form, matching the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Stable call id (`call_{step}_{name}` for synthetic records).
    pub id: String,
    /// Always `"function"`.
    #[serde(rename = "type")]
    pub call_type: String,
    /// The function invocation.
    pub function: FunctionCall,
}

/// Function name + JSON-string arguments inside a tool-call record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Tool name.
    pub name: String,
    /// Arguments, JSON-encoded.
    pub arguments: String,
}

impl ToolCallRecord {
    /// Build a record with the given id for a parsed tool call.
    #[must_use]
    pub fn new(id: impl Into<String>, call: &ToolCall) -> Self {
        Self {
            id: id.into(),
            call_type: "function".to_owned(),
            function: FunctionCall {
                name: call.name.clone(),
                arguments: serde_json::to_string(&call.arguments).unwrap_or_else(|_| "{}".into()),
            },
        }
    }
}

/// A chat message in a run's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the sender.
    pub role: MessageRole,
    /// Text content. `None` for pure tool-call records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool calls (assistant messages only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRecord>>,
    /// Tool call id this message answers (tool messages only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// A system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// A user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// An assistant text message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// An assistant message carrying tool calls and no text.
    #[must_use]
    pub const fn assistant_tool_calls(calls: Vec<ToolCallRecord>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: None,
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    /// A tool-result message answering `tool_call_id`.
    #[must_use]
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// One structured action the model instructs the system to perform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of a declared tool.
    pub name: String,
    /// Parsed argument map.
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// A call with no arguments.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Map::new(),
        }
    }

    /// A call with the given argument map.
    #[must_use]
    pub fn with_args(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// String argument by key.
    #[must_use]
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }

    /// Integer argument by key, tolerating a numeric string.
    #[must_use]
    pub fn int_arg(&self, key: &str) -> Option<i64> {
        match self.arguments.get(key) {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        }
    }
}

/// What the model produced for one turn: tool calls, text, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmToolResponse {
    /// Tool calls, in the order the model emitted them.
    pub tool_calls: Vec<ToolCall>,
    /// Text content, when any.
    pub text: Option<String>,
    /// Finish reason reported by the API.
    pub finish_reason: Option<String>,
}

impl LlmToolResponse {
    /// A text-only response.
    #[must_use]
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            tool_calls: Vec::new(),
            text: Some(text.into()),
            finish_reason: None,
        }
    }

    /// A response made of the given tool calls.
    #[must_use]
    pub fn calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            text: None,
            finish_reason: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_to_wire_strings() {
        for (role, expected) in [
            (MessageRole::System, "\"system\""),
            (MessageRole::User, "\"user\""),
            (MessageRole::Assistant, "\"assistant\""),
            (MessageRole::Tool, "\"tool\""),
        ] {
            assert_eq!(serde_json::to_string(&role).unwrap(), expected);
        }
    }

    #[test]
    fn tool_result_carries_call_id() {
        let msg = ChatMessage::tool_result("call_0_goto", "Navigated to x");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_0_goto");
        assert_eq!(json["content"], "Navigated to x");
    }

    #[test]
    fn assistant_tool_calls_omit_content() {
        let call = ToolCall::with_args("goto", {
            let mut m = Map::new();
            m.insert("url".into(), Value::String("https://x.test".into()));
            m
        });
        let msg = ChatMessage::assistant_tool_calls(vec![ToolCallRecord::new("call_0_goto", &call)]);
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("content").is_none());
        assert_eq!(json["tool_calls"][0]["type"], "function");
        assert_eq!(json["tool_calls"][0]["function"]["name"], "goto");
        // Arguments are the JSON-encoded string form on the wire.
        assert_eq!(
            json["tool_calls"][0]["function"]["arguments"],
            "{\"url\":\"https://x.test\"}"
        );
    }

    #[test]
    fn int_arg_tolerates_numeric_strings() {
        let mut args = Map::new();
        args.insert("seconds".into(), Value::String("5".into()));
        let call = ToolCall::with_args("wait", args);
        assert_eq!(call.int_arg("seconds"), Some(5));

        let mut args = Map::new();
        args.insert("seconds".into(), Value::from(3));
        let call = ToolCall::with_args("wait", args);
        assert_eq!(call.int_arg("seconds"), Some(3));
    }
}
