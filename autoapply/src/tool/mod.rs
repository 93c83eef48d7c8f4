//! Tool vocabulary for the browser agent.
//!
//! The set of tools is fixed at compile time: ten browser primitives, two
//! human-channel operations, and the terminal `done`. [`definitions`]
//! declares them; [`BrowserToolExecutor`](browser::BrowserToolExecutor)
//! executes them against a live page and a human channel.
//!
//! # Schema contract
//!
//! A parameter is *required* on the wire iff its [`ParamSpec`] carries no
//! default. The `default` marker itself never reaches the API; it only
//! drives the required list, matching the chat-completions function
//! format.

pub mod browser;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::error::ToolError;
use crate::message::ToolCall;

/// Name of the terminal tool, intercepted by the agent loop.
pub const DONE_TOOL: &str = "done";

/// Schema for one tool parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    /// JSON-schema type, e.g. `"string"` or `"integer"`.
    pub kind: &'static str,
    /// Human description shown to the model.
    pub description: &'static str,
    /// Allowed values, when the parameter is an enum.
    pub enum_values: Option<&'static [&'static str]>,
    /// Default value. Present ⇒ the parameter is optional.
    pub default: Option<Value>,
}

impl ParamSpec {
    /// A required string parameter.
    #[must_use]
    pub const fn string(description: &'static str) -> Self {
        Self {
            kind: "string",
            description,
            enum_values: None,
            default: None,
        }
    }

    /// A required string enum parameter.
    #[must_use]
    pub const fn string_enum(description: &'static str, values: &'static [&'static str]) -> Self {
        Self {
            kind: "string",
            description,
            enum_values: Some(values),
            default: None,
        }
    }

    /// Mark the parameter optional with the given default.
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Immutable declaration of one tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    /// Tool name, snake_case.
    pub name: &'static str,
    /// Human description shown to the model.
    pub description: &'static str,
    /// Ordered parameter map.
    pub parameters: Vec<(&'static str, ParamSpec)>,
}

impl ToolDefinition {
    /// Names of parameters that lack a default.
    #[must_use]
    pub fn required_params(&self) -> Vec<&'static str> {
        self.parameters
            .iter()
            .filter(|(_, spec)| spec.default.is_none())
            .map(|(name, _)| *name)
            .collect()
    }

    /// Translate to the chat-completions function-calling format.
    #[must_use]
    pub fn to_openai_format(&self) -> Value {
        let mut properties = Map::new();
        for (name, spec) in &self.parameters {
            let mut prop = Map::new();
            prop.insert("type".into(), Value::String(spec.kind.into()));
            prop.insert("description".into(), Value::String(spec.description.into()));
            if let Some(values) = spec.enum_values {
                prop.insert(
                    "enum".into(),
                    Value::Array(values.iter().map(|v| Value::String((*v).into())).collect()),
                );
            }
            properties.insert((*name).into(), Value::Object(prop));
        }
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "properties": properties,
                    "required": self.required_params(),
                },
            },
        })
    }
}

/// The full declared vocabulary, in stable order.
#[must_use]
pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "page_snapshot",
            description: "Return the accessibility tree of the current page as structured text.",
            parameters: vec![],
        },
        ToolDefinition {
            name: "screenshot",
            description: "Take a full-page screenshot and return it as base64-encoded PNG.",
            parameters: vec![],
        },
        ToolDefinition {
            name: "goto",
            description: "Navigate the browser to the given URL.",
            parameters: vec![("url", ParamSpec::string("The URL to navigate to."))],
        },
        ToolDefinition {
            name: "click",
            description: "Click an element identified by visible text, ARIA role label, or CSS selector.",
            parameters: vec![(
                "target",
                ParamSpec::string("Button text, link text, or CSS selector."),
            )],
        },
        ToolDefinition {
            name: "fill",
            description: "Fill a form field with the given value. Identifies the field by label, placeholder, name attribute, id, or CSS selector.",
            parameters: vec![
                (
                    "field",
                    ParamSpec::string("Field label, placeholder, name, id, or CSS selector."),
                ),
                ("value", ParamSpec::string("The value to type into the field.")),
            ],
        },
        ToolDefinition {
            name: "select_option",
            description: "Select a dropdown option by its visible text or value.",
            parameters: vec![
                ("field", ParamSpec::string("Dropdown label or selector.")),
                ("value", ParamSpec::string("Option text or value to select.")),
            ],
        },
        ToolDefinition {
            name: "upload_file",
            description: "Upload a document to a file input field.",
            parameters: vec![
                ("field", ParamSpec::string("File input label or selector.")),
                (
                    "file_type",
                    ParamSpec::string_enum(
                        "Which document to upload.",
                        &["resume", "cover_letter"],
                    ),
                ),
            ],
        },
        ToolDefinition {
            name: "scroll",
            description: "Scroll the page up or down.",
            parameters: vec![(
                "direction",
                ParamSpec::string_enum("Scroll direction.", &["up", "down"]),
            )],
        },
        ToolDefinition {
            name: "get_current_url",
            description: "Return the current page URL.",
            parameters: vec![],
        },
        ToolDefinition {
            name: "wait",
            description: "Wait for the page to finish loading or for a specified number of seconds.",
            parameters: vec![(
                "seconds",
                ParamSpec {
                    kind: "integer",
                    description: "Seconds to wait (default 2).",
                    enum_values: None,
                    default: None,
                }
                .with_default(json!(2)),
            )],
        },
        ToolDefinition {
            name: "ask_user",
            description: "Ask the human user a question via the chat and wait for their text reply.",
            parameters: vec![(
                "question",
                ParamSpec::string("The question to ask the user."),
            )],
        },
        ToolDefinition {
            name: "report_status",
            description: "Send an informational status message to the user (no reply expected).",
            parameters: vec![("message", ParamSpec::string("The status message."))],
        },
        ToolDefinition {
            name: DONE_TOOL,
            description: "Signal that the current task is complete.",
            parameters: vec![
                (
                    "status",
                    ParamSpec::string_enum("Outcome.", &["success", "failed", "skipped"]),
                ),
                (
                    "reason",
                    ParamSpec::string("Short explanation of the outcome."),
                ),
            ],
        },
    ]
}

/// Capability set the agent loop drives.
///
/// `execute` returns the string fed verbatim back to the model. Misses
/// are benign strings; only infrastructure failures are errors.
#[async_trait]
pub trait AgentTools: Send + Sync {
    /// The declared tool vocabulary.
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Execute one tool call.
    async fn execute(&self, call: &ToolCall) -> Result<String, ToolError>;

    /// Best-effort screenshot for debug artifacts. `None` when the
    /// capability is unavailable.
    async fn capture_screenshot(&self) -> Option<Vec<u8>> {
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn registry_declares_all_thirteen_tools() {
        let names: Vec<&str> = definitions().iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            [
                "page_snapshot",
                "screenshot",
                "goto",
                "click",
                "fill",
                "select_option",
                "upload_file",
                "scroll",
                "get_current_url",
                "wait",
                "ask_user",
                "report_status",
                "done",
            ]
        );
    }

    #[test]
    fn params_without_default_are_required() {
        for def in definitions() {
            let wire = def.to_openai_format();
            let required: Vec<String> = wire["function"]["parameters"]["required"]
                .as_array()
                .unwrap()
                .iter()
                .map(|v| v.as_str().unwrap().to_owned())
                .collect();
            for (name, spec) in &def.parameters {
                if spec.default.is_none() {
                    assert!(required.contains(&(*name).to_owned()), "{}.{name}", def.name);
                } else {
                    assert!(!required.contains(&(*name).to_owned()), "{}.{name}", def.name);
                }
            }
        }
    }

    #[test]
    fn wait_seconds_is_optional() {
        let defs = definitions();
        let wait = defs.iter().find(|d| d.name == "wait").unwrap();
        assert!(wait.required_params().is_empty());
    }

    #[test]
    fn default_marker_does_not_reach_the_wire() {
        let defs = definitions();
        let wait = defs.iter().find(|d| d.name == "wait").unwrap();
        let wire = wait.to_openai_format();
        assert!(wire["function"]["parameters"]["properties"]["seconds"]
            .get("default")
            .is_none());
    }

    #[test]
    fn enums_are_emitted() {
        let defs = definitions();
        let done = defs.iter().find(|d| d.name == "done").unwrap();
        let wire = done.to_openai_format();
        assert_eq!(
            wire["function"]["parameters"]["properties"]["status"]["enum"],
            json!(["success", "failed", "skipped"])
        );
    }
}
