//! Chat request/response types
//!
//! These model an abstract chat-with-tools wire contract: system prompt and
//! turns in, text plus zero or more structured tool calls out. Source text
//! embedded in JSON uses standard JSON escaping only.

use serde::{Deserialize, Serialize};
use statestore::now_ms;

/// Specialist capability a call is addressed to; resolves to a concrete
/// model name through configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelRole {
    /// Decision-making and arbitration
    Arbiter,
    /// Code generation
    Coder,
    /// Long-form reasoning
    Reasoner,
    /// Source analysis
    Analyst,
    /// Tool-call repair
    Interpreter,
}

/// Message role within a conversation thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,

    pub timestamp: i64,

    /// Which model produced this turn, for assistant messages
    #[serde(default)]
    pub origin_model: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            timestamp: now_ms(),
            origin_model: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: now_ms(),
            origin_model: None,
        }
    }

    pub fn assistant(content: impl Into<String>, origin_model: Option<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: now_ms(),
            origin_model,
        }
    }

    /// Wire form: role and content only
    pub fn wire_json(&self) -> serde_json::Value {
        serde_json::json!({
            "role": self.role,
            "content": self.content,
        })
    }
}

/// Tool definition advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A structured tool call returned by the model
///
/// Malformed calls (empty name, missing arguments) are preserved verbatim;
/// repair is the executor's job, not the client's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Everything needed for one model call
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: u32,
}

/// Parsed model response: text and/or tool calls
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    /// Model that produced the response, as reported by the server
    pub model: Option<String>,
}

impl ChatResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
            model: None,
        }
    }

    pub fn with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: None,
            tool_calls,
            model: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_json_is_role_and_content_only() {
        let msg = ChatMessage::user("hello");
        let wire = msg.wire_json();
        assert_eq!(wire["role"], "user");
        assert_eq!(wire["content"], "hello");
        assert!(wire.get("timestamp").is_none());
    }

    #[test]
    fn test_role_serde() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
    }

    #[test]
    fn test_malformed_tool_call_deserializes() {
        // Empty name and absent arguments must parse, not error
        let call: ToolCall = serde_json::from_str(r#"{"name": ""}"#).unwrap();
        assert_eq!(call.name, "");
        assert!(call.arguments.is_null());
    }

    #[test]
    fn test_source_text_uses_json_escaping() {
        // Embedding source with quotes must round-trip byte-exact through
        // standard JSON escaping; no entity encoding anywhere
        let source = "def f():\n    return \"quoted\"";
        let call = ToolCall::new("create_file", serde_json::json!({"content": source}));
        let wire = serde_json::to_string(&call).unwrap();
        assert!(!wire.contains("&quot;"));

        let back: ToolCall = serde_json::from_str(&wire).unwrap();
        assert_eq!(back.arguments["content"].as_str().unwrap(), source);
    }
}
