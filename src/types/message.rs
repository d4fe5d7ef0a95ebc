//! Message types for model communication.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::usage::Usage;

/// A message in a conversation.
///
/// Messages are immutable once created: the role is fixed by the constructor
/// and there are no setters. [`Message::with_usage`] consumes the message and
/// returns a new one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    role: Role,
    content: String,
    #[serde(default, skip_serializing_if = "MessageMetadata::is_empty")]
    metadata: MessageMetadata,
    timestamp: DateTime<Utc>,
}

/// Side data attached to a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl MessageMetadata {
    pub fn is_empty(&self) -> bool {
        self.usage.is_none()
            && self.tool_calls.is_empty()
            && self.tool_call_id.is_none()
            && !self.is_error
    }
}

impl Message {
    fn new(role: Role, content: String, metadata: MessageMetadata) -> Self {
        Self {
            role,
            content,
            metadata,
            timestamp: Utc::now(),
        }
    }

    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text.into(), MessageMetadata::default())
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text.into(), MessageMetadata::default())
    }

    /// Create an assistant message carrying a final answer.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text.into(), MessageMetadata::default())
    }

    /// Create an assistant message that requests tool calls.
    pub fn assistant_tool_calls(text: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self::new(
            Role::Assistant,
            text.into(),
            MessageMetadata {
                tool_calls: calls,
                ..Default::default()
            },
        )
    }

    /// Create a tool result message.
    ///
    /// String results are stored verbatim; anything else is stored as JSON.
    pub fn tool_result(result: ToolResult) -> Self {
        let content = match result.result {
            serde_json::Value::String(text) => text,
            other => other.to_string(),
        };
        Self::new(
            Role::Tool,
            content,
            MessageMetadata {
                tool_call_id: Some(result.tool_call_id),
                is_error: result.is_error,
                ..Default::default()
            },
        )
    }

    /// Attach token usage reported by the backend.
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.metadata.usage = Some(usage);
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn metadata(&self) -> &MessageMetadata {
        &self.metadata
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn usage(&self) -> Option<&Usage> {
        self.metadata.usage.as_ref()
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.metadata.tool_calls
    }

    pub fn tool_call_id(&self) -> Option<&str> {
        self.metadata.tool_call_id.as_deref()
    }

    pub fn is_error(&self) -> bool {
        self.metadata.is_error
    }

    /// Whether this assistant message asks for tools to be run.
    pub fn requests_tools(&self) -> bool {
        self.role == Role::Assistant && !self.metadata.tool_calls.is_empty()
    }
}

/// Conversation role.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// A tool execution result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub result: serde_json::Value,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(tool_call_id: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            result,
            is_error: false,
        }
    }

    /// Wrap a failure as an error payload the model can read.
    pub fn error(tool_call_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            result: serde_json::json!({ "error": message.into() }),
            is_error: true,
        }
    }
}
