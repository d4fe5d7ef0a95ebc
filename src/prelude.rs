//! Convenience re-exports for common use.

pub use crate::agent::{ControllerOptions, ConversationController, TurnEvent, TurnEventSink};
pub use crate::config::KrutrimConfig;
pub use crate::error::{KrutrimError, Result};
pub use crate::models::LanguageModel;
pub use crate::provider::ModelProvider;
pub use crate::session::{CheckpointStore, MemoryCheckpointStore, Session, SessionId};
pub use crate::tools::{FnTool, StaticToolProvider, Tool, ToolArguments, ToolParameters, ToolProvider};
pub use crate::types::{Message, Role, ToolCall, ToolResult, Usage};

#[cfg(feature = "mcp")]
pub use crate::mcp::McpToolProvider;
