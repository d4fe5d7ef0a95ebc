//! Tool system for function calling.

pub mod arguments;
pub mod catalog;
pub mod tool;
pub mod types;

pub use arguments::ToolArguments;
pub use catalog::{StaticToolProvider, ToolCatalog, ToolDescriptor, ToolProvider};
pub use tool::{FnTool, Tool, ToolExecutionContext};
pub use types::ToolParameters;
