//! Model Context Protocol (MCP) client and tool provider.

pub mod client;
pub mod provider;
pub mod schema;
pub mod transport;

pub use client::{McpClient, McpToolCallResult};
pub use provider::{McpTool, McpToolProvider};
pub use schema::McpToolSchema;
pub use transport::{McpTransport, StreamableHttpTransport};
