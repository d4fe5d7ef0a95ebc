//! MCP client for a single server.

use rmcp::model::{
    CallToolRequestParams, CallToolResult, ClientInfo, Content, JsonObject, ProtocolVersion,
    ResourceContents,
};
use rmcp::service::{ClientInitializeError, ServiceError};
use tracing::{debug, warn};

use crate::error::KrutrimError;
use crate::tools::ToolArguments;

use super::schema::McpToolSchema;
use super::transport::{McpRunningService, McpTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpConnectionState {
    Disconnected,
    Initialized,
}

/// Content returned by a successful `tools/call`.
#[derive(Debug, Clone, Default)]
pub struct McpToolCallResult {
    pub structured_content: Option<serde_json::Value>,
    pub text_content: Option<String>,
    pub content: Vec<serde_json::Value>,
}

impl McpToolCallResult {
    /// Prefer structured output, then joined text, then the raw content list.
    pub fn into_value_or_text(self) -> serde_json::Value {
        if let Some(structured) = self.structured_content {
            return structured;
        }
        if let Some(text) = self.text_content {
            return serde_json::Value::String(text);
        }
        serde_json::Value::Array(self.content)
    }
}

/// Client for a Model Context Protocol server.
///
/// The session is opened on the first `initialize` and reopened once when the
/// transport drops mid-request.
pub struct McpClient {
    transport: Box<dyn McpTransport>,
    session: Option<McpRunningService>,
    state: McpConnectionState,
}

impl McpClient {
    pub fn new(transport: Box<dyn McpTransport>) -> Self {
        Self {
            transport,
            session: None,
            state: McpConnectionState::Disconnected,
        }
    }

    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    pub fn connection_state(&self) -> McpConnectionState {
        self.state
    }

    /// Open the session if there is none (or the old one closed).
    pub async fn initialize(&mut self) -> Result<(), KrutrimError> {
        if let Some(session) = self.session.as_ref() {
            if !session.is_closed() {
                self.state = McpConnectionState::Initialized;
                return Ok(());
            }
            debug!(endpoint = self.endpoint(), "MCP session closed, reconnecting");
            self.session = None;
            self.state = McpConnectionState::Disconnected;
        }

        let session = self.connect_with_protocol_fallback().await?;
        self.session = Some(session);
        self.state = McpConnectionState::Initialized;
        debug!(endpoint = self.endpoint(), "MCP session initialized");
        Ok(())
    }

    /// List the server's tools, following pagination.
    pub async fn list_tools(&mut self) -> Result<Vec<McpToolSchema>, KrutrimError> {
        self.ensure_initialized()?;

        let tools = match self.list_tools_from_active_session().await {
            Ok(tools) => tools,
            Err(error) if should_reconnect_after_service_error(&error) => {
                self.reconnect().await?;
                self.list_tools_from_active_session()
                    .await
                    .map_err(|e| map_service_error("tools/list", e))?
            }
            Err(error) => return Err(map_service_error("tools/list", error)),
        };

        let tools: Vec<McpToolSchema> = tools.into_iter().map(McpToolSchema::from).collect();
        for tool in &tools {
            tool.validate()?;
        }
        Ok(tools)
    }

    /// Invoke a tool on the server.
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: &ToolArguments,
    ) -> Result<McpToolCallResult, KrutrimError> {
        self.ensure_initialized()?;
        let arguments = arguments.to_object()?;

        let result = match self.call_tool_from_active_session(name, arguments.clone()).await {
            Ok(result) => result,
            Err(error) if should_reconnect_after_service_error(&error) => {
                self.reconnect().await?;
                self.call_tool_from_active_session(name, arguments)
                    .await
                    .map_err(|e| map_call_error(name, e))?
            }
            Err(error) => return Err(map_call_error(name, error)),
        };

        map_call_result(name, result)
    }

    fn ensure_initialized(&self) -> Result<(), KrutrimError> {
        match self.state {
            McpConnectionState::Initialized => Ok(()),
            McpConnectionState::Disconnected => Err(KrutrimError::InvalidState(
                "MCP client must be initialized first".into(),
            )),
        }
    }

    async fn reconnect(&mut self) -> Result<(), KrutrimError> {
        warn!(endpoint = self.endpoint(), "MCP transport dropped, reconnecting");
        self.session = None;
        self.state = McpConnectionState::Disconnected;
        self.initialize().await
    }

    async fn connect_with_protocol_fallback(&mut self) -> Result<McpRunningService, KrutrimError> {
        let endpoint = self.transport.endpoint().to_string();
        let latest = ClientInfo {
            protocol_version: ProtocolVersion::LATEST,
            ..Default::default()
        };

        match self.transport.connect(latest).await {
            Ok(session) => return Ok(session),
            Err(error) if should_retry_protocol_fallback(&error) => {
                debug!(endpoint = %endpoint, "retrying MCP initialize with 2024-11-05 protocol");
            }
            Err(error) => return Err(map_client_initialize_error(&endpoint, error)),
        }

        let fallback = ClientInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            ..Default::default()
        };
        self.transport
            .connect(fallback)
            .await
            .map_err(|e| map_client_initialize_error(&endpoint, e))
    }

    async fn list_tools_from_active_session(
        &mut self,
    ) -> Result<Vec<rmcp::model::Tool>, ServiceError> {
        let session = self.session.as_mut().ok_or(ServiceError::TransportClosed)?;

        match session.list_all_tools().await {
            Ok(tools) => Ok(tools),
            Err(ServiceError::UnexpectedResponse) => {
                session.list_tools(None).await.map(|page| page.tools)
            }
            Err(error) => Err(error),
        }
    }

    async fn call_tool_from_active_session(
        &mut self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult, ServiceError> {
        let session = self.session.as_mut().ok_or(ServiceError::TransportClosed)?;

        session
            .call_tool(CallToolRequestParams {
                meta: None,
                name: name.to_owned().into(),
                arguments,
                task: None,
            })
            .await
    }
}

fn should_reconnect_after_service_error(error: &ServiceError) -> bool {
    matches!(
        error,
        ServiceError::TransportClosed
            | ServiceError::TransportSend(_)
            | ServiceError::Cancelled { .. }
    )
}

fn should_retry_protocol_fallback(error: &ClientInitializeError) -> bool {
    match error {
        ClientInitializeError::JsonRpcError(error) => {
            let message = error.message.to_ascii_lowercase();
            message.contains("protocol") && message.contains("version")
        }
        _ => false,
    }
}

fn extract_text_content(content: &[Content]) -> Option<String> {
    let mut lines = Vec::new();
    for item in content {
        if let Some(text) = item.as_text() {
            lines.push(text.text.clone());
            continue;
        }
        if let Some(resource) = item.as_resource() {
            if let ResourceContents::TextResourceContents { text, .. } = &resource.resource {
                lines.push(text.clone());
            }
        }
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// An `isError` result becomes a tool execution error.
pub(crate) fn map_call_result(
    name: &str,
    result: CallToolResult,
) -> Result<McpToolCallResult, KrutrimError> {
    let text_content = extract_text_content(&result.content);

    if result.is_error.unwrap_or(false) {
        let message = result
            .structured_content
            .as_ref()
            .map(|v| v.to_string())
            .or(text_content)
            .unwrap_or_else(|| "MCP tool returned an error result".into());

        return Err(KrutrimError::ToolExecution {
            tool_name: name.to_string(),
            message,
        });
    }

    let content = result
        .content
        .iter()
        .filter_map(|item| serde_json::to_value(item).ok())
        .collect();

    Ok(McpToolCallResult {
        structured_content: result.structured_content,
        text_content,
        content,
    })
}

fn map_client_initialize_error(endpoint: &str, error: ClientInitializeError) -> KrutrimError {
    let detail = match error {
        ClientInitializeError::ConnectionClosed(context) => {
            format!("connection closed during initialize: {context}")
        }
        ClientInitializeError::TransportError { error, context } => {
            format!("transport error ({context}): {error}")
        }
        ClientInitializeError::JsonRpcError(error) => {
            format!("initialize failed with JSON-RPC error {}: {}", error.code.0, error.message)
        }
        ClientInitializeError::Cancelled => "initialize cancelled".to_string(),
        other => format!("initialize failed: {other}"),
    };
    KrutrimError::ToolProvider(format!("MCP endpoint {endpoint}: {detail}"))
}

fn map_service_error(context: &str, error: ServiceError) -> KrutrimError {
    match error {
        ServiceError::McpError(error) => KrutrimError::ToolProvider(format!(
            "{context}: MCP error {}: {}",
            error.code.0, error.message
        )),
        ServiceError::TransportSend(error) => {
            KrutrimError::ToolProvider(format!("{context}: MCP transport send failed: {error}"))
        }
        ServiceError::TransportClosed => {
            KrutrimError::ToolProvider(format!("{context}: MCP transport closed"))
        }
        ServiceError::UnexpectedResponse => {
            KrutrimError::ToolProvider(format!("{context}: unexpected MCP response"))
        }
        ServiceError::Cancelled { reason } => {
            let suffix = reason
                .as_deref()
                .map(|r| format!(" ({r})"))
                .unwrap_or_default();
            KrutrimError::ToolProvider(format!("{context}: MCP request cancelled{suffix}"))
        }
        ServiceError::Timeout { timeout } => KrutrimError::Timeout(timeout.as_millis() as u64),
        other => KrutrimError::ToolProvider(format!("{context}: MCP service error: {other}")),
    }
}

/// A JSON-RPC error from `tools/call` is the tool's fault, not the catalog's.
fn map_call_error(name: &str, error: ServiceError) -> KrutrimError {
    match error {
        ServiceError::McpError(error) => KrutrimError::ToolExecution {
            tool_name: name.to_string(),
            message: error.message.to_string(),
        },
        other => map_service_error("tools/call", other),
    }
}
