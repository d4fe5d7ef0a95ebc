//! Exposes MCP servers as a [`ToolProvider`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::KrutrimConfig;
use crate::error::KrutrimError;
use crate::tools::{
    Tool, ToolArguments, ToolCatalog, ToolDescriptor, ToolExecutionContext, ToolParameters,
    ToolProvider,
};

use super::client::{McpClient, McpToolCallResult};
use super::schema::McpToolSchema;
use super::transport::StreamableHttpTransport;

#[async_trait]
pub(crate) trait McpClientOps: Send {
    async fn initialize(&mut self) -> Result<(), KrutrimError>;
    async fn list_tools(&mut self) -> Result<Vec<McpToolSchema>, KrutrimError>;
    async fn call_tool(
        &mut self,
        name: &str,
        arguments: &ToolArguments,
    ) -> Result<McpToolCallResult, KrutrimError>;
}

#[async_trait]
impl McpClientOps for McpClient {
    async fn initialize(&mut self) -> Result<(), KrutrimError> {
        McpClient::initialize(self).await
    }

    async fn list_tools(&mut self) -> Result<Vec<McpToolSchema>, KrutrimError> {
        McpClient::list_tools(self).await
    }

    async fn call_tool(
        &mut self,
        name: &str,
        arguments: &ToolArguments,
    ) -> Result<McpToolCallResult, KrutrimError> {
        McpClient::call_tool(self, name, arguments).await
    }
}

type SharedClient = Arc<Mutex<Box<dyn McpClientOps>>>;

struct McpEndpoint {
    url: String,
    client: SharedClient,
}

/// Tool provider backed by one or more streamable-HTTP MCP servers.
///
/// Nothing touches the network until the first `list_tools`.
pub struct McpToolProvider {
    endpoints: Vec<McpEndpoint>,
}

impl McpToolProvider {
    pub fn new(urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let endpoints = urls
            .into_iter()
            .map(|url| {
                let url = url.into();
                let client: Box<dyn McpClientOps> = Box::new(McpClient::new(Box::new(
                    StreamableHttpTransport::new(url.clone()),
                )));
                McpEndpoint {
                    url,
                    client: Arc::new(Mutex::new(client)),
                }
            })
            .collect();
        Self { endpoints }
    }

    pub fn from_config(config: &KrutrimConfig) -> Self {
        Self::new(config.mcp_endpoints.iter().cloned())
    }

    pub fn endpoints(&self) -> Vec<&str> {
        self.endpoints.iter().map(|e| e.url.as_str()).collect()
    }

    #[cfg(test)]
    fn from_client_ops(clients: Vec<(&str, Box<dyn McpClientOps>)>) -> Self {
        Self {
            endpoints: clients
                .into_iter()
                .map(|(url, ops)| McpEndpoint {
                    url: url.to_string(),
                    client: Arc::new(Mutex::new(ops)),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl ToolProvider for McpToolProvider {
    async fn list_tools(&self) -> Result<ToolCatalog, KrutrimError> {
        if self.endpoints.is_empty() {
            return Err(KrutrimError::Configuration(
                "no MCP endpoint configured (set KRUTRIM_MCP_URL)".into(),
            ));
        }

        let mut catalog = ToolCatalog::new();
        for endpoint in &self.endpoints {
            let schemas = {
                let mut client = endpoint.client.lock().await;
                client.initialize().await?;
                client.list_tools().await?
            };
            debug!(endpoint = %endpoint.url, tools = schemas.len(), "listed MCP tools");

            for schema in schemas {
                let name = schema.name.clone();
                let tool = McpTool {
                    name: schema.name.clone(),
                    description: schema.description.clone().unwrap_or_default(),
                    parameters: schema.parameters(),
                    client: Arc::clone(&endpoint.client),
                };
                if !catalog.insert(ToolDescriptor::from_tool(Arc::new(tool))) {
                    warn!(tool = %name, endpoint = %endpoint.url, "duplicate MCP tool name, keeping the first");
                }
            }
        }
        Ok(catalog)
    }
}

/// A single remote tool, invoked through its endpoint's shared client.
pub struct McpTool {
    name: String,
    description: String,
    parameters: ToolParameters,
    client: SharedClient,
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value, KrutrimError> {
        debug!(tool = %self.name, call_id = %ctx.tool_call_id, "calling MCP tool");
        let mut client = self.client.lock().await;
        client.initialize().await?;
        let result = client.call_tool(&self.name, args).await?;
        Ok(result.into_value_or_text())
    }
}
