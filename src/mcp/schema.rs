//! MCP schema types.

use serde::{Deserialize, Serialize};

use crate::error::KrutrimError;
use crate::tools::ToolParameters;

/// Schema for a tool exposed by an MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpToolSchema {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

impl McpToolSchema {
    /// Reject entries the model could not call.
    pub fn validate(&self) -> Result<(), KrutrimError> {
        if self.name.trim().is_empty() {
            return Err(KrutrimError::ToolProvider(
                "MCP server advertised a tool without a name".into(),
            ));
        }
        if !self.input_schema.is_object() {
            return Err(KrutrimError::ToolProvider(format!(
                "MCP tool '{}' has a non-object input schema",
                self.name
            )));
        }
        Ok(())
    }

    pub fn parameters(&self) -> ToolParameters {
        ToolParameters::from_schema(self.input_schema.clone())
    }
}

impl From<rmcp::model::Tool> for McpToolSchema {
    fn from(tool: rmcp::model::Tool) -> Self {
        Self {
            name: tool.name.to_string(),
            description: tool.description.map(|d| d.to_string()),
            input_schema: serde_json::Value::Object((*tool.input_schema).clone()),
        }
    }
}
