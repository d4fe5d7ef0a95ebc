//! Tool catalog and the provider seam the agent lists tools through.

use std::sync::Arc;

use async_trait::async_trait;

use super::tool::Tool;
use super::types::ToolParameters;
use crate::error::KrutrimError;
use crate::provider::ToolDefinition;

/// A tool as advertised by a provider: its schema plus a handle to invoke it.
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: ToolParameters,
    pub handle: Arc<dyn Tool>,
}

impl ToolDescriptor {
    /// Describe a tool using its own name, description and schema.
    pub fn from_tool(tool: Arc<dyn Tool>) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            input_schema: tool.parameters().clone(),
            handle: tool,
        }
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.input_schema.schema.clone(),
        }
    }
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// Ordered set of tool descriptors with unique names.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor. Returns `false` and keeps the existing entry when the
    /// name is already taken.
    pub fn insert(&mut self, descriptor: ToolDescriptor) -> bool {
        if self.find(&descriptor.name).is_some() {
            return false;
        }
        self.tools.push(descriptor);
        true
    }

    pub fn find(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    /// Definitions in catalog order, for the model request.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(ToolDescriptor::definition).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl FromIterator<ToolDescriptor> for ToolCatalog {
    fn from_iter<I: IntoIterator<Item = ToolDescriptor>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for descriptor in iter {
            catalog.insert(descriptor);
        }
        catalog
    }
}

/// Source of the tools offered to the model.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Fetch the current catalog.
    async fn list_tools(&self) -> Result<ToolCatalog, KrutrimError>;
}

/// In-process tools known at construction time.
#[derive(Default)]
pub struct StaticToolProvider {
    tools: Vec<Arc<dyn Tool>>,
}

impl StaticToolProvider {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { tools }
    }

    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }
}

#[async_trait]
impl ToolProvider for StaticToolProvider {
    async fn list_tools(&self) -> Result<ToolCatalog, KrutrimError> {
        Ok(self
            .tools
            .iter()
            .cloned()
            .map(ToolDescriptor::from_tool)
            .collect())
    }
}
