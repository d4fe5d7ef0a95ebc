//! One model invocation over the working history.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::KrutrimError;
use crate::provider::{ModelProvider, ProviderRequest};
use crate::tools::ToolCatalog;
use crate::types::Message;
use crate::util::with_timeout;

/// Calls the model once and turns its reply into an assistant message.
///
/// The reply either requests tools (`Message::requests_tools`) or carries a
/// non-empty final answer. Token usage is attached to the message.
#[derive(Clone)]
pub struct AgentStep {
    provider: Arc<dyn ModelProvider>,
    model_timeout: Duration,
}

impl AgentStep {
    pub fn new(provider: Arc<dyn ModelProvider>, model_timeout: Duration) -> Self {
        Self {
            provider,
            model_timeout,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    /// Run the step. Without a catalog no tools are offered to the model.
    pub async fn run(
        &self,
        system_prompt: &str,
        history: &[Message],
        catalog: Option<&ToolCatalog>,
    ) -> Result<Message, KrutrimError> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(system_prompt));
        messages.extend_from_slice(history);

        let request = ProviderRequest {
            messages,
            tools: catalog.map(ToolCatalog::definitions),
        };

        debug!(
            provider = self.provider.provider_name(),
            model = self.provider.model_id(),
            history = history.len(),
            tools = request.tools.as_ref().map_or(0, Vec::len),
            "agent step: calling model"
        );

        let response = with_timeout(self.model_timeout, self.provider.generate_text(&request))
            .await
            .map_err(|e| self.as_provider_error(e))?;

        if !response.tool_calls.is_empty() {
            return Ok(Message::assistant_tool_calls(response.text, response.tool_calls)
                .with_usage(response.usage));
        }

        if response.text.trim().is_empty() {
            return Err(KrutrimError::provider(
                self.provider.provider_name(),
                "model returned an empty answer",
            ));
        }

        Ok(Message::assistant(response.text).with_usage(response.usage))
    }

    fn as_provider_error(&self, error: KrutrimError) -> KrutrimError {
        match error {
            KrutrimError::Provider { .. } => error,
            KrutrimError::Timeout(ms) => KrutrimError::provider(
                self.provider.provider_name(),
                format!("model call timed out after {ms}ms"),
            ),
            other => KrutrimError::provider(self.provider.provider_name(), other.to_string()),
        }
    }
}
