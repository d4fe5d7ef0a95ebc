//! Runs the tool calls requested by an agent step.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::KrutrimError;
use crate::session::SessionId;
use crate::tools::{ToolArguments, ToolCatalog, ToolExecutionContext};
use crate::types::{Message, ToolCall, ToolResult};
use crate::util::with_timeout;

use super::events::{TurnEventEmitter, TurnEventPayload};

/// Executes tool calls sequentially, one result message per call.
///
/// Failures never abort the turn: an unknown tool, a tool error or a timeout
/// becomes an `{"error": ...}` payload the model sees on its next step.
#[derive(Debug, Clone)]
pub struct ToolDispatch {
    tool_timeout: Duration,
}

impl ToolDispatch {
    pub fn new(tool_timeout: Duration) -> Self {
        Self { tool_timeout }
    }

    /// Results come back in request order.
    pub async fn run(
        &self,
        calls: &[ToolCall],
        catalog: &ToolCatalog,
        session_id: SessionId,
    ) -> Vec<Message> {
        let emitter = TurnEventEmitter::new(session_id, None);
        self.run_with_events(calls, catalog, session_id, &emitter).await
    }

    pub(crate) async fn run_with_events(
        &self,
        calls: &[ToolCall],
        catalog: &ToolCatalog,
        session_id: SessionId,
        emitter: &TurnEventEmitter,
    ) -> Vec<Message> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            emitter.emit(TurnEventPayload::ToolCallStarted { call: call.clone() });
            let result = self.invoke(call, catalog, session_id).await;
            emitter.emit(TurnEventPayload::ToolCallCompleted {
                name: call.name.clone(),
                result: result.clone(),
            });
            results.push(Message::tool_result(result));
        }
        results
    }

    async fn invoke(&self, call: &ToolCall, catalog: &ToolCatalog, session_id: SessionId) -> ToolResult {
        let Some(descriptor) = catalog.find(&call.name) else {
            warn!(tool = %call.name, call_id = %call.id, "Tool not found");
            return ToolResult::error(&call.id, format!("Tool '{}' not found", call.name));
        };

        let args = ToolArguments::new(call.arguments.clone());
        let ctx = ToolExecutionContext {
            tool_call_id: call.id.clone(),
            session_id: Some(session_id),
        };

        debug!(tool = %call.name, call_id = %call.id, "dispatching tool call");
        match with_timeout(self.tool_timeout, descriptor.handle.execute(&args, &ctx)).await {
            Ok(value) => ToolResult::ok(&call.id, value),
            Err(KrutrimError::Timeout(ms)) => {
                warn!(tool = %call.name, call_id = %call.id, timeout_ms = ms, "Tool call timed out");
                ToolResult::error(
                    &call.id,
                    format!("Tool '{}' timed out after {ms}ms", call.name),
                )
            }
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "Tool execution failed");
                ToolResult::error(&call.id, e.to_string())
            }
        }
    }
}
