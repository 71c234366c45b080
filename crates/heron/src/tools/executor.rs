use serde_json::Value;
use std::sync::Arc;

use super::registry::ToolRegistry;
use crate::context::AgentContext;
use crate::errors::{AgentError, AgentResult, ToolError};
use crate::models::message::{Message, ToolRequest};
use crate::models::tool::Tool;
use crate::trace::SpanKind;

/// Dispatches tool requests from the model to the registered handlers and
/// wraps each result as a tool message correlated by the request id.
pub struct ToolExecutor {
    registry: ToolRegistry,
    ctx: Arc<AgentContext>,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, ctx: Arc<AgentContext>) -> Self {
        Self { registry, ctx }
    }

    /// Descriptors to offer the model
    pub fn tools(&self) -> Vec<Tool> {
        self.registry.tools()
    }

    /// Run one tool request.
    ///
    /// An unknown tool name or arguments that are not a JSON object are fatal
    /// and produce no message. Recoverable tool failures come back as the
    /// message content; fatal ones propagate.
    pub fn execute(&self, request: &ToolRequest) -> AgentResult<Message> {
        let call = &request.tool_call;
        let handler = self.registry.get(&call.name).ok_or_else(|| {
            tracing::warn!(tool = %call.name, id = %request.id, "model requested an unknown tool");
            AgentError::ToolNotFound(call.name.clone())
        })?;
        let arguments = parse_call_arguments(&request.id, &call.arguments)?;

        tracing::info!(tool = %call.name, id = %request.id, "executing tool");
        let output = self
            .ctx
            .tracer()
            .in_span(&call.name, SpanKind::Tool, |span| -> AgentResult<String> {
                span.set_input(call.arguments.as_str());
                let output = match handler.call(&self.ctx, arguments) {
                    Ok(output) => output,
                    Err(ToolError::Recoverable(message)) => {
                        tracing::debug!(tool = %call.name, "tool reported a recoverable error");
                        message
                    }
                    Err(ToolError::Fatal(err)) => return Err(err),
                };
                span.set_output(output.as_str());
                Ok(output)
            })?;

        Ok(Message::tool(&request.id, output))
    }
}

fn parse_call_arguments(id: &str, arguments: &str) -> AgentResult<Value> {
    let invalid = |reason: String| {
        AgentError::InvalidParameters(format!(
            "Could not interpret tool use parameters for id {}: {}",
            id, reason
        ))
    };
    match serde_json::from_str::<Value>(arguments) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(other) => Err(invalid(format!("expected an object, got {}", other))),
        Err(e) => Err(invalid(e.to_string())),
    }
}
