//! The tools the model may call, and the registry/executor that dispatch them.
pub mod analysis;
pub mod executor;
pub mod lookup;
pub mod registry;
pub mod visualization;

pub use executor::ToolExecutor;
pub use registry::ToolRegistry;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::AgentContext;
use crate::errors::{AgentError, AgentResult, ToolResult};
use crate::models::tool::Tool;

/// A callable tool: a descriptor the model sees plus the implementation behind it
pub trait ToolHandler: Send + Sync {
    fn descriptor(&self) -> &Tool;

    /// Run the tool with the parsed arguments object
    fn call(&self, ctx: &AgentContext, arguments: Value) -> ToolResult<String>;
}

/// Unpack an arguments object into the tool's typed parameters
pub(crate) fn parse_arguments<T: DeserializeOwned>(tool: &str, arguments: Value) -> AgentResult<T> {
    serde_json::from_value(arguments)
        .map_err(|e| AgentError::InvalidParameters(format!("{}: {}", tool, e)))
}

/// Remove Markdown code fences (```lang ... ```) the model wraps around code
pub(crate) fn strip_code_fences(text: &str, language: &str) -> String {
    text.replace(&format!("```{}", language), "")
        .replace("```", "")
        .trim()
        .to_string()
}
