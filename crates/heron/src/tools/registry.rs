use std::collections::HashMap;
use std::path::PathBuf;

use super::analysis::AnalysisTool;
use super::lookup::SalesLookupTool;
use super::visualization::VisualizationTool;
use super::ToolHandler;
use crate::errors::{AgentError, AgentResult};
use crate::models::tool::Tool;

/// The fixed set of tools offered to the model, keyed by name.
///
/// Descriptors are checked once at construction: names are unique, parameters
/// are an object schema, and every required parameter is declared.
pub struct ToolRegistry {
    handlers: Vec<Box<dyn ToolHandler>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new(handlers: Vec<Box<dyn ToolHandler>>) -> AgentResult<Self> {
        let mut index = HashMap::new();
        for (position, handler) in handlers.iter().enumerate() {
            let tool = handler.descriptor();
            validate_descriptor(tool)?;
            if index.insert(tool.name.clone(), position).is_some() {
                return Err(AgentError::Internal(format!(
                    "Duplicate tool name: {}",
                    tool.name
                )));
            }
        }
        Ok(Self { handlers, index })
    }

    /// The sales dataset tools: lookup, analysis and visualization
    pub fn sales_tools<P: Into<PathBuf>>(path: P, table: &str) -> AgentResult<Self> {
        let handlers: Vec<Box<dyn ToolHandler>> = vec![
            Box::new(SalesLookupTool::new(path, table)),
            Box::new(AnalysisTool::new()),
            Box::new(VisualizationTool::new()),
        ];
        Self::new(handlers)
    }

    /// Descriptors in registration order
    pub fn tools(&self) -> Vec<Tool> {
        self.handlers
            .iter()
            .map(|handler| handler.descriptor().clone())
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn ToolHandler> {
        self.index
            .get(name)
            .map(|&position| self.handlers[position].as_ref())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

fn validate_descriptor(tool: &Tool) -> AgentResult<()> {
    let invalid = |reason: &str| {
        Err(AgentError::Internal(format!(
            "Invalid tool '{}': {}",
            tool.name, reason
        )))
    };

    if tool.name.is_empty() {
        return invalid("name is empty");
    }
    if tool.parameters.get("type").and_then(|t| t.as_str()) != Some("object") {
        return invalid("parameters must be an object schema");
    }

    let properties = tool.parameters.get("properties").and_then(|p| p.as_object());
    for required in tool.required_parameters() {
        if !properties.is_some_and(|props| props.contains_key(required)) {
            return invalid(&format!("required parameter '{}' is not declared", required));
        }
    }
    Ok(())
}
