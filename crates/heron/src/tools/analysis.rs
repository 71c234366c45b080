use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_arguments, ToolHandler};
use crate::context::AgentContext;
use crate::errors::{AgentError, ToolResult};
use crate::models::tool::Tool;
use crate::prompt_template::load_prompt_file;

pub const ANALYZE_SALES_DATA: &str = "analyze_sales_data";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AnalysisArgs {
    prompt: String,
    data: String,
}

pub struct AnalysisTool {
    tool: Tool,
}

impl Default for AnalysisTool {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisTool {
    pub fn new() -> Self {
        Self {
            tool: Tool::new(
                ANALYZE_SALES_DATA,
                "Analyze sales data to extract insights",
                json!({
                    "type": "object",
                    "properties": {
                        "data": {
                            "type": "string",
                            "description": "The lookup_sales_data tool's output."
                        },
                        "prompt": {
                            "type": "string",
                            "description": "The unchanged prompt that the user provided."
                        }
                    },
                    "required": ["data", "prompt"]
                }),
            ),
        }
    }
}

impl ToolHandler for AnalysisTool {
    fn descriptor(&self) -> &Tool {
        &self.tool
    }

    // Failures here are not contained; they abort the run.
    fn call(&self, ctx: &AgentContext, arguments: Value) -> ToolResult<String> {
        let args: AnalysisArgs = parse_arguments(ANALYZE_SALES_DATA, arguments)?;
        let formatted_prompt = load_prompt_file(
            "data_analysis.md",
            &json!({"data": args.data, "prompt": args.prompt}),
        )
        .map_err(|e| AgentError::Internal(e.to_string()))?;

        let analysis = ctx.complete_text("analyze_sales_data_call", &formatted_prompt)?;
        if analysis.trim().is_empty() {
            return Ok("No analysis could be generated".to_string());
        }
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ToolError;
    use crate::models::message::Message;
    use crate::providers::mock::MockProvider;
    use crate::trace::Tracer;

    #[test]
    fn test_analysis_prompt_includes_data_and_question() {
        let provider = MockProvider::new(vec![
            Message::assistant().with_text("Store 1320 leads with 20.75 in sales.")
        ]);
        let ctx = AgentContext::new(Box::new(provider.clone()), Tracer::noop());

        let output = AnalysisTool::new()
            .call(
                &ctx,
                json!({"prompt": "Which store sold the most?", "data": "store_number total\n1320 20.75"}),
            )
            .unwrap();

        assert_eq!(output, "Store 1320 leads with 20.75 in sales.");
        let prompt = provider.requests()[0][0].text();
        assert!(prompt.contains("Analyse the following data: store_number total\n1320 20.75"));
        assert!(prompt.contains("answer the following question: Which store sold the most?"));
    }

    #[test]
    fn test_empty_analysis() {
        let provider = MockProvider::new(vec![Message::assistant().with_text("")]);
        let ctx = AgentContext::new(Box::new(provider), Tracer::noop());

        let output = AnalysisTool::new()
            .call(&ctx, json!({"prompt": "p", "data": "d"}))
            .unwrap();
        assert_eq!(output, "No analysis could be generated");
    }

    #[test]
    fn test_missing_data_is_fatal() {
        let ctx = AgentContext::new(Box::new(MockProvider::new(vec![])), Tracer::noop());
        let err = AnalysisTool::new()
            .call(&ctx, json!({"prompt": "p"}))
            .unwrap_err();
        assert!(matches!(err, ToolError::Fatal(AgentError::InvalidParameters(_))));
    }
}
