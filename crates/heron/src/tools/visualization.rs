use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{parse_arguments, strip_code_fences, ToolHandler};
use crate::context::AgentContext;
use crate::errors::{AgentError, ToolResult};
use crate::models::tool::Tool;
use crate::prompt_template::load_prompt_file;
use crate::providers::base::ResponseSchema;
use crate::trace::SpanKind;

pub const GENERATE_VISUALIZATION: &str = "generate_visualization";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VisualizationArgs {
    data: String,
    visualization_goal: String,
}

/// The chart the model is asked to describe before any code is written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VisualizationConfig {
    pub chart_type: String,
    pub x_axis: String,
    pub y_axis: String,
    pub title: String,
}

impl VisualizationConfig {
    /// Used when the model's configuration cannot be parsed
    pub fn fallback(goal: &str) -> Self {
        Self {
            chart_type: "line".to_string(),
            x_axis: "date".to_string(),
            y_axis: "value".to_string(),
            title: goal.to_string(),
        }
    }

    pub fn schema() -> ResponseSchema {
        let field = |description: &str| json!({"type": "string", "description": description});
        ResponseSchema::new(
            "VisualizationConfig",
            json!({
                "type": "object",
                "properties": {
                    "chart_type": field("Type of chart to generate"),
                    "x_axis": field("Name of the x-axis column"),
                    "y_axis": field("Name of the y-axis column"),
                    "title": field("Title of the chart"),
                },
                "required": ["chart_type", "x_axis", "y_axis", "title"],
                "additionalProperties": false
            }),
        )
    }
}

/// A configuration bundled with the data it plots
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartConfig {
    #[serde(flatten)]
    pub config: VisualizationConfig,
    pub data: String,
}

pub struct VisualizationTool {
    tool: Tool,
}

impl Default for VisualizationTool {
    fn default() -> Self {
        Self::new()
    }
}

impl VisualizationTool {
    pub fn new() -> Self {
        Self {
            tool: Tool::new(
                GENERATE_VISUALIZATION,
                "Generate Python code to create data visualizations",
                json!({
                    "type": "object",
                    "properties": {
                        "data": {
                            "type": "string",
                            "description": "The lookup_sales_data tool's output."
                        },
                        "visualization_goal": {
                            "type": "string",
                            "description": "The goal of the visualization."
                        }
                    },
                    "required": ["data", "visualization_goal"]
                }),
            ),
        }
    }
}

/// Ask the model for a chart configuration. A response that does not match
/// [`VisualizationConfig`] yields [`VisualizationConfig::fallback`]; a failed
/// call is an error.
pub fn extract_chart_config(ctx: &AgentContext, data: &str, goal: &str) -> Result<ChartConfig> {
    ctx.tracer()
        .in_span("extract_chart_config", SpanKind::Chain, |span| {
            span.set_input(goal);
            let formatted_prompt = load_prompt_file(
                "chart_configuration.md",
                &json!({"data": data, "visualization_goal": goal}),
            )?;
            let response = ctx.complete_structured(
                "chart_configuration_call",
                &formatted_prompt,
                &VisualizationConfig::schema(),
            )?;

            let config = match serde_json::from_str::<VisualizationConfig>(&response) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Unusable chart configuration ({}), using defaults", e);
                    VisualizationConfig::fallback(goal)
                }
            };
            span.set_output(serde_json::to_string(&config)?);

            Ok(ChartConfig {
                config,
                data: data.to_string(),
            })
        })
}

/// Ask the model for Python plotting code for `config`
pub fn create_chart(ctx: &AgentContext, config: &ChartConfig) -> Result<String> {
    ctx.tracer().in_span("create_chart", SpanKind::Chain, |span| {
        let config_json = serde_json::to_string(config)?;
        span.set_input(config_json.as_str());
        let formatted_prompt =
            load_prompt_file("create_chart.md", &json!({"config": config_json}))?;
        let response = ctx.complete_text("create_chart_call", &formatted_prompt)?;
        let code = strip_code_fences(&response, "python");
        span.set_output(code.as_str());
        Ok(code)
    })
}

impl ToolHandler for VisualizationTool {
    fn descriptor(&self) -> &Tool {
        &self.tool
    }

    fn call(&self, ctx: &AgentContext, arguments: Value) -> ToolResult<String> {
        let args: VisualizationArgs = parse_arguments(GENERATE_VISUALIZATION, arguments)?;
        let config = extract_chart_config(ctx, &args.data, &args.visualization_goal)
            .map_err(|e| AgentError::ExecutionError(e.to_string()))?;
        let code =
            create_chart(ctx, &config).map_err(|e| AgentError::ExecutionError(e.to_string()))?;
        Ok(code)
    }
}
