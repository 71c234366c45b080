use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;

use super::{parse_arguments, strip_code_fences, ToolHandler};
use crate::context::AgentContext;
use crate::errors::{ToolError, ToolResult};
use crate::models::tool::Tool;
use crate::prompt_template::load_prompt_file;
use crate::store::SalesStore;
use crate::trace::SpanKind;

pub const LOOKUP_SALES_DATA: &str = "lookup_sales_data";

enum DataSource {
    /// Opened on every lookup so a missing or replaced dataset is reported per call
    Path { path: PathBuf, table: String },
    Store(SalesStore),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LookupArgs {
    prompt: String,
}

/// Answers data questions by having the model write SQL against the sales table
pub struct SalesLookupTool {
    tool: Tool,
    source: DataSource,
}

impl SalesLookupTool {
    pub fn new<P: Into<PathBuf>>(path: P, table: &str) -> Self {
        Self::with_source(DataSource::Path {
            path: path.into(),
            table: table.to_string(),
        })
    }

    pub fn with_store(store: SalesStore) -> Self {
        Self::with_source(DataSource::Store(store))
    }

    fn with_source(source: DataSource) -> Self {
        let tool = Tool::new(
            LOOKUP_SALES_DATA,
            "Look up data from Store Sales Price Elasticity Promotions dataset",
            json!({
                "type": "object",
                "properties": {
                    "prompt": {
                        "type": "string",
                        "description": "The unchanged prompt that the user provided."
                    }
                },
                "required": ["prompt"]
            }),
        );
        Self { tool, source }
    }

    fn lookup(&self, ctx: &AgentContext, prompt: &str) -> Result<String> {
        match &self.source {
            DataSource::Path { path, table } => {
                let store = SalesStore::open(path, table)?;
                query_store(ctx, &store, prompt)
            }
            DataSource::Store(store) => query_store(ctx, store, prompt),
        }
    }
}

fn generate_sql_query(
    ctx: &AgentContext,
    prompt: &str,
    columns: &[String],
    table_name: &str,
) -> Result<String> {
    let formatted_prompt = load_prompt_file(
        "sql_generation.md",
        &json!({
            "prompt": prompt,
            "columns": columns,
            "table_name": table_name,
        }),
    )?;
    let response = ctx.complete_text("generate_sql_query", &formatted_prompt)?;
    Ok(strip_code_fences(&response, "sql"))
}

fn query_store(ctx: &AgentContext, store: &SalesStore, prompt: &str) -> Result<String> {
    let columns = store.columns()?;
    let sql = generate_sql_query(ctx, prompt, &columns, store.table())?;
    tracing::debug!(%sql, "executing generated query");

    ctx.tracer()
        .in_span("execute_sql_query", SpanKind::Chain, |span| {
            span.set_input(sql.as_str());
            let table = store.query(&sql)?.to_string();
            span.set_output(table.clone());
            Ok(table)
        })
}

impl ToolHandler for SalesLookupTool {
    fn descriptor(&self) -> &Tool {
        &self.tool
    }

    fn call(&self, ctx: &AgentContext, arguments: Value) -> ToolResult<String> {
        let args: LookupArgs = parse_arguments(LOOKUP_SALES_DATA, arguments)?;
        self.lookup(ctx, &args.prompt).map_err(|e| {
            tracing::warn!("Sales lookup failed: {:#}", e);
            ToolError::recoverable(format!("Error accessing data: {}", e))
        })
    }
}
