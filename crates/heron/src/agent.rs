use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::AgentContext;
use crate::errors::{AgentError, AgentResult};
use crate::models::message::{Message, ToolRequest};
use crate::models::role::Role;
use crate::models::tool::Tool;
use crate::prompt_template::load_prompt_file;
use crate::tools::{ToolExecutor, ToolRegistry};
use crate::trace::{SpanGuard, SpanKind};

/// Agent drives a model through the registered tools until it answers
/// without requesting any more of them.
pub struct Agent {
    ctx: Arc<AgentContext>,
    executor: ToolExecutor,
    system_prompt: String,
    max_iterations: Option<usize>,
}

impl Agent {
    pub fn new(ctx: Arc<AgentContext>, registry: ToolRegistry) -> AgentResult<Self> {
        let system_prompt = load_prompt_file("system.md", &HashMap::<String, String>::new())
            .map_err(|e| AgentError::Internal(e.to_string()))?;
        Ok(Self {
            executor: ToolExecutor::new(registry, ctx.clone()),
            ctx,
            system_prompt: system_prompt.trim().to_string(),
            max_iterations: None,
        })
    }

    /// Stop with [`AgentError::IterationLimit`] after `limit` model calls
    pub fn with_max_iterations(mut self, limit: Option<usize>) -> Self {
        self.max_iterations = limit;
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn tools(&self) -> Vec<Tool> {
        self.executor.tools()
    }

    /// Start a new conversation from a single user request
    pub fn ask(&self, prompt: &str) -> AgentResult<String> {
        let mut messages = vec![Message::user().with_text(prompt)];
        self.run(&mut messages)
    }

    /// Run the conversation to a final answer.
    ///
    /// `messages` is extended in place with every assistant and tool message
    /// produced along the way, including when the run fails partway.
    pub fn run(&self, messages: &mut Vec<Message>) -> AgentResult<String> {
        self.ctx
            .tracer()
            .in_span("AgentRun", SpanKind::Agent, |span| {
                span.set_input(to_json(&*messages));
                let answer = self.run_loop(messages)?;
                span.set_output(answer.as_str());
                Ok(answer)
            })
    }

    fn run_loop(&self, messages: &mut Vec<Message>) -> AgentResult<String> {
        self.ensure_system_prompt(messages);
        let tools = self.executor.tools();

        let mut iterations = 0;
        loop {
            if let Some(limit) = self.max_iterations {
                if iterations >= limit {
                    tracing::warn!(limit, "agent reached its iteration limit");
                    return Err(AgentError::IterationLimit(limit));
                }
            }
            iterations += 1;

            let answer = self
                .ctx
                .tracer()
                .in_span("router_call", SpanKind::Chain, |span| -> AgentResult<Option<String>> {
                    span.set_input(to_json(&*messages));
                    let response = self.complete(messages, &tools)?;
                    messages.push(response.clone());

                    if response.has_tool_requests() {
                        let requests = response.tool_requests();
                        span.set_output(to_json(&requests));
                        self.handle_tool_calls(&requests, messages)?;
                        Ok(None)
                    } else {
                        let text = response.text();
                        span.set_output(text.as_str());
                        Ok(Some(text))
                    }
                })?;

            if let Some(answer) = answer {
                tracing::info!(iterations, "agent finished");
                return Ok(answer);
            }
        }
    }

    /// The conversation must open with a system message; prepend ours if none is present
    fn ensure_system_prompt(&self, messages: &mut Vec<Message>) {
        if !messages.iter().any(|m| m.role == Role::System) {
            messages.insert(0, Message::system().with_text(self.system_prompt.as_str()));
        }
    }

    fn complete(&self, messages: &[Message], tools: &[Tool]) -> AgentResult<Message> {
        self.ctx
            .tracer()
            .in_span("ChatCompletion", SpanKind::Llm, |span: &mut SpanGuard| {
                let (response, usage) = self.ctx.provider().complete(messages, tools)?;
                tracing::debug!(
                    input_tokens = ?usage.input_tokens,
                    output_tokens = ?usage.output_tokens,
                    "model responded"
                );
                span.set_output(to_json(&response));
                Ok(response)
            })
    }

    /// Execute each requested call in order, appending its result as it completes
    fn handle_tool_calls(
        &self,
        requests: &[&ToolRequest],
        messages: &mut Vec<Message>,
    ) -> AgentResult<()> {
        self.ctx
            .tracer()
            .in_span("handle_tool_calls", SpanKind::Chain, |span| {
                span.set_input(to_json(&requests));
                let first_result = messages.len();
                for request in requests {
                    let result = self.executor.execute(request)?;
                    messages.push(result);
                }
                span.set_output(to_json(&messages[first_result..]));
                Ok(())
            })
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tool::ToolCall;
    use crate::providers::base::{Provider, ResponseSchema, Usage};
    use crate::providers::mock::MockProvider;
    use crate::store::tests::sample_store;
    use crate::tools::analysis::AnalysisTool;
    use crate::tools::lookup::SalesLookupTool;
    use crate::tools::visualization::VisualizationTool;
    use crate::tools::ToolHandler;
    use crate::trace::{InMemoryExporter, SpanRecord, SpanStatus, Tracer};
    use anyhow::anyhow;
    use serde_json::json;

    fn agent_with(provider: Box<dyn Provider>) -> (Agent, InMemoryExporter) {
        let exporter = InMemoryExporter::new();
        let ctx = Arc::new(AgentContext::new(
            provider,
            Tracer::new(Box::new(exporter.clone())),
        ));
        let handlers: Vec<Box<dyn ToolHandler>> = vec![
            Box::new(SalesLookupTool::with_store(sample_store())),
            Box::new(AnalysisTool::new()),
            Box::new(VisualizationTool::new()),
        ];
        let registry = ToolRegistry::new(handlers).unwrap();
        (Agent::new(ctx, registry).unwrap(), exporter)
    }

    fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> Message {
        Message::assistant().with_tool_request(id, ToolCall::with_json(name, arguments))
    }

    fn span<'a>(spans: &'a [SpanRecord], name: &str) -> &'a SpanRecord {
        spans
            .iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("no span named {}", name))
    }

    #[test]
    fn test_answer_without_tools() {
        let provider = MockProvider::new(vec![Message::assistant().with_text("Hello!")]);
        let (agent, _) = agent_with(Box::new(provider.clone()));

        let mut messages = vec![Message::user().with_text("Hi")];
        let answer = agent.run(&mut messages).unwrap();

        assert_eq!(answer, "Hello!");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[2].role, Role::Assistant);

        // The model saw the normalized conversation and the three tools
        let seen = &provider.requests()[0];
        assert_eq!(seen[0].text(), agent.system_prompt());
        assert_eq!(agent.tools().len(), 3);
    }

    #[test]
    fn test_lookup_then_answer() {
        let provider = MockProvider::new(vec![
            tool_call(
                "call_1",
                "lookup_sales_data",
                json!({"prompt": "What were total sales last week?"}),
            ),
            // SQL generated inside the lookup tool
            Message::assistant().with_text("SELECT SUM(total_sale_value) AS total FROM sales"),
            Message::assistant().with_text("Total sales were 20.75."),
        ]);
        let (agent, exporter) = agent_with(Box::new(provider));

        let mut messages = vec![Message::user().with_text("What were total sales last week?")];
        let answer = agent.run(&mut messages).unwrap();

        assert_eq!(answer, "Total sales were 20.75.");
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );
        assert!(messages[0].text().starts_with("You are a helpful assistant"));
        assert_eq!(messages[3].tool_call_id(), Some("call_1"));
        let output = &messages[3].content[0].as_tool_response().unwrap().output;
        assert_eq!(output, "   total\n0  20.75");

        let spans = exporter.spans();
        assert!(spans.iter().all(|s| s.status == SpanStatus::Ok));
        assert!(spans.iter().all(|s| s.trace_id == spans[0].trace_id));

        let root = span(&spans, "AgentRun");
        assert_eq!(root.kind, SpanKind::Agent);
        assert_eq!(root.parent_id, None);
        assert_eq!(root.output.as_deref(), Some("Total sales were 20.75."));
        let root_input: Vec<Message> =
            serde_json::from_str(root.input.as_deref().unwrap()).unwrap();
        assert_eq!(root_input.len(), 1);
        assert_eq!(root_input[0].text(), "What were total sales last week?");

        let routers: Vec<&SpanRecord> = spans.iter().filter(|s| s.name == "router_call").collect();
        assert_eq!(routers.len(), 2);
        assert!(routers
            .iter()
            .all(|s| s.parent_id.as_deref() == Some(root.span_id.as_str())));

        let dispatch = span(&spans, "handle_tool_calls");
        let lookup = span(&spans, "lookup_sales_data");
        assert_eq!(lookup.kind, SpanKind::Tool);
        assert_eq!(lookup.parent_id.as_deref(), Some(dispatch.span_id.as_str()));
        let sql = span(&spans, "execute_sql_query");
        assert_eq!(sql.parent_id.as_deref(), Some(lookup.span_id.as_str()));
    }

    #[test]
    fn test_ask_starts_a_conversation() {
        let provider = MockProvider::new(vec![Message::assistant().with_text("42")]);
        let (agent, _) = agent_with(Box::new(provider.clone()));

        assert_eq!(agent.ask("What is the answer?").unwrap(), "42");
        let seen = &provider.requests()[0];
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].text(), "What is the answer?");
    }

    #[test]
    fn test_existing_system_message_is_kept() {
        let provider = MockProvider::new(vec![Message::assistant().with_text("ok")]);
        let (agent, _) = agent_with(Box::new(provider));

        let mut messages = vec![
            Message::system().with_text("Answer tersely."),
            Message::user().with_text("Hi"),
        ];
        agent.run(&mut messages).unwrap();

        let systems: Vec<&Message> = messages.iter().filter(|m| m.role == Role::System).collect();
        assert_eq!(systems.len(), 1);
        assert_eq!(systems[0].text(), "Answer tersely.");
    }

    #[test]
    fn test_multiple_calls_run_in_order() {
        let provider = MockProvider::new(vec![
            Message::assistant()
                .with_tool_request(
                    "call_a",
                    ToolCall::with_json("analyze_sales_data", json!({"prompt": "trend?", "data": "a"})),
                )
                .with_tool_request(
                    "call_b",
                    ToolCall::with_json("analyze_sales_data", json!({"prompt": "peak?", "data": "b"})),
                ),
            Message::assistant().with_text("Sales are rising."),
            Message::assistant().with_text("The peak was Tuesday."),
            Message::assistant().with_text("Rising, peaking Tuesday."),
        ]);
        let (agent, _) = agent_with(Box::new(provider));

        let mut messages = vec![Message::user().with_text("Describe the data")];
        let answer = agent.run(&mut messages).unwrap();

        assert_eq!(answer, "Rising, peaking Tuesday.");
        assert_eq!(messages.len(), 6);
        assert_eq!(messages[3].tool_call_id(), Some("call_a"));
        assert_eq!(messages[4].tool_call_id(), Some("call_b"));
        assert_eq!(
            messages[3].content[0].as_tool_response().unwrap().output,
            "Sales are rising."
        );
    }

    #[test]
    fn test_every_request_gets_exactly_one_result() {
        let provider = MockProvider::new(vec![
            tool_call("c1", "analyze_sales_data", json!({"prompt": "p", "data": "d"})),
            Message::assistant().with_text("analysis one"),
            tool_call("c2", "analyze_sales_data", json!({"prompt": "p", "data": "d"})),
            Message::assistant().with_text("analysis two"),
            Message::assistant().with_text("done"),
        ]);
        let (agent, _) = agent_with(Box::new(provider));

        let mut messages = vec![Message::user().with_text("go")];
        agent.run(&mut messages).unwrap();

        let request_ids: Vec<String> = messages
            .iter()
            .flat_map(|m| m.tool_requests())
            .map(|r| r.id.clone())
            .collect();
        let result_ids: Vec<String> = messages
            .iter()
            .filter_map(|m| m.tool_call_id())
            .map(String::from)
            .collect();
        assert_eq!(request_ids, vec!["c1", "c2"]);
        assert_eq!(result_ids, request_ids);
    }

    #[test]
    fn test_unknown_tool_is_fatal() {
        let provider = MockProvider::new(vec![tool_call("call_x", "drop_tables", json!({}))]);
        let (agent, exporter) = agent_with(Box::new(provider));

        let mut messages = vec![Message::user().with_text("Hi")];
        let err = agent.run(&mut messages).unwrap_err();

        assert!(matches!(err, AgentError::ToolNotFound(ref name) if name == "drop_tables"));
        // The assistant's request stays, but no tool result is appended
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().all(|m| m.role != Role::Tool));

        // Every span still closes, with the failure recorded on the way out
        let spans = exporter.spans();
        assert!(!span(&spans, "AgentRun").status.is_ok());
        assert!(!span(&spans, "router_call").status.is_ok());
        assert!(!span(&spans, "handle_tool_calls").status.is_ok());
        assert!(span(&spans, "ChatCompletion").status.is_ok());
    }

    #[test]
    fn test_malformed_arguments_are_fatal() {
        let provider = MockProvider::new(vec![Message::assistant().with_tool_request(
            "call_1",
            ToolCall::new("lookup_sales_data", "{\"prompt\": "),
        )]);
        let (agent, _) = agent_with(Box::new(provider));

        let err = agent.ask("Hi").unwrap_err();
        assert!(matches!(err, AgentError::InvalidParameters(_)));
    }

    #[test]
    fn test_lookup_failure_is_returned_to_the_model() {
        let provider = MockProvider::new(vec![
            tool_call("call_1", "lookup_sales_data", json!({"prompt": "p"})),
            Message::assistant().with_text("SELECT * FROM missing_table"),
            Message::assistant().with_text("I could not read the data."),
        ]);
        let (agent, _) = agent_with(Box::new(provider.clone()));

        let mut messages = vec![Message::user().with_text("p")];
        let answer = agent.run(&mut messages).unwrap();

        assert_eq!(answer, "I could not read the data.");
        let output = &messages[3].content[0].as_tool_response().unwrap().output;
        assert!(output.starts_with("Error accessing data:"));
        // The error text was part of the final model call
        let last_request = provider.requests().pop().unwrap();
        assert_eq!(last_request.len(), 4);
    }

    #[test]
    fn test_iteration_limit() {
        let provider = MockProvider::repeating(tool_call(
            "call_1",
            "analyze_sales_data",
            json!({"prompt": "p", "data": "d"}),
        ));
        let (agent, _) = agent_with(Box::new(provider.clone()));
        let agent = agent.with_max_iterations(Some(3));

        let mut messages = vec![Message::user().with_text("loop forever")];
        let err = agent.run(&mut messages).unwrap_err();

        assert!(matches!(err, AgentError::IterationLimit(3)));
        // system + user + three rounds of (assistant, tool)
        assert_eq!(messages.len(), 8);
        // three router calls plus one analysis call per round
        assert_eq!(provider.requests().len(), 6);
    }

    struct FailingProvider;

    impl Provider for FailingProvider {
        fn complete(&self, _messages: &[Message], _tools: &[Tool]) -> anyhow::Result<(Message, Usage)> {
            Err(anyhow!("Server error: 503 Service Unavailable"))
        }

        fn complete_structured(
            &self,
            _messages: &[Message],
            _schema: &ResponseSchema,
        ) -> anyhow::Result<String> {
            Err(anyhow!("unused"))
        }
    }

    #[test]
    fn test_provider_failure_propagates() {
        let (agent, exporter) = agent_with(Box::new(FailingProvider));

        let mut messages = vec![Message::user().with_text("Hi")];
        let err = agent.run(&mut messages).unwrap_err();

        assert!(matches!(err, AgentError::Provider(_)));
        assert_eq!(messages.len(), 2);
        let spans = exporter.spans();
        assert_eq!(spans.len(), 3);
        assert!(spans.iter().all(|s| !s.status.is_ok()));
    }
}
