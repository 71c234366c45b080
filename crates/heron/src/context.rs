use anyhow::Result;

use crate::models::message::Message;
use crate::providers::base::{Provider, ResponseSchema};
use crate::trace::{SpanKind, Tracer};

/// Process-wide collaborators, built once at startup and shared by the agent
/// loop, the tool executor and the tools themselves.
pub struct AgentContext {
    provider: Box<dyn Provider>,
    tracer: Tracer,
}

impl AgentContext {
    pub fn new(provider: Box<dyn Provider>, tracer: Tracer) -> Self {
        Self { provider, tracer }
    }

    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Single-turn completion of `prompt` without tools, recorded as an LLM span
    pub fn complete_text(&self, span_name: &str, prompt: &str) -> Result<String> {
        self.tracer.in_span(span_name, SpanKind::Llm, |span| {
            span.set_input(prompt);
            let messages = [Message::user().with_text(prompt)];
            let (response, _usage) = self.provider.complete(&messages, &[])?;
            let text = response.text();
            span.set_output(text.clone());
            Ok(text)
        })
    }

    /// Single-turn structured completion of `prompt`, recorded as an LLM span
    pub fn complete_structured(
        &self,
        span_name: &str,
        prompt: &str,
        schema: &ResponseSchema,
    ) -> Result<String> {
        self.tracer.in_span(span_name, SpanKind::Llm, |span| {
            span.set_input(prompt);
            let messages = [Message::user().with_text(prompt)];
            let text = self.provider.complete_structured(&messages, schema)?;
            span.set_output(text.clone());
            Ok(text)
        })
    }
}
