use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Tracer;

/// The openinference span kinds the agent emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpanKind {
    Agent,
    Chain,
    Tool,
    Llm,
}

impl SpanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpanKind::Agent => "AGENT",
            SpanKind::Chain => "CHAIN",
            SpanKind::Tool => "TOOL",
            SpanKind::Llm => "LLM",
        }
    }
}

impl fmt::Display for SpanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    Ok,
    Error(String),
}

impl SpanStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, SpanStatus::Ok)
    }
}

/// A closed span, ready for export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanRecord {
    pub trace_id: String,
    pub span_id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub kind: SpanKind,
    pub input: Option<String>,
    pub output: Option<String>,
    pub status: SpanStatus,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// An open span. Closing consumes the guard, so a span closes exactly once;
/// dropping a guard that was never ended closes it with an error status.
pub struct SpanGuard {
    tracer: Tracer,
    record: Option<SpanRecord>,
}

impl SpanGuard {
    pub(super) fn new(tracer: Tracer, record: SpanRecord) -> Self {
        Self {
            tracer,
            record: Some(record),
        }
    }

    pub fn span_id(&self) -> &str {
        self.record
            .as_ref()
            .map(|r| r.span_id.as_str())
            .unwrap_or_default()
    }

    pub fn trace_id(&self) -> &str {
        self.record
            .as_ref()
            .map(|r| r.trace_id.as_str())
            .unwrap_or_default()
    }

    pub fn set_input<S: Into<String>>(&mut self, value: S) {
        if let Some(record) = self.record.as_mut() {
            record.input = Some(value.into());
        }
    }

    /// Attach the output snapshot. Only the first value is kept.
    pub fn set_output<S: Into<String>>(&mut self, value: S) {
        if let Some(record) = self.record.as_mut() {
            if record.output.is_some() {
                tracing::warn!(span = %record.name, "span output already set, ignoring");
                return;
            }
            record.output = Some(value.into());
        }
    }

    /// Close the span with an ok status
    pub fn end_ok(mut self) {
        self.close(SpanStatus::Ok);
    }

    /// Close the span with an error status
    pub fn fail<E: fmt::Display + ?Sized>(mut self, error: &E) {
        self.close(SpanStatus::Error(error.to_string()));
    }

    fn close(&mut self, status: SpanStatus) {
        if let Some(mut record) = self.record.take() {
            record.status = status;
            record.end = Utc::now();
            self.tracer.finish(record);
        }
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        if self.record.is_some() {
            self.close(SpanStatus::Error("span dropped before completion".to_string()));
        }
    }
}
