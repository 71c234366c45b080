//! Span recording for agent runs.
//!
//! Spans nest by call structure: a span opened while another is open on the
//! same thread becomes its child. When the outermost span of a trace closes,
//! the whole trace is handed to the exporter.
mod exporter;
mod span;

pub use exporter::{InMemoryExporter, NoopExporter, OtlpHttpExporter, SpanExporter};
pub use span::{SpanGuard, SpanKind, SpanRecord, SpanStatus};

use chrono::Utc;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use uuid::Uuid;

#[derive(Default)]
struct ThreadTrace {
    trace_id: String,
    open: Vec<String>,
    finished: Vec<SpanRecord>,
}

struct TracerInner {
    exporter: Box<dyn SpanExporter>,
    traces: Mutex<HashMap<ThreadId, ThreadTrace>>,
}

#[derive(Clone)]
pub struct Tracer {
    inner: Arc<TracerInner>,
}

impl Tracer {
    pub fn new(exporter: Box<dyn SpanExporter>) -> Self {
        Self {
            inner: Arc::new(TracerInner {
                exporter,
                traces: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// A tracer that records spans and drops them
    pub fn noop() -> Self {
        Self::new(Box::new(NoopExporter))
    }

    /// Open a span as a child of the innermost open span on this thread
    pub fn start_span<S: Into<String>>(&self, name: S, kind: SpanKind) -> SpanGuard {
        let name = name.into();
        let span_id = Uuid::new_v4().simple().to_string()[..16].to_string();

        let (trace_id, parent_id) = {
            let mut traces = self.lock();
            let trace = traces.entry(thread::current().id()).or_default();
            if trace.open.is_empty() {
                trace.trace_id = Uuid::new_v4().simple().to_string();
            }
            let parent_id = trace.open.last().cloned();
            trace.open.push(span_id.clone());
            (trace.trace_id.clone(), parent_id)
        };

        tracing::debug!(span = %name, kind = %kind, parent = ?parent_id, "span opened");

        let now = Utc::now();
        SpanGuard::new(
            self.clone(),
            SpanRecord {
                trace_id,
                span_id,
                parent_id,
                name,
                kind,
                input: None,
                output: None,
                status: SpanStatus::Ok,
                start: now,
                end: now,
            },
        )
    }

    /// Run `body` inside a span. The span closes with `ok` when the body
    /// returns `Ok` and with `error` otherwise; the body attaches input/output.
    pub fn in_span<T, E, F>(&self, name: &str, kind: SpanKind, body: F) -> Result<T, E>
    where
        E: fmt::Display,
        F: FnOnce(&mut SpanGuard) -> Result<T, E>,
    {
        let mut span = self.start_span(name, kind);
        match body(&mut span) {
            Ok(value) => {
                span.end_ok();
                Ok(value)
            }
            Err(e) => {
                span.fail(&e);
                Err(e)
            }
        }
    }

    pub(crate) fn finish(&self, record: SpanRecord) {
        tracing::debug!(
            span = %record.name,
            ok = record.status.is_ok(),
            elapsed_ms = (record.end - record.start).num_milliseconds(),
            "span closed"
        );

        let completed = {
            let mut traces = self.lock();
            let thread_id = thread::current().id();
            let Some(trace) = traces.get_mut(&thread_id) else {
                tracing::warn!(span = %record.name, "closing span with no open trace");
                return;
            };
            trace.open.retain(|id| id != &record.span_id);
            trace.finished.push(record);
            if trace.open.is_empty() {
                traces.remove(&thread_id).map(|t| t.finished)
            } else {
                None
            }
        };

        if let Some(spans) = completed {
            let count = spans.len();
            if let Err(e) = self.inner.exporter.export(spans) {
                tracing::warn!("Failed to export {} spans: {}", count, e);
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ThreadId, ThreadTrace>> {
        // Span bookkeeping never panics while holding the lock, so poisoning can be ignored
        self.inner
            .traces
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
