use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use opentelemetry::trace::{SpanId, TraceId};
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::common::v1::{any_value, AnyValue, InstrumentationScope, KeyValue};
use opentelemetry_proto::tonic::resource::v1::Resource;
use opentelemetry_proto::tonic::trace::v1::{
    span, status, ResourceSpans, ScopeSpans, Span, Status,
};
use prost::Message;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::span::{SpanRecord, SpanStatus};

const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";

/// Receives the spans of one finished trace
pub trait SpanExporter: Send + Sync {
    fn export(&self, spans: Vec<SpanRecord>) -> Result<()>;
}

pub struct NoopExporter;

impl SpanExporter for NoopExporter {
    fn export(&self, _spans: Vec<SpanRecord>) -> Result<()> {
        Ok(())
    }
}

/// Keeps every exported span in memory
#[derive(Clone, Default)]
pub struct InMemoryExporter {
    spans: Arc<Mutex<Vec<SpanRecord>>>,
}

impl InMemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spans(&self) -> Vec<SpanRecord> {
        self.spans
            .lock()
            .map(|spans| spans.clone())
            .unwrap_or_default()
    }
}

impl SpanExporter for InMemoryExporter {
    fn export(&self, spans: Vec<SpanRecord>) -> Result<()> {
        self.spans
            .lock()
            .map_err(|_| anyhow!("span store poisoned"))?
            .extend(spans);
        Ok(())
    }
}

/// Sends spans to an OTLP collector over HTTP, protobuf encoded
pub struct OtlpHttpExporter {
    client: Client,
    endpoint: String,
    project_name: String,
}

impl OtlpHttpExporter {
    pub fn new<E: Into<String>, P: Into<String>>(endpoint: E, project_name: P) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            project_name: project_name.into(),
        })
    }

    fn request(&self, spans: &[SpanRecord]) -> Result<ExportTraceServiceRequest> {
        let spans = spans.iter().map(otlp_span).collect::<Result<Vec<_>>>()?;
        Ok(ExportTraceServiceRequest {
            resource_spans: vec![ResourceSpans {
                resource: Some(Resource {
                    attributes: vec![
                        attribute("service.name", &self.project_name),
                        attribute("openinference.project.name", &self.project_name),
                    ],
                    ..Default::default()
                }),
                scope_spans: vec![ScopeSpans {
                    scope: Some(InstrumentationScope {
                        name: "heron".to_string(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                        ..Default::default()
                    }),
                    spans,
                    ..Default::default()
                }],
                ..Default::default()
            }],
        })
    }
}

impl SpanExporter for OtlpHttpExporter {
    fn export(&self, spans: Vec<SpanRecord>) -> Result<()> {
        let body = self.request(&spans)?.encode_to_vec();
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, PROTOBUF_CONTENT_TYPE)
            .body(body)
            .send()?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Collector at {} rejected {} spans: {}",
                self.endpoint,
                spans.len(),
                response.status()
            ));
        }
        Ok(())
    }
}

fn attribute(key: &str, value: &str) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue {
            value: Some(any_value::Value::StringValue(value.to_string())),
        }),
    }
}

fn nanos(time: &DateTime<Utc>) -> u64 {
    time.timestamp_nanos_opt()
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or_default()
}

fn span_id_bytes(hex: &str) -> Result<Vec<u8>> {
    SpanId::from_hex(hex)
        .map(|id| id.to_bytes().to_vec())
        .map_err(|e| anyhow!("Invalid span id {}: {}", hex, e))
}

fn otlp_span(record: &SpanRecord) -> Result<Span> {
    let trace_id = TraceId::from_hex(&record.trace_id)
        .map_err(|e| anyhow!("Invalid trace id {}: {}", record.trace_id, e))?;

    let mut attributes = vec![attribute("openinference.span.kind", record.kind.as_str())];
    if let Some(input) = &record.input {
        attributes.push(attribute("input.value", input));
    }
    if let Some(output) = &record.output {
        attributes.push(attribute("output.value", output));
    }

    let span_status = match &record.status {
        SpanStatus::Ok => Status {
            code: status::StatusCode::Ok as i32,
            ..Default::default()
        },
        SpanStatus::Error(message) => Status {
            code: status::StatusCode::Error as i32,
            message: message.clone(),
            ..Default::default()
        },
    };

    Ok(Span {
        trace_id: trace_id.to_bytes().to_vec(),
        span_id: span_id_bytes(&record.span_id)?,
        parent_span_id: match &record.parent_id {
            Some(parent) => span_id_bytes(parent)?,
            None => Vec::new(),
        },
        name: record.name.clone(),
        kind: span::SpanKind::Internal as i32,
        start_time_unix_nano: nanos(&record.start),
        end_time_unix_nano: nanos(&record.end),
        attributes,
        status: Some(span_status),
        ..Default::default()
    })
}
