use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::message::Message;
use crate::models::tool::Tool;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// A named JSON schema that a structured completion must conform to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseSchema {
    pub name: String,
    pub schema: Value,
}

impl ResponseSchema {
    pub fn new<S: Into<String>>(name: S, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

/// Base trait for chat model providers. Calls block until the model answers.
pub trait Provider: Send + Sync {
    /// Generate the next message for the conversation, offering `tools` as available actions
    fn complete(&self, messages: &[Message], tools: &[Tool]) -> Result<(Message, Usage)>;

    /// Generate a response constrained to `schema`, returned as the raw JSON text.
    ///
    /// Callers own the coercion into their target type. A refusal is not an
    /// error: it comes back as an empty string, which no schema accepts.
    fn complete_structured(&self, messages: &[Message], schema: &ResponseSchema)
        -> Result<String>;
}
