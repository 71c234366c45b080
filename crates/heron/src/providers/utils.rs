use anyhow::{anyhow, Result};
use serde_json::{json, Value};

use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

/// Convert internal Message format to OpenAI's API message specification
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        if message.role == Role::Tool {
            // One wire message per answered request
            for content in &message.content {
                if let MessageContent::ToolResponse(response) = content {
                    messages_spec.push(json!({
                        "role": "tool",
                        "content": response.output,
                        "tool_call_id": response.id,
                    }));
                }
            }
            continue;
        }

        let mut converted = json!({
            "role": message.role,
        });

        let text = message.text();
        if !text.is_empty() {
            converted["content"] = json!(text);
        }

        let tool_calls: Vec<Value> = message
            .tool_requests()
            .into_iter()
            .map(|request| {
                json!({
                    "id": request.id,
                    "type": "function",
                    "function": {
                        "name": request.tool_call.name,
                        "arguments": request.tool_call.arguments,
                    }
                })
            })
            .collect();

        if !tool_calls.is_empty() {
            converted["tool_calls"] = json!(tool_calls);
            if converted.get("content").is_none() {
                converted["content"] = Value::Null;
            }
        }

        if converted.get("content").is_some() {
            messages_spec.push(converted);
        }
    }

    messages_spec
}

/// Convert internal Tool format to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters,
            }
        }));
    }

    Ok(result)
}

/// Convert OpenAI's API response to internal Message format
pub fn openai_response_to_message(response: Value) -> Result<Message> {
    let original = response
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .cloned()
        .ok_or_else(|| anyhow!("Response contained no choices: {}", response))?;
    let mut message = Message::assistant();

    if let Some(text) = original.get("content").and_then(|t| t.as_str()) {
        message = message.with_text(text);
    }

    if let Some(tool_calls) = original.get("tool_calls").and_then(|t| t.as_array()) {
        for tool_call in tool_calls {
            let id = tool_call["id"].as_str().unwrap_or_default().to_string();
            let function_name = tool_call["function"]["name"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            let arguments = tool_call["function"]["arguments"]
                .as_str()
                .unwrap_or_default()
                .to_string();

            message = message.with_tool_request(id, ToolCall::new(function_name, arguments));
        }
    }

    Ok(message)
}

/// Text of the first choice, as returned by a structured completion.
///
/// A refusal or null content comes back as an empty string so the caller's
/// coercion decides what to do with it; only a response without choices fails.
pub fn openai_response_text(response: &Value) -> Result<String> {
    let message = response
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| anyhow!("Response contained no choices: {}", response))?;

    if let Some(refusal) = message.get("refusal").and_then(|r| r.as_str()) {
        tracing::warn!(%refusal, "model refused the structured request");
    }

    Ok(message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string())
}

#[derive(Debug, thiserror::Error)]
#[error("Context length exceeded. Message: {0}")]
pub struct ContextLengthExceededError(String);

pub fn check_openai_context_length_error(error: &Value) -> Option<ContextLengthExceededError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Some(ContextLengthExceededError(message))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const OPENAI_TOOL_USE_RESPONSE: &str = r#"{
        "choices": [{
            "role": "assistant",
            "message": {
                "tool_calls": [{
                    "id": "1",
                    "function": {
                        "name": "lookup_sales_data",
                        "arguments": "{\"prompt\": \"total sales last week\"}"
                    }
                }]
            }
        }],
        "usage": {
            "input_tokens": 10,
            "output_tokens": 25,
            "total_tokens": 35
        }
    }"#;

    #[test]
    fn test_messages_to_openai_spec() -> Result<()> {
        let message = Message::user().with_text("Hello");
        let spec = messages_to_openai_spec(&[message]);

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["role"], "user");
        assert_eq!(spec[0]["content"], "Hello");
        Ok(())
    }

    #[test]
    fn test_tools_to_openai_spec() -> Result<()> {
        let tool = Tool::new(
            "test_tool",
            "A test tool",
            json!({
                "type": "object",
                "properties": {
                    "input": {
                        "type": "string",
                        "description": "Test parameter"
                    }
                },
                "required": ["input"]
            }),
        );

        let spec = tools_to_openai_spec(&[tool])?;

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["type"], "function");
        assert_eq!(spec[0]["function"]["name"], "test_tool");
        assert_eq!(spec[0]["function"]["parameters"]["required"][0], "input");
        Ok(())
    }

    #[test]
    fn test_messages_to_openai_spec_complex() -> Result<()> {
        let messages = vec![
            Message::system().with_text("You are helpful."),
            Message::user().with_text("What were total sales last week?"),
            Message::assistant().with_tool_request(
                "call_1",
                ToolCall::with_json("lookup_sales_data", json!({"prompt": "total sales"})),
            ),
            Message::tool("call_1", "total\n42"),
            Message::assistant().with_text("Sales were 42."),
        ];

        let spec = messages_to_openai_spec(&messages);

        assert_eq!(spec.len(), 5);
        assert_eq!(spec[0]["role"], "system");
        assert_eq!(spec[1]["role"], "user");
        assert_eq!(spec[2]["role"], "assistant");
        assert!(spec[2]["content"].is_null());
        assert_eq!(spec[2]["tool_calls"][0]["function"]["name"], "lookup_sales_data");
        assert_eq!(
            spec[2]["tool_calls"][0]["function"]["arguments"],
            "{\"prompt\":\"total sales\"}"
        );
        assert_eq!(spec[3]["role"], "tool");
        assert_eq!(spec[3]["content"], "total\n42");
        assert_eq!(spec[3]["tool_call_id"], spec[2]["tool_calls"][0]["id"]);
        assert_eq!(spec[4]["content"], "Sales were 42.");

        Ok(())
    }

    #[test]
    fn test_tools_to_openai_spec_duplicate() {
        let tool = Tool::new("test_tool", "Test tool", json!({"type": "object"}));
        let result = tools_to_openai_spec(&[tool.clone(), tool]);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Duplicate tool name"));
    }

    #[test]
    fn test_tools_to_openai_spec_empty() -> Result<()> {
        let spec = tools_to_openai_spec(&[])?;
        assert!(spec.is_empty());
        Ok(())
    }

    #[test]
    fn test_openai_response_to_message_text() -> Result<()> {
        let response = json!({
            "choices": [{
                "role": "assistant",
                "message": {
                    "content": "Total sales last week were 1,204 units."
                }
            }]
        });

        let message = openai_response_to_message(response)?;
        assert_eq!(message.content.len(), 1);
        assert_eq!(message.text(), "Total sales last week were 1,204 units.");
        assert!(matches!(message.role, Role::Assistant));

        Ok(())
    }

    #[test]
    fn test_openai_response_to_message_toolrequest_keeps_raw_arguments() -> Result<()> {
        let response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        let message = openai_response_to_message(response)?;

        let requests = message.tool_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].id, "1");
        assert_eq!(requests[0].tool_call.name, "lookup_sales_data");
        assert_eq!(
            requests[0].tool_call.arguments,
            "{\"prompt\": \"total sales last week\"}"
        );

        Ok(())
    }

    #[test]
    fn test_openai_response_to_message_malformed_arguments_survive() -> Result<()> {
        let mut response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        response["choices"][0]["message"]["tool_calls"][0]["function"]["arguments"] =
            json!("invalid json {");

        let message = openai_response_to_message(response)?;
        assert_eq!(message.tool_requests()[0].tool_call.arguments, "invalid json {");
        Ok(())
    }

    #[test]
    fn test_openai_response_without_choices() {
        let result = openai_response_to_message(json!({"choices": []}));
        assert!(result.is_err());
    }

    #[test]
    fn test_openai_response_text() -> Result<()> {
        let response = json!({"choices": [{"message": {"content": "{\"chart_type\":\"bar\"}"}}]});
        assert_eq!(openai_response_text(&response)?, "{\"chart_type\":\"bar\"}");

        let refusal = json!({"choices": [{"message": {
            "content": null,
            "refusal": "I can't help with that."
        }}]});
        assert_eq!(openai_response_text(&refusal)?, "");

        assert!(openai_response_text(&json!({"choices": []})).is_err());
        Ok(())
    }

    #[test]
    fn test_check_openai_context_length_error() {
        let error = json!({
            "code": "context_length_exceeded",
            "message": "This message is too long"
        });

        let result = check_openai_context_length_error(&error);
        assert!(result.is_some());
        assert_eq!(
            result.unwrap().to_string(),
            "Context length exceeded. Message: This message is too long"
        );

        let error = json!({
            "code": "other_error",
            "message": "Some other error"
        });

        let result = check_openai_context_length_error(&error);
        assert!(result.is_none());
    }
}
