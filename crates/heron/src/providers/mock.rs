use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::{Provider, ResponseSchema, Usage};

/// A mock provider that returns pre-configured responses for testing
#[derive(Clone, Default)]
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<Message>>>,
    structured: Arc<Mutex<VecDeque<Result<String, String>>>>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
    repeat: Option<Message>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<Message>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            ..Default::default()
        }
    }

    /// A provider that answers every completion with the same message, forever
    pub fn repeating(response: Message) -> Self {
        Self {
            repeat: Some(response),
            ..Default::default()
        }
    }

    /// Queue a structured completion result; `Err` simulates a transport failure
    pub fn with_structured(self, result: Result<&str, &str>) -> Self {
        self.structured
            .lock()
            .unwrap()
            .push_back(result.map(String::from).map_err(String::from));
        self
    }

    /// Conversations seen by `complete` and `complete_structured`, in call order
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }
}

impl Provider for MockProvider {
    fn complete(&self, messages: &[Message], _tools: &[Tool]) -> Result<(Message, Usage)> {
        self.requests.lock().unwrap().push(messages.to_vec());
        if let Some(response) = &self.repeat {
            return Ok((response.clone(), Usage::default()));
        }
        let mut responses = self.responses.lock().unwrap();
        match responses.pop_front() {
            Some(response) => Ok((response, Usage::default())),
            // Return empty response if no more pre-configured responses
            None => Ok((Message::assistant().with_text(""), Usage::default())),
        }
    }

    fn complete_structured(
        &self,
        messages: &[Message],
        _schema: &ResponseSchema,
    ) -> Result<String> {
        self.requests.lock().unwrap().push(messages.to_vec());
        match self.structured.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(e)) => Err(anyhow!(e)),
            None => Ok(String::new()),
        }
    }
}
