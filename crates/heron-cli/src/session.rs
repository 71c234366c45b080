use anyhow::Result;

use crate::prompt::{Input, Prompt};

use heron::agent::Agent;
use heron::models::message::Message;

/// An interactive conversation: one message history shared across turns
pub struct Session<'a> {
    agent: Agent,
    prompt: Box<dyn Prompt + 'a>,
    messages: Vec<Message>,
}

impl<'a> Session<'a> {
    pub fn new(agent: Agent, prompt: Box<dyn Prompt + 'a>) -> Self {
        let messages = vec![Message::system().with_text(agent.system_prompt())];
        Session {
            agent,
            prompt,
            messages,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        loop {
            let text = match self.prompt.get_input()? {
                Input::Exit => break,
                Input::Message(text) if text.trim().is_empty() => continue,
                Input::Message(text) => text,
            };

            let turn_start = self.messages.len();
            self.messages.push(Message::user().with_text(text));

            self.prompt.show_busy();
            let result = self.agent.run(&mut self.messages);
            self.prompt.hide_busy();

            match result {
                Ok(_) => {
                    for message in &self.messages[turn_start + 1..] {
                        self.prompt.render(message);
                    }
                }
                Err(e) => {
                    tracing::error!("Agent run failed: {}", e);
                    // A failed turn can leave unanswered tool requests behind
                    self.messages.truncate(turn_start);
                    self.prompt.render_error(&e.to_string());
                }
            }
        }
        self.prompt.close();
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}
