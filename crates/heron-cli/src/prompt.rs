use anyhow::Result;
use heron::models::message::Message;

pub mod cliclack;

/// Terminal front end for a chat session
pub trait Prompt {
    fn render(&mut self, message: &Message);
    fn render_error(&mut self, error: &str);
    fn get_input(&mut self) -> Result<Input>;
    fn show_busy(&mut self);
    fn hide_busy(&mut self);
    fn close(&self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Message(String),
    Exit,
}

pub enum Theme {
    Light,
    Dark,
}
