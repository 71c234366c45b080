use std::io::{self, Write};

use anyhow::Result;
use bat::WrappingMode;
use cliclack::{input, spinner};
use console::style;
use heron::models::message::{Message, MessageContent};
use heron::models::role::Role;

use super::{Input, Prompt, Theme};

pub struct CliclackPrompt {
    spinner: cliclack::ProgressBar,
    input_mode: InputMode,
    theme: Theme,
}

enum InputMode {
    Singleline,
    Multiline,
}

impl Default for CliclackPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl CliclackPrompt {
    pub fn new() -> Self {
        CliclackPrompt {
            spinner: spinner(),
            input_mode: InputMode::Singleline,
            theme: Theme::Dark,
        }
    }

    fn theme_name(&self) -> &'static str {
        match self.theme {
            Theme::Light => "GitHub",
            Theme::Dark => "zenburn",
        }
    }
}

fn pretty_print(input: bat::Input, theme: &str, language: &str, framed: bool) {
    let result = bat::PrettyPrinter::new()
        .input(input)
        .theme(theme)
        .language(language)
        .grid(framed)
        .header(framed)
        .wrapping_mode(WrappingMode::Character)
        .print();
    if let Err(e) = result {
        tracing::warn!("Failed to render output: {}", e);
    }
}

fn print_tool_request(arguments: &str, theme: &str, tool_name: &str) {
    // Arguments are raw model output; show them pretty when they parse
    let content = serde_json::from_str::<serde_json::Value>(arguments)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|_| arguments.to_string());
    pretty_print(
        bat::Input::from_bytes(content.as_bytes()).name(format!("Tool Request: {}", tool_name)),
        theme,
        "JSON",
        true,
    );
}

fn print_tool_response(output: &str, theme: &str) {
    let language = if output.contains("import matplotlib") {
        "Python"
    } else {
        "Markdown"
    };
    pretty_print(
        bat::Input::from_bytes(output.as_bytes()).name("Tool Response:"),
        theme,
        language,
        true,
    );
}

/// Print an answer as highlighted Markdown
pub fn print_markdown(content: &str, theme: &str) {
    pretty_print(
        bat::Input::from_bytes(content.as_bytes()),
        theme,
        "Markdown",
        false,
    );
}

impl Prompt for CliclackPrompt {
    fn render(&mut self, message: &Message) {
        let theme = self.theme_name();

        for message_content in &message.content {
            match message_content {
                MessageContent::Text { text } if message.role != Role::System => {
                    print_markdown(text, theme)
                }
                MessageContent::Text { .. } => {}
                MessageContent::ToolRequest(request) => print_tool_request(
                    &request.tool_call.arguments,
                    theme,
                    &request.tool_call.name,
                ),
                MessageContent::ToolResponse(response) => {
                    print_tool_response(&response.output, theme)
                }
            }
        }

        println!();
        if let Err(e) = io::stdout().flush() {
            tracing::warn!("Failed to flush stdout: {}", e);
        }
    }

    fn render_error(&mut self, error: &str) {
        println!("{} {}", style("error:").red().bold(), error);
        println!(
            "{}",
            style("The last request was discarded; the conversation continues from before it.")
                .dim()
        );
    }

    fn show_busy(&mut self) {
        self.spinner = spinner();
        self.spinner.start("awaiting reply");
    }

    fn hide_busy(&mut self) {
        self.spinner.stop("");
    }

    fn get_input(&mut self) -> Result<Input> {
        let mut input = input("Heron:").placeholder("Ask about the sales data");
        if let InputMode::Multiline = self.input_mode {
            input = input.multiline();
        }
        let message_text: String = input.interact()?;
        let message_text = message_text.trim();

        if message_text.eq_ignore_ascii_case("exit")
            || message_text.eq_ignore_ascii_case("/exit")
            || message_text.eq_ignore_ascii_case("/quit")
        {
            return Ok(Input::Exit);
        } else if message_text.eq_ignore_ascii_case("/m") {
            self.input_mode = InputMode::Multiline;
            return self.get_input();
        } else if message_text.eq_ignore_ascii_case("/s") {
            self.input_mode = InputMode::Singleline;
            return self.get_input();
        } else if message_text.eq_ignore_ascii_case("/t") {
            self.theme = match self.theme {
                Theme::Light => {
                    println!("Switching to Dark theme");
                    Theme::Dark
                }
                Theme::Dark => {
                    println!("Switching to Light theme");
                    Theme::Light
                }
            };
            return self.get_input();
        } else if message_text.eq_ignore_ascii_case("/?") {
            println!("Commands:");
            println!("exit - Exit the session");
            println!("/m - Switch to multiline input mode");
            println!("/s - Switch to singleline input mode");
            println!("/t - Toggle Light/Dark theme");
            println!("/? - Display this help message");
            return self.get_input();
        }

        Ok(Input::Message(message_text.to_string()))
    }

    fn close(&self) {
        // No cleanup required
    }
}
