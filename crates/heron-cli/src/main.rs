use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cliclack::spinner;
use console::style;
use tracing_subscriber::EnvFilter;

use heron::agent::Agent;
use heron::config::Settings;
use heron::context::AgentContext;
use heron::providers::openai::OpenAiProvider;
use heron::tools::ToolRegistry;

mod prompt;
mod session;

use prompt::cliclack::{print_markdown, CliclackPrompt};
use session::Session;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Model to use (overrides HERON_PROVIDER__MODEL)
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// OpenAI API Key (can also be set via OPENAI_API_KEY environment variable)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Do not export traces to the collector
    #[arg(long, global = true)]
    no_trace: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask a single question and print the answer
    Ask {
        /// The question, e.g. "Which store had the most sales in November 2021?"
        question: String,
    },

    /// Start an interactive session
    Session,

    /// List the tools offered to the model
    Tools,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = load_settings(&cli)?;

    match &cli.command {
        Command::Ask { question } => ask(&settings, question),
        Command::Session => {
            let agent = build_agent(&settings)?;
            println!(
                "Heron session {}",
                style("- type \"exit\" to end the session, \"/?\" for help").dim()
            );
            Session::new(agent, Box::new(CliclackPrompt::new())).start()
        }
        Command::Tools => list_tools(&settings),
    }
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::new().context("Failed to load configuration")?;
    if let Some(model) = &cli.model {
        settings.provider.model = model.clone();
    }
    if let Some(api_key) = &cli.api_key {
        settings.provider.api_key = Some(api_key.clone());
    }
    if cli.no_trace {
        settings.tracing.enabled = false;
    }
    Ok(settings)
}

fn build_agent(settings: &Settings) -> Result<Agent> {
    let provider_config = settings
        .provider_config()
        .context("API key must be provided via --api-key or OPENAI_API_KEY environment variable")?;
    let provider = OpenAiProvider::new(provider_config)?;
    let tracer = settings.tracer()?;
    tracing::info!(
        model = %provider.model(),
        tracing = settings.tracing.enabled,
        dataset = %settings.data.path.display(),
        "starting agent"
    );

    let ctx = Arc::new(AgentContext::new(Box::new(provider), tracer));
    let registry = ToolRegistry::sales_tools(&settings.data.path, &settings.data.table)?;
    Ok(Agent::new(ctx, registry)?.with_max_iterations(settings.agent.max_iterations))
}

fn ask(settings: &Settings, question: &str) -> Result<()> {
    let agent = build_agent(settings)?;

    let spin = spinner();
    spin.start("awaiting reply");
    let result = agent.ask(question);
    spin.stop("");

    let answer = result?;
    print_markdown(&answer, "zenburn");
    println!();
    Ok(())
}

fn list_tools(settings: &Settings) -> Result<()> {
    let registry = ToolRegistry::sales_tools(&settings.data.path, &settings.data.table)?;
    for tool in registry.tools() {
        println!("{}", style(&tool.name).bold());
        println!("  {}", tool.description);
        println!(
            "  {}",
            style(serde_json::to_string(&tool.parameters)?).dim()
        );
    }
    Ok(())
}
