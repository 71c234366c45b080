use anyhow::Result;
use clap::Parser;
use console::style;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod harness;

use harness::{Harness, Instance, Outcome, SystemRunner};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file describing the repository, base commit and patch
    #[arg(long, default_value = "custom_instance.json")]
    instance: PathBuf,

    /// Directory the repository is cloned into
    #[arg(long, default_value = ".")]
    workdir: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let instance = Instance::load(&cli.instance)?;
    let outcome = Harness::new(&cli.workdir, SystemRunner).evaluate(&instance)?;

    match &outcome {
        Outcome::Passed => println!("{}", style("✅ Solution appears to work!").green()),
        Outcome::TestsFailed { stdout } => {
            println!("{}", style("❌ Tests failed:").red());
            println!("{}", stdout);
        }
        Outcome::PatchFailed { stderr } => {
            println!("{} {}", style("❌ Failed to apply patch:").red(), stderr.trim());
        }
    }

    std::process::exit(outcome.exit_code());
}
