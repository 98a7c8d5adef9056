mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use interpreter_smol::registry::RegistryConfig;
use tracing_subscriber::EnvFilter;

use commands::agents::AgentsArgs;
use commands::chat::ChatArgs;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the agent registry (can also be set via INTERPRETER_SMOL_WORKSPACE)
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chat with Gemini, optionally as a registered agent
    Chat(ChatArgs),
    /// Manage registered agents
    Agents(AgentsArgs),
}

fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let registry_config = cli
        .workspace
        .map(RegistryConfig::new)
        .unwrap_or_else(RegistryConfig::from_env);

    match cli.command {
        Command::Chat(args) => commands::chat::run(args, registry_config),
        Command::Agents(args) => commands::agents::run(args, registry_config),
    }
}
