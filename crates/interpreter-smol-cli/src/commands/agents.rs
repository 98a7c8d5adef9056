//! Agent registry management commands

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use console::style;

use interpreter_smol::registry::record::{AgentRecord, ModelConfig, NewAgent};
use interpreter_smol::registry::{AgentRegistry, RegistryConfig};

use super::render;

#[derive(Args, Debug)]
pub struct AgentsArgs {
    #[command(subcommand)]
    pub command: AgentsCommand,
}

#[derive(Subcommand, Debug)]
pub enum AgentsCommand {
    /// List registered agents
    List,
    /// Show everything stored for one agent
    Show {
        name: String,
    },
    /// Register a new agent
    Create {
        name: String,

        /// Instructions the agent runs with
        #[arg(long)]
        prompt: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Tool the agent may use; repeat for several
        #[arg(long = "tool")]
        tools: Vec<String>,

        /// Model to run the agent on
        #[arg(long)]
        model: Option<String>,
    },
    /// Delete an agent
    Delete {
        name: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

pub fn run(args: AgentsArgs, registry_config: RegistryConfig) -> Result<()> {
    let mut registry =
        AgentRegistry::open(registry_config).context("Could not open agent registry")?;
    report_open_problems(&registry)?;

    match args.command {
        AgentsCommand::List => list(&registry),
        AgentsCommand::Show { name } => show(&registry, &name),
        AgentsCommand::Create {
            name,
            prompt,
            description,
            tools,
            model,
        } => {
            let mut agent = NewAgent::new(name, prompt)
                .with_description(description)
                .with_tools(tools);
            if let Some(model) = model {
                agent = agent.with_model(ModelConfig::gemini(model));
            }
            let record = create(&mut registry, agent)?;
            cliclack::log::success(format!("Created agent {}", record.name))?;
            Ok(())
        }
        AgentsCommand::Delete { name, yes } => {
            let confirmed = yes
                || cliclack::confirm(format!("Delete agent '{}'?", name))
                    .initial_value(false)
                    .interact()?;
            if !confirmed {
                cliclack::log::info("Nothing deleted")?;
                return Ok(());
            }
            delete(&mut registry, &name)?;
            cliclack::log::success(format!("Deleted agent {}", name))?;
            Ok(())
        }
    }
}

fn report_open_problems(registry: &AgentRegistry) -> Result<()> {
    for path in registry.orphaned_files() {
        cliclack::log::warning(format!(
            "{} is not in the agent index and was ignored",
            path.display()
        ))?;
    }
    for name in registry.skipped_agents() {
        cliclack::log::warning(format!(
            "Agent '{}' could not be loaded and was skipped",
            name
        ))?;
    }
    Ok(())
}

fn list(registry: &AgentRegistry) -> Result<()> {
    let agents = registry.list();
    if agents.is_empty() {
        println!("No agents registered in {}", registry.root().display());
        return Ok(());
    }

    for agent in agents {
        println!("{}", summary_line(agent));
    }
    Ok(())
}

fn summary_line(agent: &AgentRecord) -> String {
    let description = if agent.description.is_empty() {
        style("(no description)".to_string()).dim()
    } else {
        style(agent.description.clone())
    };
    format!(
        "{}  {}  {}",
        style(&agent.name).bold().green(),
        description,
        style(&agent.model.model_id).dim()
    )
}

fn show(registry: &AgentRegistry, name: &str) -> Result<()> {
    let record = registry.get(name)?;
    render(&serde_json::to_string_pretty(record)?, "json")
}

fn create(registry: &mut AgentRegistry, agent: NewAgent) -> Result<AgentRecord> {
    let name = agent.name.clone();
    registry
        .create(agent)
        .with_context(|| format!("Could not create agent '{}'", name))
}

fn delete(registry: &mut AgentRegistry, name: &str) -> Result<AgentRecord> {
    registry
        .delete(name)
        .with_context(|| format!("Could not delete agent '{}'", name))
}
