use std::env;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Args;
use cliclack::{input, spinner};
use console::style;
use tracing::debug;

use interpreter_smol::models::message::{ChatMessage, ConversationMessage};
use interpreter_smol::providers::base::{GenerationOptions, Provider};
use interpreter_smol::providers::configs::{GeminiProviderConfig, ProviderConfig};
use interpreter_smol::providers::gemini::GeminiProvider;
use interpreter_smol::registry::record::AgentRecord;
use interpreter_smol::registry::{AgentRegistry, RegistryConfig};
use interpreter_smol::tools::{agent_management_tools, ToolRegistry};

use super::render;

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Send a single prompt and exit; omit for an interactive session
    pub prompt: Option<String>,

    /// Run as this registered agent
    #[arg(short, long)]
    pub agent: Option<String>,

    /// Model to use (can also be set via GEMINI_MODEL environment variable)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Google API key (can also be set via GOOGLE_API_KEY environment variable)
    #[arg(long)]
    pub api_key: Option<String>,

    #[arg(long)]
    pub temperature: Option<f32>,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Let the model create, change and delete agents
    #[arg(long)]
    pub agent_tools: bool,
}

pub fn run(args: ChatArgs, registry_config: RegistryConfig) -> Result<()> {
    let registry = if args.agent.is_some() || args.agent_tools {
        let registry =
            AgentRegistry::open(registry_config).context("Could not open agent registry")?;
        Some(Arc::new(Mutex::new(registry)))
    } else {
        None
    };

    let agent = match (&args.agent, &registry) {
        (Some(name), Some(registry)) => Some(
            lock(registry)?
                .get(name)
                .with_context(|| format!("Could not load agent '{}'", name))?
                .clone(),
        ),
        _ => None,
    };

    let mut tools = ToolRegistry::new();
    if let (true, Some(registry)) = (args.agent_tools, &registry) {
        tools.extend(agent_management_tools(registry.clone()))?;
    }

    let mut provider = GeminiProvider::new(provider_config(&args, agent.as_ref())?)?;
    let options = generation_options(&args, agent.as_ref());
    let mut session = Session {
        history: initial_messages(agent.as_ref()),
        tools,
        options,
    };

    if let Some(prompt) = args.prompt.as_deref() {
        return session.turn(&mut provider, prompt);
    }

    let title = match &agent {
        Some(agent) => format!("interpreter-smol as {}", style(&agent.name).cyan()),
        None => "interpreter-smol".to_string(),
    };
    println!(
        "{} {}",
        title,
        style("- type \"exit\" to end the session").dim()
    );
    println!("\n");

    loop {
        let message_text: String = input("Message:").placeholder("").multiline().interact()?;

        if message_text.trim().eq_ignore_ascii_case("exit") {
            break;
        }

        session.turn(&mut provider, &message_text)?;
        println!("\n");
    }
    Ok(())
}

struct Session {
    history: Vec<ConversationMessage>,
    tools: ToolRegistry,
    options: GenerationOptions,
}

impl Session {
    fn turn(&mut self, provider: &mut GeminiProvider, text: &str) -> Result<()> {
        self.history.push(ConversationMessage::user(text));

        let descriptors = self.tools.descriptors();
        let tools = (!descriptors.is_empty()).then_some(descriptors.as_slice());

        let spin = spinner();
        spin.start("awaiting reply");
        let reply = provider.complete(&self.history, tools, &self.options);
        spin.stop("");
        let reply = reply?;

        if reply.has_tool_calls() {
            let summary = self.dispatch(&reply)?;
            render(&summary, "markdown")?;
            self.history.push(ConversationMessage::assistant(summary));
        } else {
            render(reply.text_or_empty(), "markdown")?;
            self.history
                .push(ConversationMessage::assistant(reply.text_or_empty()));
        }

        if let Some(total) = provider.last_usage().total_tokens {
            println!("{}", style(format!("{} tokens", total)).dim());
        }
        Ok(())
    }

    /// Run every requested tool once and describe the outcomes
    fn dispatch(&self, reply: &ChatMessage) -> Result<String> {
        let mut summary = Vec::new();
        for call in &reply.tool_calls {
            debug!(tool = %call.name, arguments = %call.arguments, "Dispatching tool call");
            let outcome = match self.tools.invoke(call) {
                Ok(result) => serde_json::to_string_pretty(&result)?,
                Err(e) => format!("error: {}", e),
            };
            summary.push(format!(
                "**{}** `{}`\n\n```json\n{}\n```",
                call.name, call.arguments, outcome
            ));
        }
        Ok(summary.join("\n\n"))
    }
}

fn provider_config(args: &ChatArgs, agent: Option<&AgentRecord>) -> Result<GeminiProviderConfig> {
    let mut config = match &args.api_key {
        Some(api_key) => {
            let mut config = GeminiProviderConfig::new(api_key.clone());
            if let Ok(host) = env::var("GEMINI_HOST") {
                config = config.with_host(host);
            }
            if let Ok(model) = env::var("GEMINI_MODEL") {
                config = config.with_model(model);
            }
            config
        }
        None => GeminiProviderConfig::from_env()
            .context("API key must be provided via --api-key or GOOGLE_API_KEY environment variable")?,
    };

    if let Some(model) = args
        .model
        .clone()
        .or_else(|| agent.map(|agent| agent.model.model_id.clone()))
    {
        config = config.with_model(model);
    }
    Ok(config)
}

/// Command line flags win over the agent's model settings
fn generation_options(args: &ChatArgs, agent: Option<&AgentRecord>) -> GenerationOptions {
    let model = agent.map(|agent| &agent.model);
    GenerationOptions {
        temperature: args
            .temperature
            .or_else(|| model.and_then(|model| model.temperature)),
        max_tokens: args
            .max_tokens
            .or_else(|| model.and_then(|model| model.max_tokens)),
        ..Default::default()
    }
}

fn initial_messages(agent: Option<&AgentRecord>) -> Vec<ConversationMessage> {
    agent
        .map(|agent| vec![ConversationMessage::system(agent.prompt.clone())])
        .unwrap_or_default()
}

fn lock(registry: &Mutex<AgentRegistry>) -> Result<std::sync::MutexGuard<'_, AgentRegistry>> {
    registry
        .lock()
        .map_err(|_| anyhow::anyhow!("Agent registry lock is poisoned"))
}
