use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{json, Value};

use super::{FunctionTool, Tool};
use crate::errors::{RegistryError, ToolError, ToolResult};
use crate::models::tool::{ParamType, ToolDescriptor, ToolInput};
use crate::registry::record::{AgentRecord, AgentUpdate, ModelConfig, NewAgent};
use crate::registry::AgentRegistry;

pub type SharedRegistry = Arc<Mutex<AgentRegistry>>;

/// Tools that let a model create, inspect, change and remove agents
pub fn agent_management_tools(registry: SharedRegistry) -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(create_agent(registry.clone())),
        Box::new(list_agents(registry.clone())),
        Box::new(get_agent(registry.clone())),
        Box::new(update_agent(registry.clone())),
        Box::new(delete_agent(registry)),
    ]
}

fn create_agent(registry: SharedRegistry) -> FunctionTool {
    let descriptor = ToolDescriptor::new(
        "create_agent",
        "Create and save a new agent that can be run later by name.",
    )
    .with_input(
        "name",
        ToolInput::required(
            ParamType::String,
            "Unique agent name made of letters, digits, '_' or '-'",
        ),
    )
    .with_input(
        "description",
        ToolInput::required(ParamType::String, "What the agent is for"),
    )
    .with_input(
        "prompt",
        ToolInput::required(ParamType::String, "Instructions the agent runs with"),
    )
    .with_input(
        "tools",
        ToolInput::optional(ParamType::Array, "Names of the tools the agent may use")
            .with_items(ParamType::String),
    )
    .with_input(
        "model_id",
        ToolInput::optional(ParamType::String, "Model to run the agent on"),
    );

    FunctionTool::new(descriptor, move |args| {
        let mut agent = NewAgent::new(required_str(args, "name")?, required_str(args, "prompt")?)
            .with_description(required_str(args, "description")?);
        if let Some(tools) = optional_strings(args, "tools")? {
            agent = agent.with_tools(tools);
        }
        if let Some(model_id) = optional_str(args, "model_id")? {
            agent = agent.with_model(ModelConfig::gemini(model_id));
        }

        let record = lock(&registry)?.create(agent).map_err(execution)?;
        Ok(json!({
            "result": format!("Created agent '{}'", record.name),
            "agent": record_json(&record)?,
        }))
    })
}

fn list_agents(registry: SharedRegistry) -> FunctionTool {
    let descriptor = ToolDescriptor::new("list_agents", "List all saved agents.");

    FunctionTool::new(descriptor, move |_| {
        let registry = lock(&registry)?;
        let agents: Vec<Value> = registry
            .list()
            .into_iter()
            .map(|record| {
                json!({
                    "name": record.name,
                    "description": record.description,
                    "tools": record.tools,
                    "model_id": record.model.model_id,
                })
            })
            .collect();
        Ok(json!({ "agents": agents }))
    })
}

fn get_agent(registry: SharedRegistry) -> FunctionTool {
    let descriptor = ToolDescriptor::new("get_agent", "Show everything stored for one agent.")
        .with_input("name", ToolInput::required(ParamType::String, "Agent name"));

    FunctionTool::new(descriptor, move |args| {
        let name = required_str(args, "name")?;
        let registry = lock(&registry)?;
        let record = registry.get(&name).map_err(execution)?;
        record_json(record)
    })
}

fn update_agent(registry: SharedRegistry) -> FunctionTool {
    let descriptor = ToolDescriptor::new(
        "update_agent",
        "Change the description, prompt or tools of an existing agent.",
    )
    .with_input("name", ToolInput::required(ParamType::String, "Agent name"))
    .with_input(
        "description",
        ToolInput::optional(ParamType::String, "New description"),
    )
    .with_input("prompt", ToolInput::optional(ParamType::String, "New prompt"))
    .with_input(
        "tools",
        ToolInput::optional(ParamType::Array, "New list of tool names")
            .with_items(ParamType::String),
    );

    FunctionTool::new(descriptor, move |args| {
        let name = required_str(args, "name")?;
        let update = AgentUpdate {
            description: optional_str(args, "description")?,
            prompt: optional_str(args, "prompt")?,
            tools: optional_strings(args, "tools")?,
            ..Default::default()
        };
        if update.is_empty() {
            return Err(ToolError::InvalidParameters(
                "Nothing to update: give a description, prompt or tools".into(),
            ));
        }

        let record = lock(&registry)?.update(&name, update).map_err(execution)?;
        Ok(json!({
            "result": format!("Updated agent '{}'", record.name),
            "agent": record_json(&record)?,
        }))
    })
}

fn delete_agent(registry: SharedRegistry) -> FunctionTool {
    let descriptor = ToolDescriptor::new("delete_agent", "Delete a saved agent.")
        .with_input("name", ToolInput::required(ParamType::String, "Agent name"));

    FunctionTool::new(descriptor, move |args| {
        let name = required_str(args, "name")?;
        let record = lock(&registry)?.delete(&name).map_err(execution)?;
        Ok(json!({ "result": format!("Deleted agent '{}'", record.name) }))
    })
}

fn lock(registry: &SharedRegistry) -> ToolResult<MutexGuard<'_, AgentRegistry>> {
    registry
        .lock()
        .map_err(|_| ToolError::Execution("Agent registry lock is poisoned".into()))
}

fn execution(err: RegistryError) -> ToolError {
    ToolError::Execution(err.to_string())
}

fn record_json(record: &AgentRecord) -> ToolResult<Value> {
    serde_json::to_value(record).map_err(|e| ToolError::Execution(e.to_string()))
}

fn required_str(args: &Value, key: &str) -> ToolResult<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ToolError::InvalidParameters(format!("Missing '{}' parameter", key)))
}

fn optional_str(args: &Value, key: &str) -> ToolResult<Option<String>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ToolError::InvalidParameters(format!(
            "'{}' must be a string",
            key
        ))),
    }
}

fn optional_strings(args: &Value, key: &str) -> ToolResult<Option<Vec<String>>> {
    let items = match args.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ToolError::InvalidParameters(format!(
                "'{}' must be a list of strings",
                key
            )))
        }
    };
    items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                ToolError::InvalidParameters(format!("'{}' must be a list of strings", key))
            })
        })
        .collect::<ToolResult<Vec<_>>>()
        .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::{ChatMessage, ConversationMessage};
    use crate::models::tool::ToolInvocation;
    use crate::providers::base::{GenerationOptions, Provider};
    use crate::providers::mock::MockProvider;
    use crate::tools::ToolRegistry;
    use tempfile::TempDir;

    fn setup() -> (TempDir, SharedRegistry, ToolRegistry) {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(Mutex::new(AgentRegistry::open_dir(dir.path()).unwrap()));
        let mut tools = ToolRegistry::new();
        tools
            .extend(agent_management_tools(registry.clone()))
            .unwrap();
        (dir, registry, tools)
    }

    fn call(tools: &ToolRegistry, name: &str, args: Value) -> ToolResult<Value> {
        tools.invoke(&ToolInvocation::new(name, args))
    }

    #[test]
    fn test_tool_names() {
        let (_dir, _registry, tools) = setup();
        assert_eq!(
            tools.names(),
            vec![
                "create_agent",
                "list_agents",
                "get_agent",
                "update_agent",
                "delete_agent"
            ]
        );
    }

    #[test]
    fn test_agent_tools_round_trip() {
        let (_dir, registry, tools) = setup();

        call(
            &tools,
            "create_agent",
            json!({
                "name": "researcher",
                "description": "Finds sources",
                "prompt": "Find three sources for the question.",
                "tools": ["web_search"],
                "model_id": "gemini-1.5-pro",
            }),
        )
        .unwrap();

        let listed = call(&tools, "list_agents", json!({})).unwrap();
        assert_eq!(listed["agents"][0]["name"], "researcher");
        assert_eq!(listed["agents"][0]["model_id"], "gemini-1.5-pro");

        call(
            &tools,
            "update_agent",
            json!({"name": "researcher", "prompt": "Find five sources."}),
        )
        .unwrap();
        let shown = call(&tools, "get_agent", json!({"name": "researcher"})).unwrap();
        assert_eq!(shown["prompt"], "Find five sources.");
        assert_eq!(shown["tools"], json!(["web_search"]));

        call(&tools, "delete_agent", json!({"name": "researcher"})).unwrap();
        assert!(registry.lock().unwrap().is_empty());
    }

    #[test]
    fn test_agent_tool_errors() {
        let (_dir, _registry, tools) = setup();

        assert!(matches!(
            call(&tools, "create_agent", json!({"name": "a", "prompt": "p"})),
            Err(ToolError::InvalidParameters(_))
        ));
        assert!(matches!(
            call(
                &tools,
                "create_agent",
                json!({"name": "a", "description": "d", "prompt": "p", "tools": [1]})
            ),
            Err(ToolError::InvalidParameters(_))
        ));
        assert!(matches!(
            call(&tools, "get_agent", json!({"name": "nobody"})),
            Err(ToolError::Execution(_))
        ));
        assert!(matches!(
            call(&tools, "update_agent", json!({"name": "nobody"})),
            Err(ToolError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_scripted_provider_drives_agent_tools() {
        let (_dir, registry, tools) = setup();
        let mut provider = MockProvider::new(vec![
            Ok(ChatMessage::tool_calls(vec![ToolInvocation::new(
                "create_agent",
                json!({"name": "critic", "description": "Reviews drafts", "prompt": "Be harsh."}),
            )])),
            Ok(ChatMessage::text("Created the critic agent.")),
        ]);

        let mut history = vec![ConversationMessage::user("Make a critic agent.")];
        let descriptors = tools.descriptors();
        loop {
            let reply = provider
                .complete(&history, Some(&descriptors), &GenerationOptions::default())
                .unwrap();
            if !reply.has_tool_calls() {
                history.push(ConversationMessage::assistant(reply.text_or_empty()));
                break;
            }
            for call in &reply.tool_calls {
                let result = tools.invoke(call).unwrap();
                history.push(ConversationMessage::assistant(result.to_string()));
            }
        }

        assert_eq!(provider.calls.len(), 2);
        assert_eq!(provider.calls[1].0, 2);
        assert!(provider.calls[0].1.contains(&"create_agent".to_string()));
        assert_eq!(history.last().unwrap().text(), "Created the critic agent.");
        assert_eq!(
            registry.lock().unwrap().get("critic").unwrap().prompt,
            "Be harsh."
        );
    }
}
